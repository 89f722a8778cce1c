// src/domain/service/mod.rs
// Gap computation and threshold classification

use rust_decimal::Decimal;

use crate::domain::models::{Classification, GapResult, Quote, Thresholds};

/// Percentage move from `previous_close` to `current_price`.
///
/// `previous_close` must be positive; the quote fetchers reject anything else.
pub fn gap_pct(current_price: Decimal, previous_close: Decimal) -> Decimal {
    debug_assert!(previous_close > Decimal::ZERO);
    (current_price - previous_close) / previous_close * Decimal::ONE_HUNDRED
}

#[derive(Debug, Clone, Copy)]
pub struct GapCalculator {
    thresholds: Thresholds,
}

impl GapCalculator {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Both thresholds are inclusive.
    pub fn classify_pct(&self, gap_pct: Decimal) -> Classification {
        if gap_pct <= self.thresholds.gap_down_pct {
            Classification::GapDown
        } else if gap_pct >= self.thresholds.gap_up_pct {
            Classification::GapUp
        } else {
            Classification::Neutral
        }
    }

    pub fn classify(&self, quote: &Quote) -> GapResult {
        let gap_pct = gap_pct(quote.current_price, quote.previous_close);
        GapResult {
            symbol: quote.symbol.clone(),
            gap_pct,
            current_price: quote.current_price,
            previous_close: quote.previous_close,
            classification: self.classify_pct(gap_pct),
            source: quote.source,
        }
    }
}
