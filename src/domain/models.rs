// src/domain/models.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;

/// Equity symbol, normalised to the quote provider's spelling.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TickerSymbol(String);

impl TickerSymbol {
    const MAX_LEN: usize = 12;

    /// Trims, uppercases and rewrites class separators (`BRK.B` -> `BRK-B`).
    /// Returns `None` for anything that is not symbol-shaped.
    pub fn parse(raw: &str) -> Option<Self> {
        let symbol = raw.trim().to_uppercase().replace('.', "-");
        if symbol.is_empty() || symbol.len() > Self::MAX_LEN {
            return None;
        }
        let shaped = symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '^' | '='));
        let starts_ok = symbol
            .chars()
            .next()
            .map_or(false, |c| c.is_ascii_alphanumeric() || c == '^');
        if shaped && starts_ok {
            Some(Self(symbol))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TickerSymbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a quote's current price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSource {
    CurrentMinute,
    RegularMarket,
    DailyOpen,
}

impl PriceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceSource::CurrentMinute => "current_minute",
            PriceSource::RegularMarket => "regular_market",
            PriceSource::DailyOpen => "daily_open",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub symbol: TickerSymbol,
    pub current_price: Decimal,
    pub previous_close: Decimal,
    pub source: PriceSource,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    GapDown,
    GapUp,
    Neutral,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::GapDown => "gap_down",
            Classification::GapUp => "gap_up",
            Classification::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive gap thresholds in percent. Gap-down is negative, gap-up positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub gap_down_pct: Decimal,
    pub gap_up_pct: Decimal,
}

impl Thresholds {
    pub fn new(gap_down_pct: Decimal, gap_up_pct: Decimal) -> Result<Self, String> {
        if !gap_down_pct.is_sign_negative() || gap_down_pct.is_zero() {
            return Err(format!(
                "gap-down threshold must be negative, got {}",
                gap_down_pct
            ));
        }
        if gap_up_pct.is_sign_negative() || gap_up_pct.is_zero() {
            return Err(format!("gap-up threshold must be positive, got {}", gap_up_pct));
        }
        Ok(Self {
            gap_down_pct,
            gap_up_pct,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GapResult {
    pub symbol: TickerSymbol,
    /// Full precision; rounded only when rendered.
    pub gap_pct: Decimal,
    pub current_price: Decimal,
    pub previous_close: Decimal,
    pub classification: Classification,
    pub source: PriceSource,
}

impl GapResult {
    pub fn dollar_change(&self) -> Decimal {
        self.current_price - self.previous_close
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchFailure {
    pub symbol: TickerSymbol,
    pub reason: String,
}

/// Everything one run produced, ordered by symbol regardless of fetch completion order.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub results: Vec<GapResult>,
    pub failures: Vec<FetchFailure>,
    pub run_at: DateTime<Utc>,
}

impl RunResult {
    pub fn new(
        mut results: Vec<GapResult>,
        mut failures: Vec<FetchFailure>,
        run_at: DateTime<Utc>,
    ) -> Self {
        results.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        failures.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Self {
            results,
            failures,
            run_at,
        }
    }

    pub fn total(&self) -> usize {
        self.results.len() + self.failures.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.len()
    }

    pub fn count(&self, classification: Classification) -> usize {
        self.results
            .iter()
            .filter(|r| r.classification == classification)
            .count()
    }
}

/// Rendered email, ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub subject: String,
    pub html_body: String,
    pub attachment_name: String,
    pub csv_attachment: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReceipt {
    pub id: String,
}
