// src/domain/repository/mod.rs
// Ports for the external collaborators of a run

use async_trait::async_trait;

use crate::domain::errors::{DeliveryResult, QuoteResult, TickerSourceResult};
use crate::domain::models::{DeliveryReceipt, Quote, Report, TickerSymbol};

/// Produces the ticker universe for a run.
#[async_trait]
pub trait TickerSource: Send + Sync {
    /// Ordered, de-duplicated symbols. May be empty; the caller decides.
    async fn list_tickers(&self) -> TickerSourceResult<Vec<TickerSymbol>>;

    /// Short label for logs and the report header.
    fn describe(&self) -> String;
}

/// Persists a ticker universe for later runs.
#[async_trait]
pub trait TickerStore: Send + Sync {
    async fn save_tickers(&self, symbols: &[TickerSymbol]) -> TickerSourceResult<()>;
}

/// Market-data lookup for a single symbol. No retries; no shared mutable state.
#[async_trait]
pub trait QuoteFetcher: Send + Sync {
    async fn fetch(&self, symbol: &TickerSymbol) -> QuoteResult<Quote>;

    fn provider_name(&self) -> &'static str;
}

/// Email delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, report: &Report) -> DeliveryResult<DeliveryReceipt>;
}
