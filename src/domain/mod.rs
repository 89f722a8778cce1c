// src/domain/mod.rs
pub mod errors;
pub mod models;
pub mod repository;
pub mod service;

// Re-export common types for convenience
pub use errors::{
    AppError, AppResult, DeliveryError, DeliveryResult, HttpError, QuoteFetchError, QuoteResult,
    TickerSourceError, TickerSourceResult,
};
pub use models::{
    Classification, DeliveryReceipt, FetchFailure, GapResult, PriceSource, Quote, Report,
    RunResult, Thresholds, TickerSymbol,
};
pub use repository::{Notifier, QuoteFetcher, TickerSource, TickerStore};
pub use service::GapCalculator;
