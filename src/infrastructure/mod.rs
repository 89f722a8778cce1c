// src/infrastructure/mod.rs
// Provider implementations behind the domain ports

pub mod email;
pub mod http;
pub mod listing;
pub mod market;

pub use email::ResendNotifier;
pub use http::HttpClient;
pub use listing::{CsvTickerSource, ExchangeListingSource, Sp500Listing};
pub use market::YahooQuoteFetcher;
