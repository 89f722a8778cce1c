// src/domain/errors.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Ticker source error: {0}")]
    TickerSource(#[from] TickerSourceError),

    #[error("Ticker source returned no symbols: {0}")]
    EmptyTickerSet(String),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),
}

impl AppError {
    /// Pipeline stage the error aborted, for the top-level failure message.
    pub fn stage(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::TickerSource(_) | AppError::EmptyTickerSet(_) => "ticker-source",
            AppError::Delivery(_) => "delivery",
        }
    }

    /// Process exit status reported to the scheduler.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) => 2,
            AppError::Delivery(_) => 3,
            _ => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum TickerSourceError {
    #[error("Ticker file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read ticker file {path}: {cause}")]
    Read { path: String, cause: String },

    #[error("Failed to write ticker file {path}: {cause}")]
    Write { path: String, cause: String },

    #[error("Listing provider error: {0}")]
    Provider(String),
}

/// Per-ticker failure. Recovered by the orchestrator, never fatal to a run.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Quote fetch failed for {symbol}: {cause}")]
pub struct QuoteFetchError {
    pub symbol: String,
    pub cause: String,
}

impl QuoteFetchError {
    pub fn new(symbol: &str, cause: impl Into<String>) -> Self {
        Self {
            symbol: symbol.to_string(),
            cause: cause.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Request error: {0}")]
    Request(String),

    #[error("Provider rejected the message (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

/// Transport-level failure shared by the HTTP-backed providers.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Request error: {0}")]
    Request(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<hyper::Error> for HttpError {
    fn from(err: hyper::Error) -> Self {
        HttpError::Request(err.to_string())
    }
}

impl From<hyper::http::Error> for HttpError {
    fn from(err: hyper::http::Error) -> Self {
        HttpError::Request(err.to_string())
    }
}

// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
pub type QuoteResult<T> = Result<T, QuoteFetchError>;
pub type DeliveryResult<T> = Result<T, DeliveryError>;
pub type TickerSourceResult<T> = Result<T, TickerSourceError>;
