// src/application/usecase/ticker_refresh_usecase.rs
// Regenerate the ticker file from an upstream listing

use crate::domain::errors::{AppError, AppResult};
use crate::domain::repository::{TickerSource, TickerStore};

/// Pull the current universe from `source` and persist it to `store`.
/// An empty listing leaves the existing file untouched.
pub async fn refresh_ticker_file(
    source: &dyn TickerSource,
    store: &dyn TickerStore,
) -> AppResult<usize> {
    log::info!("Refreshing ticker file from {}", source.describe());

    let symbols = source.list_tickers().await?;
    if symbols.is_empty() {
        return Err(AppError::EmptyTickerSet(source.describe()));
    }

    store.save_tickers(&symbols).await?;
    Ok(symbols.len())
}
