// src/infrastructure/listing/mod.rs
// Ticker universe sources: a local CSV file or the full exchange listing

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::errors::{TickerSourceError, TickerSourceResult};
use crate::domain::models::TickerSymbol;
use crate::domain::repository::{TickerSource, TickerStore};
use crate::infrastructure::http::{with_query_param, HttpClient};

pub mod sp500;

pub use sp500::Sp500Listing;

const HEADER_NAMES: [&str; 3] = ["TICKER", "SYMBOL", "SYMBOLS"];

/// Parse a single-column ticker file.
///
/// The first column of each row is taken; blank rows are skipped, as is a
/// leading header row. Duplicates keep their first position.
pub fn parse_ticker_rows(content: &str) -> Vec<TickerSymbol> {
    // Spreadsheet exports often start with a UTF-8 byte order mark
    let content = content.strip_prefix('\u{FEFF}').unwrap_or(content);
    let mut seen = HashSet::new();
    let mut symbols = Vec::new();
    let mut first_row = true;

    for (line_no, line) in content.lines().enumerate() {
        let cell = line
            .split(',')
            .next()
            .unwrap_or_default()
            .trim()
            .trim_matches('"')
            .trim();
        if cell.is_empty() {
            continue;
        }

        let parsed = TickerSymbol::parse(cell);
        if first_row {
            first_row = false;
            let is_header = HEADER_NAMES.contains(&cell.to_uppercase().as_str());
            if is_header || parsed.is_none() {
                log::debug!("Skipping header row {:?}", cell);
                continue;
            }
        }

        match parsed {
            Some(symbol) => {
                if seen.insert(symbol.clone()) {
                    symbols.push(symbol);
                }
            }
            None => log::warn!("Ignoring malformed ticker {:?} on line {}", cell, line_no + 1),
        }
    }

    symbols
}

pub struct CsvTickerSource {
    path: PathBuf,
}

impl CsvTickerSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TickerSource for CsvTickerSource {
    async fn list_tickers(&self) -> TickerSourceResult<Vec<TickerSymbol>> {
        let display = self.path.display().to_string();
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TickerSourceError::FileNotFound(display));
            }
            Err(e) => {
                return Err(TickerSourceError::Read {
                    path: display,
                    cause: e.to_string(),
                });
            }
        };

        let symbols = parse_ticker_rows(&content);
        log::info!("Loaded {} tickers from {}", symbols.len(), display);
        Ok(symbols)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

#[async_trait]
impl TickerStore for CsvTickerSource {
    /// Writes a `TICKER` header and one symbol per row.
    async fn save_tickers(&self, symbols: &[TickerSymbol]) -> TickerSourceResult<()> {
        let mut content = String::from("TICKER\n");
        for symbol in symbols {
            content.push_str(symbol.as_str());
            content.push('\n');
        }

        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| TickerSourceError::Write {
                path: self.path.display().to_string(),
                cause: e.to_string(),
            })?;
        log::info!("Saved {} tickers to {}", symbols.len(), self.path.display());
        Ok(())
    }
}

pub const POLYGON_BASE_URL: &str = "https://api.polygon.io";

/// NYSE and NASDAQ market identifier codes
const LISTING_EXCHANGES: [&str; 2] = ["XNYS", "XNAS"];

const MAX_PAGES_PER_EXCHANGE: usize = 50;

#[derive(Debug, Deserialize)]
struct ListingPage {
    #[serde(default)]
    results: Vec<ListingEntry>,
    next_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListingEntry {
    ticker: String,
}

/// Active common stocks on NYSE and NASDAQ from the Polygon reference API.
pub struct ExchangeListingSource {
    http: HttpClient,
    api_key: String,
    base_url: String,
}

impl ExchangeListingSource {
    pub fn new(http: HttpClient, api_key: &str) -> Self {
        Self::with_base_url(http, api_key, POLYGON_BASE_URL)
    }

    pub fn with_base_url(http: HttpClient, api_key: &str, base_url: &str) -> Self {
        Self {
            http,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn list_exchange(
        &self,
        exchange: &str,
        out: &mut BTreeSet<TickerSymbol>,
    ) -> TickerSourceResult<()> {
        let mut next = Some(format!(
            "{}/v3/reference/tickers?market=stocks&type=CS&exchange={}&active=true&limit=1000",
            self.base_url, exchange
        ));
        let mut pages = 0;

        while let Some(url) = next.take() {
            if pages >= MAX_PAGES_PER_EXCHANGE {
                log::warn!("Stopping {} listing after {} pages", exchange, pages);
                break;
            }
            pages += 1;

            let page: ListingPage = self
                .http
                .get_json(&with_query_param(&url, "apiKey", &self.api_key))
                .await
                .map_err(|e| TickerSourceError::Provider(format!("{} listing: {}", exchange, e)))?;

            out.extend(page.results.iter().filter_map(|entry| TickerSymbol::parse(&entry.ticker)));
            next = page.next_url;
        }

        log::debug!("{} listing: {} pages", exchange, pages);
        Ok(())
    }
}

#[async_trait]
impl TickerSource for ExchangeListingSource {
    async fn list_tickers(&self) -> TickerSourceResult<Vec<TickerSymbol>> {
        let mut symbols = BTreeSet::new();
        for exchange in LISTING_EXCHANGES {
            self.list_exchange(exchange, &mut symbols).await?;
        }
        log::info!("Fetched {} NYSE/NASDAQ symbols", symbols.len());
        Ok(symbols.into_iter().collect())
    }

    fn describe(&self) -> String {
        "NYSE/NASDAQ listing".to_string()
    }
}
