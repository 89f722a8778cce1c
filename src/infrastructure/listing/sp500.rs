// src/infrastructure/listing/sp500.rs
// S&P 500 constituents scraped from Wikipedia, used to regenerate the default ticker file

use std::collections::HashSet;

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::domain::errors::{TickerSourceError, TickerSourceResult};
use crate::domain::models::TickerSymbol;
use crate::domain::repository::TickerSource;
use crate::infrastructure::http::HttpClient;

pub const WIKIPEDIA_SP500_URL: &str = "https://en.wikipedia.org/wiki/List_of_S%26P_500_companies";

fn selector(css: &str) -> TickerSourceResult<Selector> {
    Selector::parse(css)
        .map_err(|e| TickerSourceError::Provider(format!("invalid selector {:?}: {:?}", css, e)))
}

/// Symbols from the `Symbol` column of the constituents table.
///
/// Symbols are normalised the same way as the ticker file (`BRK.B` -> `BRK-B`).
pub fn parse_constituents(html: &str) -> TickerSourceResult<Vec<TickerSymbol>> {
    let document = Html::parse_document(html);
    let table_sel = selector("table#constituents, table.wikitable")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("th, td")?;

    let table = document
        .select(&table_sel)
        .next()
        .ok_or_else(|| TickerSourceError::Provider("constituents table not found".to_string()))?;

    let mut symbol_col = None;
    let mut seen = HashSet::new();
    let mut symbols = Vec::new();

    for row in table.select(&row_sel) {
        let cells: Vec<String> = row
            .select(&cell_sel)
            .map(|cell| cell.text().collect::<String>().trim().to_string())
            .collect();

        let Some(col) = symbol_col else {
            symbol_col = cells.iter().position(|c| c.eq_ignore_ascii_case("symbol"));
            continue;
        };

        match cells.get(col).and_then(|c| TickerSymbol::parse(c)) {
            Some(symbol) => {
                if seen.insert(symbol.clone()) {
                    symbols.push(symbol);
                }
            }
            None => log::debug!("Skipping constituents row {:?}", cells.first()),
        }
    }

    if symbol_col.is_none() {
        return Err(TickerSourceError::Provider(
            "constituents table has no Symbol column".to_string(),
        ));
    }
    Ok(symbols)
}

pub struct Sp500Listing {
    http: HttpClient,
    url: String,
}

impl Sp500Listing {
    pub fn new(http: HttpClient) -> Self {
        Self::with_url(http, WIKIPEDIA_SP500_URL)
    }

    pub fn with_url(http: HttpClient, url: &str) -> Self {
        Self {
            http,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl TickerSource for Sp500Listing {
    async fn list_tickers(&self) -> TickerSourceResult<Vec<TickerSymbol>> {
        let html = self
            .http
            .get_text(&self.url)
            .await
            .map_err(|e| TickerSourceError::Provider(format!("S&P 500 listing: {}", e)))?;

        let symbols = parse_constituents(&html)?;
        log::info!("Found {} S&P 500 symbols", symbols.len());
        Ok(symbols)
    }

    fn describe(&self) -> String {
        "S&P 500 constituents".to_string()
    }
}
