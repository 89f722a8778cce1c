// src/infrastructure/market/mod.rs
// Yahoo Finance quote fetcher

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use rust_decimal::{prelude::FromPrimitive, Decimal};
use serde::Deserialize;

use crate::domain::errors::{QuoteFetchError, QuoteResult};
use crate::domain::models::{PriceSource, Quote, TickerSymbol};
use crate::domain::repository::QuoteFetcher;
use crate::infrastructure::http::HttpClient;

pub const YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";

// Provider floats carry binary noise past this scale
const PRICE_SCALE: u32 = 4;

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: Meta,
    /// Bar start times, unix seconds, parallel to the indicator series
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Meta {
    regular_market_price: Option<f64>,
    exchange_timezone_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Bars>,
}

#[derive(Debug, Default, Deserialize)]
struct Bars {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
}

impl ChartResponse {
    fn into_result(self, symbol: &TickerSymbol) -> QuoteResult<ChartResult> {
        if let Some(err) = self.chart.error {
            return Err(QuoteFetchError::new(
                symbol.as_str(),
                format!(
                    "provider error {}: {}",
                    err.code.unwrap_or_default(),
                    err.description.unwrap_or_default()
                ),
            ));
        }
        self.chart
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| QuoteFetchError::new(symbol.as_str(), "empty chart response"))
    }
}

impl ChartResult {
    fn bars(&self) -> Option<&Bars> {
        self.indicators.quote.first()
    }

    fn last_close(&self) -> Option<f64> {
        self.bars().and_then(|b| last_value(&b.close))
    }

    fn exchange_tz(&self) -> Tz {
        self.meta
            .exchange_timezone_name
            .as_deref()
            .and_then(|name| name.parse().ok())
            .unwrap_or(chrono_tz::US::Eastern)
    }

    /// Close of the latest daily bar dated before `today` in the exchange's
    /// time zone. Once a session opens the chart carries today's running bar,
    /// which must not count as the previous close.
    fn close_before(&self, today: NaiveDate) -> Option<f64> {
        let tz = self.exchange_tz();
        let bars = self.bars()?;
        self.timestamp
            .iter()
            .zip(bars.close.iter())
            .rev()
            .filter(|(ts, _)| {
                DateTime::from_timestamp(**ts, 0)
                    .map_or(false, |t| t.with_timezone(&tz).date_naive() < today)
            })
            .find_map(|(_, close)| close.filter(|v| v.is_finite()))
    }

    fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.exchange_tz()).date_naive()
    }

    fn last_open(&self) -> Option<f64> {
        self.bars().and_then(|b| last_value(&b.open))
    }
}

fn last_value(series: &[Option<f64>]) -> Option<f64> {
    series.iter().rev().find_map(|v| *v).filter(|v| v.is_finite())
}

fn to_price(value: f64) -> Option<Decimal> {
    Decimal::from_f64(value).map(|d| d.round_dp(PRICE_SCALE))
}

pub struct YahooQuoteFetcher {
    http: HttpClient,
    base_url: String,
}

impl YahooQuoteFetcher {
    pub fn new(http: HttpClient) -> Self {
        Self::with_base_url(http, YAHOO_BASE_URL)
    }

    pub fn with_base_url(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn chart_url(&self, symbol: &TickerSymbol, interval: &str, pre_post: bool) -> String {
        let mut url = format!(
            "{}/v8/finance/chart/{}?range=5d&interval={}",
            self.base_url, symbol, interval
        );
        if pre_post {
            url.push_str("&includePrePost=true");
        }
        url
    }

    async fn chart(
        &self,
        symbol: &TickerSymbol,
        interval: &str,
        pre_post: bool,
    ) -> QuoteResult<ChartResult> {
        let url = self.chart_url(symbol, interval, pre_post);
        let response: ChartResponse = self
            .http
            .get_json(&url)
            .await
            .map_err(|e| QuoteFetchError::new(symbol.as_str(), e.to_string()))?;
        response.into_result(symbol)
    }

    /// Latest 1-minute close including extended hours. Failures fall back silently.
    async fn latest_minute_price(&self, symbol: &TickerSymbol) -> Option<f64> {
        match self.chart(symbol, "1m", true).await {
            Ok(chart) => chart.last_close(),
            Err(e) => {
                log::debug!("Minute data unavailable for {}: {}", symbol, e.cause);
                None
            }
        }
    }
}

#[async_trait]
impl QuoteFetcher for YahooQuoteFetcher {
    async fn fetch(&self, symbol: &TickerSymbol) -> QuoteResult<Quote> {
        let fail = |cause: &str| QuoteFetchError::new(symbol.as_str(), cause);

        let now = Utc::now();
        let daily = self.chart(symbol, "1d", false).await?;

        let previous_close = daily
            .close_before(daily.today(now))
            .and_then(to_price)
            .ok_or_else(|| fail("no previous session close available"))?;
        if previous_close <= Decimal::ZERO {
            return Err(fail("non-positive previous close"));
        }

        let (current, source) = match self.latest_minute_price(symbol).await {
            Some(price) => (price, PriceSource::CurrentMinute),
            None => match daily.meta.regular_market_price {
                Some(price) => (price, PriceSource::RegularMarket),
                None => (
                    daily.last_open().ok_or_else(|| fail("no current price available"))?,
                    PriceSource::DailyOpen,
                ),
            },
        };
        let current_price = to_price(current).ok_or_else(|| fail("unrepresentable current price"))?;
        if current_price < Decimal::ZERO {
            return Err(fail("negative current price"));
        }

        Ok(Quote {
            symbol: symbol.clone(),
            current_price,
            previous_close,
            source,
            fetched_at: now,
        })
    }

    fn provider_name(&self) -> &'static str {
        "Yahoo Finance"
    }
}
