use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gap_scanner::domain::errors::{DeliveryError, TickerSourceError};
use gap_scanner::domain::models::{PriceSource, Report, TickerSymbol};
use gap_scanner::domain::repository::{Notifier, QuoteFetcher, TickerSource};
use gap_scanner::infrastructure::{
    ExchangeListingSource, HttpClient, ResendNotifier, YahooQuoteFetcher,
};

const DAY_SECS: i64 = 24 * 60 * 60;

fn client() -> HttpClient {
    HttpClient::new(Duration::from_secs(5))
}

/// One bar per day, the last one stamped now (a session in progress) or a day ago.
fn daily_stamps(bars: usize, includes_today: bool) -> Vec<i64> {
    let last = Utc::now().timestamp() - if includes_today { 0 } else { DAY_SECS };
    (0..bars as i64).rev().map(|back| last - back * DAY_SECS).collect()
}

fn chart(
    regular_market_price: Option<f64>,
    timestamp: Vec<i64>,
    open: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
) -> serde_json::Value {
    json!({
        "chart": {
            "result": [{
                "meta": {
                    "regularMarketPrice": regular_market_price,
                    "exchangeTimezoneName": "America/New_York"
                },
                "timestamp": timestamp,
                "indicators": { "quote": [{ "open": open, "close": close }] }
            }],
            "error": null
        }
    })
}

async fn mount_chart(
    server: &MockServer,
    symbol: &str,
    interval: &str,
    response: ResponseTemplate,
) {
    Mock::given(method("GET"))
        .and(path(format!("/v8/finance/chart/{}", symbol)))
        .and(query_param("interval", interval))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn mount_minute_failure(server: &MockServer, symbol: &str) {
    mount_chart(server, symbol, "1m", ResponseTemplate::new(500).set_body_string("busy")).await;
}

fn symbol(raw: &str) -> TickerSymbol {
    TickerSymbol::parse(raw).unwrap()
}

#[tokio::test]
async fn test_yahoo_previous_close_ignores_todays_bar() {
    let server = MockServer::start().await;
    mount_chart(
        &server,
        "AAPL",
        "1d",
        ResponseTemplate::new(200).set_body_json(chart(
            Some(98.0),
            daily_stamps(2, true),
            vec![Some(99.0), Some(98.5)],
            vec![Some(100.0), Some(98.0)],
        )),
    )
    .await;
    mount_chart(
        &server,
        "AAPL",
        "1m",
        ResponseTemplate::new(200).set_body_json(chart(
            Some(98.0),
            Vec::new(),
            vec![Some(97.0), Some(97.5), None],
            vec![Some(97.5), Some(98.0), None],
        )),
    )
    .await;

    let fetcher = YahooQuoteFetcher::with_base_url(client(), &server.uri());
    let quote = fetcher.fetch(&symbol("AAPL")).await.unwrap();

    assert_eq!(quote.previous_close, dec!(100));
    assert_eq!(quote.current_price, dec!(98));
    assert_eq!(quote.source, PriceSource::CurrentMinute);
}

#[tokio::test]
async fn test_yahoo_before_open_uses_last_session() {
    let server = MockServer::start().await;
    mount_chart(
        &server,
        "MSFT",
        "1d",
        ResponseTemplate::new(200).set_body_json(chart(
            Some(101.5),
            daily_stamps(2, false),
            vec![Some(98.0), Some(99.0)],
            vec![Some(99.0), Some(100.0)],
        )),
    )
    .await;
    mount_minute_failure(&server, "MSFT").await;

    let fetcher = YahooQuoteFetcher::with_base_url(client(), &server.uri());
    let quote = fetcher.fetch(&symbol("MSFT")).await.unwrap();

    assert_eq!(quote.previous_close, dec!(100));
    assert_eq!(quote.current_price, dec!(101.5));
    assert_eq!(quote.source, PriceSource::RegularMarket);
}

#[tokio::test]
async fn test_yahoo_falls_back_to_daily_open() {
    let server = MockServer::start().await;
    mount_chart(
        &server,
        "GOOG",
        "1d",
        ResponseTemplate::new(200).set_body_json(chart(
            None,
            daily_stamps(2, true),
            vec![Some(99.0), Some(97.0)],
            vec![Some(100.0), None],
        )),
    )
    .await;
    mount_minute_failure(&server, "GOOG").await;

    let fetcher = YahooQuoteFetcher::with_base_url(client(), &server.uri());
    let quote = fetcher.fetch(&symbol("GOOG")).await.unwrap();

    assert_eq!(quote.previous_close, dec!(100));
    assert_eq!(quote.current_price, dec!(97));
    assert_eq!(quote.source, PriceSource::DailyOpen);
}

#[tokio::test]
async fn test_yahoo_without_any_current_price_fails() {
    let server = MockServer::start().await;
    mount_chart(
        &server,
        "NOPX",
        "1d",
        ResponseTemplate::new(200).set_body_json(chart(
            None,
            daily_stamps(2, true),
            vec![None, None],
            vec![Some(100.0), None],
        )),
    )
    .await;
    mount_minute_failure(&server, "NOPX").await;

    let fetcher = YahooQuoteFetcher::with_base_url(client(), &server.uri());
    let err = fetcher.fetch(&symbol("NOPX")).await.unwrap_err();

    assert_eq!(err.symbol, "NOPX");
    assert!(err.cause.contains("no current price available"));
}

#[tokio::test]
async fn test_yahoo_rejects_zero_previous_close() {
    let server = MockServer::start().await;
    mount_chart(
        &server,
        "ZERO",
        "1d",
        ResponseTemplate::new(200).set_body_json(chart(
            Some(1.0),
            daily_stamps(1, false),
            vec![Some(0.0)],
            vec![Some(0.0)],
        )),
    )
    .await;

    let fetcher = YahooQuoteFetcher::with_base_url(client(), &server.uri());
    let err = fetcher.fetch(&symbol("ZERO")).await.unwrap_err();

    assert_eq!(err.symbol, "ZERO");
    assert!(err.cause.contains("non-positive"));
}

#[tokio::test]
async fn test_yahoo_http_error_is_per_ticker_failure() {
    let server = MockServer::start().await;
    let not_found = ResponseTemplate::new(404).set_body_string("Not Found");
    mount_chart(&server, "GONE", "1d", not_found).await;

    let fetcher = YahooQuoteFetcher::with_base_url(client(), &server.uri());
    let err = fetcher.fetch(&symbol("GONE")).await.unwrap_err();

    assert!(err.cause.contains("404"));
}

fn report(csv: &str) -> Report {
    Report {
        subject: "[Daily Gaps] 2026-10-13 [1 gap down, 0 gap up, 1 stocks]".to_string(),
        html_body: "<p>body</p>".to_string(),
        attachment_name: "gap_analysis_20261013.csv".to_string(),
        csv_attachment: csv.to_string(),
    }
}

#[tokio::test]
async fn test_resend_posts_report_with_attachment() {
    let server = MockServer::start().await;
    let csv = "symbol,gap_pct\nAAPL,-2.00\n";

    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(header("authorization", "Bearer re_test"))
        .and(body_partial_json(json!({
            "from": "scanner@example.com",
            "to": ["me@example.com"],
            "subject": "[Daily Gaps] 2026-10-13 [1 gap down, 0 gap up, 1 stocks]",
            "attachments": [{
                "filename": "gap_analysis_20261013.csv",
                "content": STANDARD.encode(csv)
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "email-123" })))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = ResendNotifier::with_base_url(
        client(),
        "re_test",
        "scanner@example.com",
        vec!["me@example.com".to_string()],
        &server.uri(),
    );
    let receipt = notifier.send(&report(csv)).await.unwrap();

    assert_eq!(receipt.id, "email-123");
}

#[tokio::test]
async fn test_resend_unauthorized_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(401).set_body_string("API key is invalid"))
        .mount(&server)
        .await;

    let notifier = ResendNotifier::with_base_url(
        client(),
        "re_bad",
        "scanner@example.com",
        vec!["me@example.com".to_string()],
        &server.uri(),
    );
    let err = notifier.send(&report("a\n")).await.unwrap_err();

    match err {
        DeliveryError::Rejected { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("RESEND_API_KEY"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_listing_follows_pages_and_merges_exchanges() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v3/reference/tickers"))
        .and(query_param("exchange", "XNYS"))
        .and(query_param("apiKey", "pk_test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "ticker": "IBM" }, { "ticker": "BRK.B" }],
            "next_url": format!("{}/v3/reference/tickers/page2?cursor=abc", server.uri())
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/reference/tickers/page2"))
        .and(query_param("cursor", "abc"))
        .and(query_param("apiKey", "pk_test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "ticker": "GE" }, { "ticker": "IBM" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/reference/tickers"))
        .and(query_param("exchange", "XNAS"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "ticker": "AAPL" }]
        })))
        .mount(&server)
        .await;

    let source = ExchangeListingSource::with_base_url(client(), "pk_test", &server.uri());
    let symbols = source.list_tickers().await.unwrap();
    let symbols: Vec<&str> = symbols.iter().map(|s| s.as_str()).collect();

    assert_eq!(symbols, vec!["AAPL", "BRK-B", "GE", "IBM"]);
}

#[tokio::test]
async fn test_listing_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let source = ExchangeListingSource::with_base_url(client(), "pk_bad", &server.uri());
    let err = source.list_tickers().await.unwrap_err();

    assert!(err.to_string().contains("XNYS listing"));
}

#[tokio::test]
async fn test_resend_request_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": "late" }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let notifier = ResendNotifier::with_base_url(
        HttpClient::new(Duration::from_millis(200)),
        "re_test",
        "scanner@example.com",
        vec!["me@example.com".to_string()],
        &server.uri(),
    );
    let err = notifier.send(&report("a\n")).await.unwrap_err();

    match err {
        DeliveryError::Request(cause) => assert!(cause.contains("timed out")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_listing_request_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "results": [] }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let source = ExchangeListingSource::with_base_url(
        HttpClient::new(Duration::from_millis(200)),
        "pk_test",
        &server.uri(),
    );
    let err = source.list_tickers().await.unwrap_err();

    match err {
        TickerSourceError::Provider(cause) => assert!(cause.contains("timed out")),
        other => panic!("unexpected error: {:?}", other),
    }
}
