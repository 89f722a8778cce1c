// src/main.rs
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};

use gap_scanner::application::service::ReportBuilder;
use gap_scanner::application::usecase::{
    refresh_ticker_file, send_test_email, FetchOptions, GapScanUseCase, GapScanner,
};
use gap_scanner::config::{Audience, Config, DataProvider, TickerSourceKind};
use gap_scanner::domain::errors::{AppError, AppResult};
use gap_scanner::domain::repository::{Notifier, QuoteFetcher, TickerSource};
use gap_scanner::domain::service::GapCalculator;
use gap_scanner::infrastructure::{
    CsvTickerSource, ExchangeListingSource, HttpClient, ResendNotifier, Sp500Listing,
    YahooQuoteFetcher,
};

/// Daily overnight-gap scanner. Intended to be triggered by cron.
#[derive(Debug, Parser)]
#[command(name = "gap_scanner", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Command {
    /// Scan and email the personal recipients (default)
    Email,
    /// Scan and email every configured recipient
    EmailAll,
    /// Send a test message to verify the delivery settings
    TestEmail,
    /// Rewrite the TICKERS_CSV file with the current S&P 500 constituents
    RefreshTickers,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli.command.unwrap_or(Command::Email)).await {
        log::error!("FATAL ({} stage): {}", err.stage(), err);
        eprintln!("FATAL ({} stage): {}", err.stage(), err);
        std::process::exit(err.exit_code());
    }
}

async fn run(command: Command) -> AppResult<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    config.init_logging()?;

    log::info!("Starting gap_scanner v{}", env!("CARGO_PKG_VERSION"));
    config.log_summary();

    let http = HttpClient::new(config.http.request_timeout);

    let audience = match command {
        Command::EmailAll => Audience::All,
        Command::Email | Command::TestEmail => Audience::Personal,
        Command::RefreshTickers => return refresh_tickers(&config, http).await,
    };
    let recipients = config.email.recipients(audience)?;

    let notifier: Arc<dyn Notifier> = Arc::new(ResendNotifier::new(
        http.clone(),
        &config.email.api_key,
        &config.email.from,
        recipients,
    ));
    let quote_fetcher = create_quote_fetcher(&config, &http);
    let ticker_source = create_ticker_source(&config, &http)?;

    let report_builder = ReportBuilder::new(
        config.scan.thresholds,
        &config.email.subject_prefix,
        quote_fetcher.provider_name(),
        &ticker_source.describe(),
    );

    if let Command::TestEmail = command {
        let receipt = send_test_email(notifier.as_ref(), &report_builder, Utc::now()).await?;
        log::info!("Test email sent, id {}", receipt.id);
        return Ok(());
    }

    let scanner = GapScanner::new(
        ticker_source,
        quote_fetcher,
        notifier,
        GapCalculator::new(config.scan.thresholds),
        report_builder,
        FetchOptions {
            concurrency: config.scan.fetch_concurrency,
            timeout: config.scan.fetch_timeout,
            ticker_limit: config.scan.ticker_limit,
        },
    );

    let summary = scanner.run(Utc::now()).await?;
    log::info!(
        "Run finished: {} of {} tickers succeeded, email id {}",
        summary.run.succeeded(),
        summary.run.total(),
        summary.receipt.id
    );
    Ok(())
}

async fn refresh_tickers(config: &Config, http: HttpClient) -> AppResult<()> {
    let TickerSourceKind::CsvFile(path) = &config.scan.tickers else {
        return Err(AppError::Config(
            "refresh-tickers needs TICKERS_CSV to name a file".to_string(),
        ));
    };

    let count = refresh_ticker_file(&Sp500Listing::new(http), &CsvTickerSource::new(path.clone()))
        .await?;
    log::info!("Wrote {} tickers to {}", count, path.display());
    Ok(())
}

/// Create the quote fetcher based on configuration
fn create_quote_fetcher(config: &Config, http: &HttpClient) -> Arc<dyn QuoteFetcher> {
    match config.data_source.provider {
        DataProvider::Yahoo => Arc::new(YahooQuoteFetcher::new(http.clone())),
    }
}

/// Create the ticker source based on configuration
fn create_ticker_source(config: &Config, http: &HttpClient) -> AppResult<Arc<dyn TickerSource>> {
    match &config.scan.tickers {
        TickerSourceKind::CsvFile(path) => Ok(Arc::new(CsvTickerSource::new(path.clone()))),
        TickerSourceKind::AllExchanges => {
            let api_key = config.data_source.listing_api_key.as_deref().ok_or_else(|| {
                AppError::Config("POLYGON_API_KEY is required for the exchange listing".to_string())
            })?;
            Ok(Arc::new(ExchangeListingSource::new(http.clone(), api_key)))
        }
    }
}
