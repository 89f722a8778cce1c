// src/application/usecase/gap_scan_usecase.rs
// One scan run: tickers -> quotes -> gaps -> report -> email

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};

use crate::application::service::ReportBuilder;
use crate::domain::errors::{AppError, AppResult, QuoteFetchError};
use crate::domain::models::{
    Classification, DeliveryReceipt, FetchFailure, GapResult, Report, RunResult, TickerSymbol,
};
use crate::domain::repository::{Notifier, QuoteFetcher, TickerSource};
use crate::domain::service::GapCalculator;

const PROGRESS_EVERY: usize = 100;
const LOGGED_FAILURES: usize = 5;

/// Run lifecycle. `AbortedEarly` is terminal and reachable from `Init`
/// (no tickers) and from `ReportBuilt` (delivery failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Init,
    TickersLoaded,
    QuotesFetched,
    ReportBuilt,
    Sent,
    Done,
    AbortedEarly,
}

impl RunStage {
    pub fn can_advance_to(self, next: RunStage) -> bool {
        use RunStage::*;
        matches!(
            (self, next),
            (Init, TickersLoaded)
                | (TickersLoaded, QuotesFetched)
                | (QuotesFetched, ReportBuilt)
                | (ReportBuilt, Sent)
                | (Sent, Done)
                | (Init, AbortedEarly)
                | (ReportBuilt, AbortedEarly)
        )
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug)]
struct StageTracker {
    current: RunStage,
    history: Vec<RunStage>,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            current: RunStage::Init,
            history: vec![RunStage::Init],
        }
    }

    fn advance(&mut self, next: RunStage) {
        debug_assert!(
            self.current.can_advance_to(next),
            "illegal transition {} -> {}",
            self.current,
            next
        );
        log::debug!("Run stage {} -> {}", self.current, next);
        self.current = next;
        self.history.push(next);
    }

    fn abort(&mut self, err: AppError) -> AppError {
        log::error!("Run aborted at {} ({} stage): {}", self.current, err.stage(), err);
        self.advance(RunStage::AbortedEarly);
        err
    }
}

/// Fan-out limits for the quote stage
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub concurrency: usize,
    pub timeout: Duration,
    pub ticker_limit: Option<usize>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            concurrency: 8,
            timeout: Duration::from_secs(15),
            ticker_limit: None,
        }
    }
}

/// What a completed run produced
#[derive(Debug)]
pub struct RunSummary {
    pub run: RunResult,
    pub report: Report,
    pub receipt: DeliveryReceipt,
    pub stages: Vec<RunStage>,
}

/// Gap scan use case
#[async_trait]
pub trait GapScanUseCase {
    /// Execute a full run stamped with `run_at`.
    async fn run(&self, run_at: DateTime<Utc>) -> AppResult<RunSummary>;
}

pub struct GapScanner {
    ticker_source: Arc<dyn TickerSource>,
    quote_fetcher: Arc<dyn QuoteFetcher>,
    notifier: Arc<dyn Notifier>,
    calculator: GapCalculator,
    report_builder: ReportBuilder,
    options: FetchOptions,
}

impl GapScanner {
    pub fn new(
        ticker_source: Arc<dyn TickerSource>,
        quote_fetcher: Arc<dyn QuoteFetcher>,
        notifier: Arc<dyn Notifier>,
        calculator: GapCalculator,
        report_builder: ReportBuilder,
        options: FetchOptions,
    ) -> Self {
        Self {
            ticker_source,
            quote_fetcher,
            notifier,
            calculator,
            report_builder,
            options,
        }
    }

    /// Load the universe and apply the testing-mode cap. Empty is fatal.
    pub async fn load_tickers(&self) -> AppResult<Vec<TickerSymbol>> {
        let mut tickers = self.ticker_source.list_tickers().await?;
        if tickers.is_empty() {
            return Err(AppError::EmptyTickerSet(self.ticker_source.describe()));
        }

        if let Some(limit) = self.options.ticker_limit {
            if tickers.len() > limit {
                log::info!(
                    "TESTING MODE: using first {} tickers out of {} total",
                    limit,
                    tickers.len()
                );
                tickers.truncate(limit);
            }
        }
        Ok(tickers)
    }

    /// Fetch and classify every ticker. Individual failures are recorded, never raised.
    pub async fn fetch_all(&self, tickers: &[TickerSymbol], run_at: DateTime<Utc>) -> RunResult {
        let total = tickers.len();
        let timeout = self.options.timeout;
        let fetcher = &self.quote_fetcher;

        log::info!(
            "Scanning {} tickers via {} ({} concurrent, {:?} timeout)",
            total,
            fetcher.provider_name(),
            self.options.concurrency,
            timeout
        );

        let outcomes = stream::iter(tickers.iter().cloned())
            .map(move |symbol| async move {
                let outcome = match tokio::time::timeout(timeout, fetcher.fetch(&symbol)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(QuoteFetchError::new(
                        symbol.as_str(),
                        format!("timed out after {:?}", timeout),
                    )),
                };
                (symbol, outcome)
            })
            .buffer_unordered(self.options.concurrency.max(1));
        futures_util::pin_mut!(outcomes);

        let mut results: Vec<GapResult> = Vec::with_capacity(total);
        let mut failures: Vec<FetchFailure> = Vec::new();
        let mut done = 0;

        while let Some((symbol, outcome)) = outcomes.next().await {
            done += 1;
            match outcome {
                Ok(quote) => {
                    let result = self.calculator.classify(&quote);
                    if result.classification != Classification::Neutral {
                        log::debug!(
                            "{}: {} ${} -> ${} ({:.2}%)",
                            result.classification,
                            result.symbol,
                            result.previous_close,
                            result.current_price,
                            result.gap_pct
                        );
                    }
                    results.push(result);
                }
                Err(err) => {
                    if failures.len() < LOGGED_FAILURES {
                        log::warn!("Skipping {}: {}", symbol, err.cause);
                    } else {
                        log::debug!("Skipping {}: {}", symbol, err.cause);
                    }
                    failures.push(FetchFailure {
                        symbol,
                        reason: err.cause,
                    });
                }
            }

            if done % PROGRESS_EVERY == 0 || done == total {
                log::info!(
                    "Progress: {}/{} ({:.1}%) - ok: {}, failed: {}",
                    done,
                    total,
                    done as f64 / total as f64 * 100.0,
                    results.len(),
                    failures.len()
                );
            }
        }

        let run = RunResult::new(results, failures, run_at);
        log::info!(
            "Scan complete: {} succeeded, {} failed, {} gap down, {} gap up",
            run.succeeded(),
            run.failures.len(),
            run.count(Classification::GapDown),
            run.count(Classification::GapUp)
        );
        run
    }
}

#[async_trait]
impl GapScanUseCase for GapScanner {
    async fn run(&self, run_at: DateTime<Utc>) -> AppResult<RunSummary> {
        let mut stage = StageTracker::new();

        let tickers = match self.load_tickers().await {
            Ok(tickers) => tickers,
            Err(err) => return Err(stage.abort(err)),
        };
        log::info!("Loaded {} tickers from {}", tickers.len(), self.ticker_source.describe());
        stage.advance(RunStage::TickersLoaded);

        let run = self.fetch_all(&tickers, run_at).await;
        stage.advance(RunStage::QuotesFetched);

        let report = self.report_builder.build(&run);
        stage.advance(RunStage::ReportBuilt);

        let receipt = match self.notifier.send(&report).await {
            Ok(receipt) => receipt,
            Err(err) => {
                // The report exists nowhere else once the process exits
                log::error!(
                    "Undelivered report \"{}\" ({} bytes body, {} bytes attachment)",
                    report.subject,
                    report.html_body.len(),
                    report.csv_attachment.len()
                );
                return Err(stage.abort(err.into()));
            }
        };
        stage.advance(RunStage::Sent);

        log::info!("Report delivered (id {})", receipt.id);
        stage.advance(RunStage::Done);

        Ok(RunSummary {
            run,
            report,
            receipt,
            stages: stage.history,
        })
    }
}

/// Send a one-line message to check the delivery credential; no scan.
pub async fn send_test_email(
    notifier: &dyn Notifier,
    report_builder: &ReportBuilder,
    now: DateTime<Utc>,
) -> AppResult<DeliveryReceipt> {
    let report = report_builder.test_message(now);
    Ok(notifier.send(&report).await?)
}
