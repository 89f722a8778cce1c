// src/config.rs
use crate::domain::errors::{AppError, AppResult};
use crate::domain::models::Thresholds;
use dotenv::dotenv;
use rust_decimal::Decimal;
use std::env;
use std::fs::File;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// `TICKERS_CSV` value selecting the full NYSE/NASDAQ listing.
pub const ALL_EXCHANGES_SENTINEL: &str = "ALL";

/// Ticker cap applied when `TESTING_MODE=true`.
pub const TESTING_MODE_LIMIT: usize = 50;

const DEFAULT_TICKERS_CSV: &str = "sp500_tickers.csv";
const DEFAULT_SUBJECT_PREFIX: &str = "[Daily Gaps]";
const DEFAULT_FETCH_CONCURRENCY: usize = 8;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Gap scanner configuration, loaded once at start-up and read-only afterwards
#[derive(Debug, Clone)]
pub struct Config {
    /// Thresholds, ticker universe and fetch limits
    pub scan: ScanConfig,

    /// Market-data provider selection
    pub data_source: DataSourceConfig,

    /// Delivery provider and recipients
    pub email: EmailConfig,

    /// Outbound HTTP settings shared by every provider
    pub http: HttpConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickerSourceKind {
    /// One symbol per row, first column
    CsvFile(PathBuf),

    /// Every active NYSE/NASDAQ listing
    AllExchanges,
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub thresholds: Thresholds,

    pub tickers: TickerSourceKind,

    /// Only scan the first N tickers (testing mode)
    pub ticker_limit: Option<usize>,

    /// Quote lookups in flight at once
    pub fetch_concurrency: usize,

    /// Upper bound for a single quote lookup
    pub fetch_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataProvider {
    Yahoo,
}

impl DataProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataProvider::Yahoo => "yahoo",
        }
    }
}

impl FromStr for DataProvider {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "yahoo" | "yfinance" | "yahoo_finance" => Ok(DataProvider::Yahoo),
            other => Err(AppError::Config(format!("Unsupported DATA_SOURCE: {}", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DataSourceConfig {
    pub provider: DataProvider,

    /// Polygon credential for the all-exchanges listing
    pub listing_api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Deadline for any single provider request
    pub request_timeout: Duration,
}

/// Which recipient list a run delivers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Personal,
    All,
}

#[derive(Clone)]
pub struct EmailConfig {
    pub api_key: String,
    pub from: String,
    pub to: Vec<String>,
    pub personal: Vec<String>,
    pub all: Vec<String>,
    pub subject_prefix: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("api_key", &"<redacted>")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("personal", &self.personal)
            .field("all", &self.all)
            .field("subject_prefix", &self.subject_prefix)
            .finish()
    }
}

impl EmailConfig {
    /// Resolve the recipient list for `audience`, falling back to `EMAIL_TO`.
    pub fn recipients(&self, audience: Audience) -> AppResult<Vec<String>> {
        let (list, var) = match audience {
            Audience::Personal => (&self.personal, "PERSONAL_EMAILS"),
            Audience::All => (&self.all, "RECEIVER_EMAIL_ADDRESS"),
        };
        let recipients = if list.is_empty() { &self.to } else { list };
        if recipients.is_empty() {
            return Err(AppError::Config(format!(
                "No recipients configured; set {} or EMAIL_TO",
                var
            )));
        }
        Ok(recipients.clone())
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "warn", "error")
    pub level: String,

    /// Log to file
    pub to_file: bool,

    /// Log file path
    pub file_path: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let thresholds = Thresholds::new(
            required_decimal(&var, "MIN_GAP_DOWN_PCT")?,
            required_decimal(&var, "MIN_GAP_UP_PCT")?,
        )
        .map_err(AppError::Config)?;

        let tickers = match var("TICKERS_CSV") {
            Some(v) if v.eq_ignore_ascii_case(ALL_EXCHANGES_SENTINEL) => {
                TickerSourceKind::AllExchanges
            }
            Some(path) => TickerSourceKind::CsvFile(PathBuf::from(path)),
            None => TickerSourceKind::CsvFile(PathBuf::from(DEFAULT_TICKERS_CSV)),
        };

        let testing_mode = parse_bool(var("TESTING_MODE"));
        let fetch_concurrency = parse_number(&var, "FETCH_CONCURRENCY", DEFAULT_FETCH_CONCURRENCY)?;
        if fetch_concurrency == 0 {
            return Err(AppError::Config("FETCH_CONCURRENCY must be at least 1".to_string()));
        }
        let timeout_secs = parse_number(&var, "FETCH_TIMEOUT_SECS", DEFAULT_FETCH_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(AppError::Config("FETCH_TIMEOUT_SECS must be at least 1".to_string()));
        }

        let scan = ScanConfig {
            thresholds,
            tickers,
            ticker_limit: testing_mode.then_some(TESTING_MODE_LIMIT),
            fetch_concurrency,
            fetch_timeout: Duration::from_secs(timeout_secs),
        };

        let data_source = DataSourceConfig {
            provider: var("DATA_SOURCE")
                .map(|v| v.parse::<DataProvider>())
                .transpose()?
                .unwrap_or(DataProvider::Yahoo),
            listing_api_key: var("POLYGON_API_KEY"),
        };

        if scan.tickers == TickerSourceKind::AllExchanges && data_source.listing_api_key.is_none() {
            return Err(AppError::Config(
                "TICKERS_CSV=ALL requires POLYGON_API_KEY for the exchange listing".to_string(),
            ));
        }

        let email = EmailConfig {
            api_key: var("RESEND_API_KEY").ok_or_else(|| {
                AppError::Config("Missing RESEND_API_KEY environment variable".to_string())
            })?,
            from: var("EMAIL_FROM").ok_or_else(|| {
                AppError::Config("Missing EMAIL_FROM environment variable".to_string())
            })?,
            to: split_list(var("EMAIL_TO")),
            personal: split_list(var("PERSONAL_EMAILS")),
            all: split_list(var("RECEIVER_EMAIL_ADDRESS")),
            subject_prefix: var("EMAIL_SUBJECT_PREFIX")
                .unwrap_or_else(|| DEFAULT_SUBJECT_PREFIX.to_string()),
        };

        let request_timeout_secs =
            parse_number(&var, "REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?;
        if request_timeout_secs == 0 {
            return Err(AppError::Config("REQUEST_TIMEOUT_SECS must be at least 1".to_string()));
        }
        let http = HttpConfig {
            request_timeout: Duration::from_secs(request_timeout_secs),
        };

        let logging = LoggingConfig {
            level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            to_file: parse_bool(var("LOG_TO_FILE")),
            file_path: var("LOG_FILE_PATH"),
        };

        Ok(Config {
            scan,
            data_source,
            email,
            http,
            logging,
        })
    }

    /// Log the loaded settings without revealing credentials
    pub fn log_summary(&self) {
        let set = |present: bool| if present { "SET" } else { "NOT SET" };
        match &self.scan.tickers {
            TickerSourceKind::CsvFile(path) => log::info!("TICKERS_CSV: {}", path.display()),
            TickerSourceKind::AllExchanges => log::info!("TICKERS_CSV: all NYSE/NASDAQ listings"),
        }
        log::info!("DATA_SOURCE: {}", self.data_source.provider.as_str());
        log::info!("TESTING_MODE: {}", self.scan.ticker_limit.is_some());
        log::info!("GAP_DOWN_THRESHOLD: {}%", self.scan.thresholds.gap_down_pct);
        log::info!("GAP_UP_THRESHOLD: {}%", self.scan.thresholds.gap_up_pct);
        log::info!(
            "FETCH: concurrency={}, timeout={}s",
            self.scan.fetch_concurrency,
            self.scan.fetch_timeout.as_secs()
        );
        log::info!("REQUEST_TIMEOUT: {}s", self.http.request_timeout.as_secs());
        log::info!("RESEND_API_KEY: {}", set(!self.email.api_key.is_empty()));
        log::info!("POLYGON_API_KEY: {}", set(self.data_source.listing_api_key.is_some()));
        log::info!("EMAIL_FROM: {}", set(!self.email.from.is_empty()));
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self) -> AppResult<()> {
        let mut builder = env_logger::Builder::new();

        let log_level = match self.logging.level.to_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            _ => log::LevelFilter::Info,
        };

        builder.filter_level(log_level);

        if self.logging.to_file {
            if let Some(file_path) = &self.logging.file_path {
                let file = File::create(file_path).map_err(|e| {
                    AppError::Config(format!("Failed to create log file: {}", e))
                })?;

                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
        }

        builder
            .try_init()
            .map_err(|e| AppError::Config(format!("Failed to initialise logger: {}", e)))
    }
}

fn required_decimal<F>(var: &F, key: &str) -> AppResult<Decimal>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = var(key)
        .ok_or_else(|| AppError::Config(format!("Missing {} environment variable", key)))?;
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|e| AppError::Config(format!("Invalid {} value {:?}: {}", key, raw, e)))
}

fn parse_number<F, T>(var: &F, key: &str, default: T) -> AppResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid {} value {:?}: {}", key, raw, e))),
        None => Ok(default),
    }
}

fn parse_bool(value: Option<String>) -> bool {
    value
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

fn split_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
