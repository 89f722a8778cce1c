pub mod gap_scan_usecase;
pub mod ticker_refresh_usecase;

// Re-export public API
pub use gap_scan_usecase::{
    send_test_email, FetchOptions, GapScanUseCase, GapScanner, RunStage, RunSummary,
};
pub use ticker_refresh_usecase::refresh_ticker_file;
