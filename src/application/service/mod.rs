// src/application/service/mod.rs
// Application services

pub mod report;

pub use report::{format_pct, format_price, previous_trading_day, ReportBuilder};
