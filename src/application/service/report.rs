// src/application/service/report.rs
// Renders a finished run into the email subject, HTML body and CSV attachment

use std::cmp::Ordering;
use std::fmt::Write as _;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use chrono_tz::US::Eastern;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::domain::models::{Classification, GapResult, Report, RunResult, Thresholds};

/// Failed tickers listed in the body; the attachment always has all of them.
const MAX_LISTED_FAILURES: usize = 25;

const CSV_HEADER: &str =
    "symbol,current_price,previous_close,gap_pct,classification,dollar_change,price_source,error";

/// Round half away from zero to two places, the way prices are quoted.
fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `+2.00` / `-2.00`, never `-0.00`.
fn signed(value: Decimal) -> String {
    let rounded = round2(value);
    let sign = if rounded < Decimal::ZERO { '-' } else { '+' };
    format!("{}{:.2}", sign, rounded.abs())
}

pub fn format_pct(value: Decimal) -> String {
    format!("{}%", signed(value))
}

pub fn format_price(value: Decimal) -> String {
    format!("${:.2}", round2(value))
}

fn format_change(value: Decimal) -> String {
    let s = signed(value);
    format!("{}${}", &s[..1], &s[1..])
}

fn color(value: Decimal) -> &'static str {
    match round2(value).cmp(&Decimal::ZERO) {
        Ordering::Less => "red",
        Ordering::Greater => "green",
        Ordering::Equal => "black",
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(|c| matches!(c, ',' | '"' | '\n' | '\r')) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Most recent weekday strictly before `today`, or the last Friday on a weekend.
pub fn previous_trading_day(today: NaiveDate) -> NaiveDate {
    let is_weekend = |d: NaiveDate| matches!(d.weekday(), Weekday::Sat | Weekday::Sun);
    let mut day = today;
    if !is_weekend(day) {
        day -= Duration::days(1);
    }
    while is_weekend(day) {
        day -= Duration::days(1);
    }
    day
}

fn ascending(a: &GapResult, b: &GapResult) -> Ordering {
    a.gap_pct.cmp(&b.gap_pct).then_with(|| a.symbol.cmp(&b.symbol))
}

fn descending(a: &GapResult, b: &GapResult) -> Ordering {
    b.gap_pct.cmp(&a.gap_pct).then_with(|| a.symbol.cmp(&b.symbol))
}

#[derive(Debug, Clone)]
pub struct ReportBuilder {
    thresholds: Thresholds,
    subject_prefix: String,
    provider_name: String,
    universe: String,
}

impl ReportBuilder {
    pub fn new(
        thresholds: Thresholds,
        subject_prefix: &str,
        provider_name: &str,
        universe: &str,
    ) -> Self {
        Self {
            thresholds,
            subject_prefix: subject_prefix.to_string(),
            provider_name: provider_name.to_string(),
            universe: universe.to_string(),
        }
    }

    /// Pure: the same run always renders to the same report.
    pub fn build(&self, run: &RunResult) -> Report {
        let gap_downs = self.rows(run, Classification::GapDown, ascending);
        let gap_ups = self.rows(run, Classification::GapUp, descending);
        let run_date = run.run_at.with_timezone(&Eastern).date_naive();

        let subject = format!(
            "{} {} [{} gap down, {} gap up, {} stocks]",
            self.subject_prefix,
            run_date.format("%Y-%m-%d"),
            gap_downs.len(),
            gap_ups.len(),
            run.succeeded()
        );

        Report {
            subject,
            html_body: self.html(run, &gap_downs, &gap_ups),
            attachment_name: format!("gap_analysis_{}.csv", run_date.format("%Y%m%d")),
            csv_attachment: self.csv(run),
        }
    }

    /// One-line message used to verify the delivery credential.
    pub fn test_message(&self, now: DateTime<Utc>) -> Report {
        let stamp = now.with_timezone(&Eastern).format("%Y-%m-%d %I:%M %p ET");
        Report {
            subject: format!("{} delivery test", self.subject_prefix),
            html_body: format!(
                "<p>This is a test email to verify the gap scanner's delivery settings ({}).</p>",
                stamp
            ),
            attachment_name: String::new(),
            csv_attachment: String::new(),
        }
    }

    fn rows<'a>(
        &self,
        run: &'a RunResult,
        classification: Classification,
        order: fn(&GapResult, &GapResult) -> Ordering,
    ) -> Vec<&'a GapResult> {
        let mut rows: Vec<&GapResult> = run
            .results
            .iter()
            .filter(|r| r.classification == classification)
            .collect();
        rows.sort_by(|a, b| order(a, b));
        rows
    }

    fn html(&self, run: &RunResult, gap_downs: &[&GapResult], gap_ups: &[&GapResult]) -> String {
        let now_et = run.run_at.with_timezone(&Eastern);
        let prev_day = previous_trading_day(now_et.date_naive());
        let failed = run.failures.len();

        let mut html = String::new();
        let _ = write!(
            html,
            "<h2>Daily Gap Analysis - {}</h2>\
             <p><strong>Data Source:</strong> {}</p>\
             <p><strong>Ticker Universe:</strong> {}</p>\
             <p><strong>Current Timestamp:</strong> {}</p>\
             <p><strong>Previous Close:</strong> {} at ~4:00 PM ET</p>\
             <p><strong>Gap Calculation:</strong> (Current price - Previous close) / Previous close &times; 100</p>\
             <p><strong>Gap Down Threshold:</strong> &le; {}%</p>\
             <p><strong>Gap Up Threshold:</strong> &ge; {}%</p>\
             <p><strong>Tickers:</strong> {} tickers succeeded, {} failed, {} total</p>",
            now_et.format("%Y-%m-%d"),
            html_escape::encode_text(&self.provider_name),
            html_escape::encode_text(&self.universe),
            now_et.format("%A, %Y-%m-%d at %I:%M %p ET"),
            prev_day.format("%A, %Y-%m-%d"),
            self.thresholds.gap_down_pct,
            self.thresholds.gap_up_pct,
            run.succeeded(),
            failed,
            run.total(),
        );

        if run.succeeded() == 0 {
            html.push_str("<p><strong>No quotes could be fetched for this run.</strong></p>");
        }

        if gap_downs.is_empty() && gap_ups.is_empty() {
            html.push_str(
                "<p><strong>No thresholds were crossed:</strong> \
                 no ticker gapped down or up past the configured limits.</p>",
            );
        } else {
            html.push_str(&self.table("Gap Down Stocks", gap_downs));
            html.push_str(&self.table("Gap Up Stocks", gap_ups));
        }

        if failed > 0 {
            let _ = write!(html, "<h3>Failed Lookups ({})</h3><ul>", failed);
            for failure in run.failures.iter().take(MAX_LISTED_FAILURES) {
                let _ = write!(
                    html,
                    "<li><b>{}</b>: {}</li>",
                    html_escape::encode_text(failure.symbol.as_str()),
                    html_escape::encode_text(&failure.reason)
                );
            }
            if failed > MAX_LISTED_FAILURES {
                let _ = write!(html, "<li>... and {} more</li>", failed - MAX_LISTED_FAILURES);
            }
            html.push_str("</ul>");
        }

        html.push_str(
            "<p><em>Complete data for every ticker, including failed lookups, is attached as CSV.</em></p>",
        );
        html
    }

    fn table(&self, title: &str, rows: &[&GapResult]) -> String {
        if rows.is_empty() {
            return format!("<h3>{}</h3><p>No stocks found.</p>", title);
        }

        let mut html = format!(
            "<h3>{} ({} stocks)</h3>\
             <table border='1' cellpadding='6' cellspacing='0' style='border-collapse:collapse; margin-bottom:20px;'>\
             <thead><tr><th>Ticker</th><th>Prev Close</th><th>Current</th><th>$ Change</th><th>Gap %</th></tr></thead>\
             <tbody>",
            title,
            rows.len()
        );
        for row in rows {
            let change = row.dollar_change();
            let _ = write!(
                html,
                "<tr><td><b>{}</b></td><td>{}</td><td>{}</td>\
                 <td style='color:{}'>{}</td><td style='color:{}'>{}</td></tr>",
                html_escape::encode_text(row.symbol.as_str()),
                format_price(row.previous_close),
                format_price(row.current_price),
                color(change),
                format_change(change),
                color(row.gap_pct),
                format_pct(row.gap_pct),
            );
        }
        html.push_str("</tbody></table>");
        html
    }

    fn csv(&self, run: &RunResult) -> String {
        let mut rows: Vec<&GapResult> = run.results.iter().collect();
        rows.sort_by(|a, b| ascending(a, b));

        let mut csv = String::from(CSV_HEADER);
        csv.push('\n');
        for row in rows {
            let _ = writeln!(
                csv,
                "{},{:.2},{:.2},{:.2},{},{:.2},{},",
                csv_field(row.symbol.as_str()),
                round2(row.current_price),
                round2(row.previous_close),
                round2(row.gap_pct),
                row.classification,
                round2(row.dollar_change()),
                row.source.as_str(),
            );
        }
        for failure in &run.failures {
            let _ = writeln!(
                csv,
                "{},,,,fetch_failed,,,{}",
                csv_field(failure.symbol.as_str()),
                csv_field(&failure.reason)
            );
        }
        csv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{FetchFailure, PriceSource, TickerSymbol};
    use crate::domain::service::GapCalculator;
    use crate::domain::models::Quote;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn run_at() -> DateTime<Utc> {
        // Tuesday 2026-10-13 13:30 UTC = 09:30 ET
        Utc.with_ymd_and_hms(2026, 10, 13, 13, 30, 0).unwrap()
    }

    fn thresholds() -> Thresholds {
        Thresholds::new(dec!(-1), dec!(1)).unwrap()
    }

    fn builder() -> ReportBuilder {
        ReportBuilder::new(thresholds(), "[Daily Gaps]", "Yahoo Finance", "file tickers.csv")
    }

    fn result(symbol: &str, prev: Decimal, current: Decimal) -> GapResult {
        GapCalculator::new(thresholds()).classify(&Quote {
            symbol: TickerSymbol::parse(symbol).unwrap(),
            current_price: current,
            previous_close: prev,
            source: PriceSource::CurrentMinute,
            fetched_at: run_at(),
        })
    }

    fn scenario_run() -> RunResult {
        RunResult::new(
            vec![
                result("MSFT", dec!(100), dec!(100.5)),
                result("GOOG", dec!(100), dec!(102)),
                result("AAPL", dec!(100), dec!(98)),
            ],
            Vec::new(),
            run_at(),
        )
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format_pct(dec!(-2)), "-2.00%");
        assert_eq!(format_pct(dec!(0.5)), "+0.50%");
        assert_eq!(format_pct(dec!(-0.001)), "+0.00%");
        assert_eq!(format_pct(dec!(1.005)), "+1.01%");
        assert_eq!(format_price(dec!(98)), "$98.00");
        assert_eq!(format_change(dec!(-2)), "-$2.00");
    }

    #[test]
    fn test_previous_trading_day() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        // Tuesday -> Monday
        assert_eq!(previous_trading_day(d(2026, 10, 13)), d(2026, 10, 12));
        // Monday -> Friday
        assert_eq!(previous_trading_day(d(2026, 10, 12)), d(2026, 10, 9));
        // Sunday -> Friday
        assert_eq!(previous_trading_day(d(2026, 10, 11)), d(2026, 10, 9));
    }

    #[test]
    fn test_scenario_tables() {
        let report = builder().build(&scenario_run());

        assert_eq!(
            report.subject,
            "[Daily Gaps] 2026-10-13 [1 gap down, 1 gap up, 3 stocks]"
        );
        let down_table = report.html_body.split("Gap Up Stocks").next().unwrap();
        assert!(down_table.contains("<b>AAPL</b>"));
        assert!(!down_table.contains("<b>GOOG</b>"));
        assert!(!report.html_body.contains("<b>MSFT</b>"));
        assert!(report.html_body.contains("-2.00%"));
        assert!(report.html_body.contains("+2.00%"));
        assert_eq!(report.attachment_name, "gap_analysis_20261013.csv");
    }

    #[test]
    fn test_scenario_attachment() {
        let report = builder().build(&scenario_run());
        let lines: Vec<&str> = report.csv_attachment.lines().collect();

        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "AAPL,98.00,100.00,-2.00,gap_down,-2.00,current_minute,");
        assert_eq!(lines[2], "MSFT,100.50,100.00,0.50,neutral,0.50,current_minute,");
        assert_eq!(lines[3], "GOOG,102.00,100.00,2.00,gap_up,2.00,current_minute,");
    }

    #[test]
    fn test_gap_up_sorted_descending() {
        let run = RunResult::new(
            vec![
                result("AAA", dec!(100), dec!(101)),
                result("BBB", dec!(100), dec!(105)),
                result("CCC", dec!(100), dec!(90)),
                result("DDD", dec!(100), dec!(95)),
            ],
            Vec::new(),
            run_at(),
        );
        let html = builder().build(&run).html_body;
        let pos = |s: &str| html.find(s).unwrap();
        assert!(pos("<b>BBB</b>") < pos("<b>AAA</b>"));
        assert!(pos("<b>CCC</b>") < pos("<b>DDD</b>"));
    }

    #[test]
    fn test_no_crossings_stated() {
        let run = RunResult::new(
            vec![result("MSFT", dec!(100), dec!(100.5))],
            Vec::new(),
            run_at(),
        );
        let report = builder().build(&run);
        assert!(report.html_body.contains("No thresholds were crossed"));
        assert!(report.subject.contains("[0 gap down, 0 gap up, 1 stocks]"));
    }

    #[test]
    fn test_total_failure_report() {
        let run = RunResult::new(
            Vec::new(),
            vec![FetchFailure {
                symbol: TickerSymbol::parse("SLOW").unwrap(),
                reason: "timed out after 15s".into(),
            }],
            run_at(),
        );
        let report = builder().build(&run);
        assert!(report.html_body.contains("0 tickers succeeded"));
        assert!(report.html_body.contains("<b>SLOW</b>: timed out after 15s"));
        assert_eq!(
            report.csv_attachment.lines().nth(1),
            Some("SLOW,,,,fetch_failed,,,timed out after 15s")
        );
    }

    #[test]
    fn test_failure_reason_is_escaped() {
        let run = RunResult::new(
            Vec::new(),
            vec![FetchFailure {
                symbol: TickerSymbol::parse("BAD").unwrap(),
                reason: "HTTP 404: <html>, \"nope\"".into(),
            }],
            run_at(),
        );
        let report = builder().build(&run);
        assert!(report.html_body.contains("&lt;html&gt;"));
        assert!(report
            .csv_attachment
            .contains("BAD,,,,fetch_failed,,,\"HTTP 404: <html>, \"\"nope\"\"\""));
    }

    #[test]
    fn test_build_is_idempotent() {
        let run = scenario_run();
        let builder = builder();
        assert_eq!(builder.build(&run), builder.build(&run));
    }
}
