//! CSV and JSON export of backtest history, holdings and attribution.

use crate::attribution::{AttributionResult, AttributionRow, FactorAttribution};
use chrono::NaiveDate;
use hobart_backtest::{BacktestReport, PerformanceSummary, RunOutcome};
use hobart_optimizer::Portfolio;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma-separated values format.
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }

    /// Pick a format from a file extension; JSON files are pretty-printed.
    ///
    /// # Errors
    /// Returns [`ExportError::InvalidFormat`] for any other extension.
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("csv") => Ok(Self::Csv),
            Some("json") => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(format!(
                "cannot infer export format from extension {other:?}"
            ))),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pretty-json" | "pretty_json" => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// One simulated day of a backtest, flattened for export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryRecord {
    /// Simulated date.
    pub date: NaiveDate,

    /// Portfolio value at the end of the day.
    pub portfolio_value: f64,

    /// Day-over-day change in value.
    pub daily_return: f64,

    /// Compounded return since inception.
    pub cumulative_return: f64,

    /// Compounded benchmark return since inception.
    pub cumulative_benchmark: Option<f64>,

    /// Drawdown from the running peak.
    pub drawdown: f64,

    /// Rolling Sharpe ratio, once the window has filled.
    pub rolling_sharpe: Option<f64>,

    /// Whether positions were replaced.
    pub rebalanced: bool,

    /// Traded notional.
    pub turnover: f64,

    /// Transaction cost charged.
    pub cost: f64,

    /// Failed rebalance message.
    pub error: Option<String>,
}

/// One position held on one date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PositionRecord {
    /// Date the position was held.
    pub date: NaiveDate,

    /// Asset symbol.
    pub symbol: String,

    /// Signed position in currency units.
    pub position: f64,
}

/// Per-day records of a backtest.
pub fn history_records(report: &BacktestReport) -> Vec<HistoryRecord> {
    let series = &report.series;
    report
        .history
        .iter()
        .enumerate()
        .map(|(t, snapshot)| HistoryRecord {
            date: snapshot.date,
            portfolio_value: snapshot.portfolio_value,
            daily_return: series.daily_returns.get(t).copied().unwrap_or(0.0),
            cumulative_return: series.cumulative_returns.get(t).copied().unwrap_or(0.0),
            cumulative_benchmark: series.cumulative_benchmark.get(t).copied(),
            drawdown: series.drawdowns.get(t).copied().unwrap_or(0.0),
            rolling_sharpe: series.rolling_sharpe.get(t).copied().flatten(),
            rebalanced: snapshot.rebalanced,
            turnover: snapshot.turnover,
            cost: snapshot.cost,
            error: snapshot.error.as_ref().map(|e| e.message.clone()),
        })
        .collect()
}

/// Positions held on every rebalance date, in long format.
pub fn position_records(report: &BacktestReport) -> Vec<PositionRecord> {
    report
        .history
        .iter()
        .filter(|s| s.rebalanced)
        .flat_map(|s| {
            s.positions.iter().map(|(symbol, &position)| PositionRecord {
                date: s.date,
                symbol: symbol.clone(),
                position,
            })
        })
        .collect()
}

#[derive(Serialize)]
struct BacktestDocument<'a> {
    outcome: &'a RunOutcome,
    summary: &'a PerformanceSummary,
    history: Vec<HistoryRecord>,
}

#[derive(Serialize)]
struct AttributionDocument<'a> {
    factors: Vec<FactorAttribution>,
    specific_return: f64,
    specific_pct: f64,
    total_return: f64,
    cumulative_return: f64,
    rows: &'a [AttributionRow],
}

fn csv_string<T: Serialize>(records: &[T]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in records {
        wtr.serialize(record)?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).map_err(|e| ExportError::InvalidFormat(e.to_string()))
}

fn json_string<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String, ExportError> {
    if pretty {
        Ok(serde_json::to_string_pretty(value)?)
    } else {
        Ok(serde_json::to_string(value)?)
    }
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        tracing::debug!(path = %path.display(), bytes = content.len(), "exported");
        Ok(())
    }
}

impl<T: Serialize> Exporter for [T] {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => csv_string(self),
            ExportFormat::Json => json_string(self, false),
            ExportFormat::PrettyJson => json_string(self, true),
        }
    }
}

/// CSV carries the daily history; JSON adds the outcome and summary.
impl Exporter for BacktestReport {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        let history = history_records(self);
        if format == ExportFormat::Csv {
            return csv_string(&history);
        }
        let document = BacktestDocument {
            outcome: &self.outcome,
            summary: &self.summary,
            history,
        };
        json_string(&document, format == ExportFormat::PrettyJson)
    }
}

impl Exporter for PerformanceSummary {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => csv_string(std::slice::from_ref(self)),
            ExportFormat::Json => json_string(self, false),
            ExportFormat::PrettyJson => json_string(self, true),
        }
    }
}

/// CSV carries the holdings; JSON adds the portfolio statistics.
impl Exporter for Portfolio {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => csv_string(&self.holdings),
            ExportFormat::Json => json_string(self, false),
            ExportFormat::PrettyJson => json_string(self, true),
        }
    }
}

/// CSV carries the dated rows; JSON adds the per-factor summary.
impl Exporter for AttributionResult {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        let rows = self.rows();
        if format == ExportFormat::Csv {
            return csv_string(&rows);
        }
        let document = AttributionDocument {
            factors: self.factors(),
            specific_return: self.specific_return(),
            specific_pct: self.specific_pct,
            total_return: self.total_return(),
            cumulative_return: self.cumulative_return(),
            rows: &rows,
        };
        json_string(&document, format == ExportFormat::PrettyJson)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hobart_backtest::{Positions, Snapshot, performance_series, summarize};
    use rstest::rstest;

    fn report() -> BacktestReport {
        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        let positions: Positions = [("AAA".to_string(), 60.0), ("BBB".to_string(), -40.0)]
            .into_iter()
            .collect();
        let history = vec![
            Snapshot {
                date: day(2),
                portfolio_value: 101.0,
                positions: positions.clone(),
                rebalanced: true,
                turnover: 100.0,
                cost: 0.05,
                mark_return: 0.0105,
                error: None,
                stats: None,
            },
            Snapshot {
                date: day(3),
                portfolio_value: 101.0,
                positions,
                rebalanced: false,
                turnover: 0.0,
                cost: 0.0,
                mark_return: 0.0,
                error: None,
                stats: None,
            },
        ];
        let series =
            performance_series(&history, 100.0, 63).with_benchmark("mktrf", vec![0.02, 0.0]);
        let summary = summarize(&history, &series, 100.0);
        BacktestReport {
            history,
            series,
            summary,
            outcome: RunOutcome::Completed,
        }
    }

    #[test]
    fn test_history_csv() {
        let csv = report().export_to_string(ExportFormat::Csv).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some(
                "date,portfolio_value,daily_return,cumulative_return,cumulative_benchmark,drawdown,rolling_sharpe,rebalanced,turnover,cost,error"
            )
        );
        let first = lines.next().unwrap();
        assert!(first.starts_with("2024-01-02,101.0,"));
        let benchmark: f64 = first.split(',').nth(4).unwrap().parse().unwrap();
        assert!((benchmark - 0.02).abs() < 1e-12);
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn test_backtest_json_has_summary() {
        let json = report().export_to_string(ExportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["outcome"]["outcome"], "completed");
        assert_eq!(value["summary"]["rebalances"], 1);
        assert_eq!(value["summary"]["benchmark"], "mktrf");
        assert!(value["summary"]["information_ratio"].is_number());
        assert_eq!(value["history"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_position_records() {
        let records = position_records(&report());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].symbol, "AAA");
        let csv = records.export_to_string(ExportFormat::Csv).unwrap();
        assert!(csv.contains("2024-01-02,BBB,-40.0"));
    }

    #[rstest]
    #[case("csv", ExportFormat::Csv)]
    #[case("json", ExportFormat::Json)]
    #[case("pretty-json", ExportFormat::PrettyJson)]
    fn test_parse_format(#[case] name: &str, #[case] format: ExportFormat) {
        assert_eq!(name.parse::<ExportFormat>().unwrap(), format);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ExportFormat::from_path(Path::new("out/history.csv")).unwrap(),
            ExportFormat::Csv
        );
        assert!(matches!(
            ExportFormat::from_path(Path::new("out/history.xlsx")),
            Err(ExportError::InvalidFormat(_))
        ));
    }
}
