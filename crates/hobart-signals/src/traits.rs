//! Signal trait and error type.

use hobart_data::DataError;
use polars::prelude::*;
use thiserror::Error;

/// Errors raised while computing or combining signals.
#[derive(Debug, Error)]
pub enum SignalError {
    /// Polars evaluation failed.
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    /// Building the input frame failed.
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Input frame lacks a column the signal needs.
    #[error("Signal {signal} requires column {column}")]
    MissingColumn {
        /// Signal name
        signal: String,
        /// Missing column
        column: String,
    },

    /// A parameter is outside its valid range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// No signal is registered under this name.
    #[error("Unknown signal: {0}")]
    UnknownSignal(String),
}

/// A cross-sectional score computed from the long-format market frame.
///
/// Implementations take a frame with one row per (`symbol`, `date`) and
/// return a frame with `symbol`, `date` and [`Signal::score_column`].
pub trait Signal: std::fmt::Debug + Send + Sync {
    /// Unique signal name.
    fn name(&self) -> &str;

    /// Columns that must be present in the input frame.
    fn required_columns(&self) -> &[&str];

    /// Compute scores for every (symbol, date) in `data`.
    ///
    /// # Errors
    /// Returns an error if the lazy plan cannot be built.
    fn compute_scores(&self, data: LazyFrame) -> Result<LazyFrame, SignalError>;

    /// Name of the score column in the output frame.
    fn score_column(&self) -> String {
        format!("{}_score", self.name())
    }
}
