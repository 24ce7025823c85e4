//! Error types for the pipeline.

use crate::config::ConfigError;
use chrono::NaiveDate;
use hobart_backtest::BacktestError;
use hobart_data::DataError;
use hobart_optimizer::OptimizerError;
use hobart_output::AttributionError;
use hobart_risk::RiskModelError;
use hobart_signals::SignalError;
use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised while running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Market data error.
    #[error(transparent)]
    Data(#[from] DataError),

    /// Alpha computation failed.
    #[error(transparent)]
    Signal(#[from] SignalError),

    /// Risk model estimation failed.
    #[error(transparent)]
    RiskModel(#[from] RiskModelError),

    /// Portfolio construction failed.
    #[error(transparent)]
    Optimizer(#[from] OptimizerError),

    /// Backtest failed.
    #[error(transparent)]
    Backtest(#[from] BacktestError),

    /// Attribution failed.
    #[error(transparent)]
    Attribution(#[from] AttributionError),

    /// No asset has both a finite alpha and a risk estimate.
    #[error("no investable assets on {date}")]
    EmptyUniverse {
        /// Decision date.
        date: NaiveDate,
    },

    /// No factor returns follow the holding date.
    #[error("no factor returns after {after}")]
    EmptyWindow {
        /// Holding date.
        after: NaiveDate,
    },
}
