//! Error types for the backtest engine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A strategy failure at a rebalance date
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("rebalance on {date} failed: {message}")]
pub struct RebalanceError {
    /// Rebalance date
    pub date: NaiveDate,
    /// Strategy error message
    pub message: String,
}

/// Errors that stop a backtest
#[derive(Debug, Error)]
pub enum BacktestError {
    /// Invalid engine configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The first rebalance failed, so there were no positions to hold
    #[error("Backtest aborted: {0}")]
    Aborted(#[from] RebalanceError),
}

/// Result type for backtest operations.
pub type Result<T> = std::result::Result<T, BacktestError>;
