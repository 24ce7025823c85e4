//! Error types for data operations.

use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur during data operations.
#[derive(Debug, Error)]
pub enum DataError {
    /// Price or factor history is missing for a date or asset that a
    /// computation requires.
    #[error("Data alignment error: {0}")]
    Alignment(String),

    /// Data parsing error
    #[error("Data parsing error: {0}")]
    Parse(String),

    /// Duplicate symbol in a panel
    #[error("Duplicate symbol: {0}")]
    DuplicateSymbol(String),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
