//! Error types for portfolio construction.

use crate::solver::SolveStatus;
use hobart_risk::CovarianceError;
use thiserror::Error;

/// Errors raised while building or solving a portfolio.
#[derive(Debug, Error)]
pub enum OptimizerError {
    /// Invalid constraint or method configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Input vectors and matrices disagree in size
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// The solver could not be set up or run
    #[error("Solver error: {0}")]
    Solver(String),

    /// The solver returned nothing usable
    #[error("Optimization infeasible (status {status}): {reason}")]
    Infeasible {
        /// Status reported by the solver
        status: SolveStatus,
        /// What was wrong with the output
        reason: String,
    },

    /// Factor covariance could not be factorised
    #[error("Covariance error: {0}")]
    Covariance(#[from] CovarianceError),
}

/// Result type for portfolio construction.
pub type Result<T> = std::result::Result<T, OptimizerError>;
