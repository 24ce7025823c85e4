//! Specific risk estimation
//!
//! Estimates the idiosyncratic (non-factor) variance of each asset from the
//! residuals of its factor regression.

pub mod estimate;

pub use estimate::{SpecificRiskConfig, SpecificRiskEstimator, VarianceMethod};

use thiserror::Error;

/// Errors that can occur during specific risk estimation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpecificRiskError {
    /// Insufficient data for estimation
    #[error("Insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData {
        /// Required number of observations
        required: usize,
        /// Actual number of observations
        actual: usize,
    },

    /// Invalid variance estimate
    #[error("Invalid variance: {0}")]
    InvalidVariance(String),
}
