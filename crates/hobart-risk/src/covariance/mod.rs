//! Factor covariance estimation
//!
//! The factor covariance is computed once per estimation window from the
//! T x F factor return matrix and shared by every asset.

pub mod ewma;
pub mod sample;
pub mod utils;

pub use ewma::{EwmaConfig, EwmaCovarianceEstimator};
pub use sample::SampleCovarianceEstimator;
pub use utils::{
    EigenDecomposition, PositiveDefiniteConfig, enforce_positive_definite, is_symmetric,
    jacobi_eigendecomp,
};

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during covariance estimation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CovarianceError {
    /// Insufficient data for estimation
    #[error("Insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData {
        /// Required number of observations
        required: usize,
        /// Actual number of observations
        actual: usize,
    },

    /// Invalid decay parameter
    #[error("Invalid decay parameter: {0} (must be between 0 and 1)")]
    InvalidDecay(f64),

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// Matrix contains NaN or infinite entries
    #[error("Matrix contains non-finite values")]
    NonFinite,
}

/// Trait for covariance matrix estimators
pub trait CovarianceEstimator: std::fmt::Debug + Send + Sync {
    /// Estimate the covariance matrix from factor returns
    ///
    /// # Arguments
    /// * `factor_returns` - Matrix where each row is a time period and each column is a factor
    ///
    /// # Returns
    /// * Estimated covariance matrix (F x F)
    fn estimate(&self, factor_returns: ArrayView2<'_, f64>)
    -> Result<Array2<f64>, CovarianceError>;
}

/// Selects the factor covariance estimator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum CovarianceMethod {
    /// Unweighted sample covariance (n - 1 denominator)
    Sample,
    /// Exponentially weighted covariance
    Ewma {
        /// Decay factor λ in (0, 1)
        decay: f64,
    },
}

impl Default for CovarianceMethod {
    fn default() -> Self {
        Self::Sample
    }
}

impl CovarianceMethod {
    /// Build the estimator.
    ///
    /// # Errors
    /// Returns [`CovarianceError::InvalidDecay`] for an EWMA decay outside
    /// (0, 1).
    pub fn build(&self) -> Result<Box<dyn CovarianceEstimator>, CovarianceError> {
        Ok(match self {
            Self::Sample => Box::new(SampleCovarianceEstimator::default()),
            Self::Ewma { decay } => Box::new(EwmaCovarianceEstimator::new(EwmaConfig {
                decay: *decay,
                ..Default::default()
            })?),
        })
    }
}
