//! Sample covariance estimator.

use super::{CovarianceError, CovarianceEstimator};
use ndarray::{Array2, ArrayView2, Axis};

/// Unbiased sample covariance of the factor return matrix.
#[derive(Debug, Clone)]
pub struct SampleCovarianceEstimator {
    min_observations: usize,
}

impl Default for SampleCovarianceEstimator {
    fn default() -> Self {
        Self {
            min_observations: 2,
        }
    }
}

impl SampleCovarianceEstimator {
    /// Require at least `min_observations` periods (never fewer than 2).
    pub fn with_min_observations(min_observations: usize) -> Self {
        Self {
            min_observations: min_observations.max(2),
        }
    }
}

impl CovarianceEstimator for SampleCovarianceEstimator {
    fn estimate(
        &self,
        factor_returns: ArrayView2<'_, f64>,
    ) -> Result<Array2<f64>, CovarianceError> {
        let n = factor_returns.nrows();
        if n < self.min_observations {
            return Err(CovarianceError::InsufficientData {
                required: self.min_observations,
                actual: n,
            });
        }

        let mean = factor_returns
            .mean_axis(Axis(0))
            .ok_or(CovarianceError::InsufficientData {
                required: self.min_observations,
                actual: 0,
            })?;
        let centered = &factor_returns - &mean;
        let cov = centered.t().dot(&centered) / (n as f64 - 1.0);

        if cov.iter().any(|v| !v.is_finite()) {
            return Err(CovarianceError::NonFinite);
        }
        Ok(cov)
    }
}
