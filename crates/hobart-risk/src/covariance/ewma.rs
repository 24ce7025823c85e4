//! Exponentially Weighted Moving Average (EWMA) Covariance Estimator
//!
//! Observation `t` of `T` carries weight `λ^(T-1-t)`, so the most recent
//! period counts most. Returns are demeaned with the same weights before the
//! weighted outer products are summed.

use super::{CovarianceError, CovarianceEstimator};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// EWMA covariance estimator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EwmaConfig {
    /// Decay factor λ (default: 0.94)
    pub decay: f64,

    /// Minimum number of observations required (default: 2)
    pub min_observations: usize,

    /// Apply the effective-sample-size correction `1 / (1 - Σw²)` to the
    /// normalised weights
    pub bias_correction: bool,
}

impl Default for EwmaConfig {
    fn default() -> Self {
        Self {
            decay: 0.94,
            min_observations: 2,
            bias_correction: true,
        }
    }
}

/// EWMA covariance estimator
#[derive(Debug, Clone)]
pub struct EwmaCovarianceEstimator {
    config: EwmaConfig,
}

impl EwmaCovarianceEstimator {
    /// Create a new EWMA estimator with the given configuration
    ///
    /// # Errors
    /// Returns [`CovarianceError::InvalidDecay`] unless `0 < decay < 1`.
    pub fn new(config: EwmaConfig) -> Result<Self, CovarianceError> {
        if !(config.decay > 0.0 && config.decay < 1.0) {
            return Err(CovarianceError::InvalidDecay(config.decay));
        }
        Ok(Self { config })
    }

    /// Half-life in periods: `ln(0.5) / ln(λ)`
    pub fn half_life(&self) -> f64 {
        0.5_f64.ln() / self.config.decay.ln()
    }

    /// Normalised weights, oldest first
    fn weights(&self, n: usize) -> Array1<f64> {
        let lambda = self.config.decay;
        let raw = Array1::from_iter((0..n).map(|t| lambda.powi((n - 1 - t) as i32)));
        let total = raw.sum();
        raw / total
    }
}

impl CovarianceEstimator for EwmaCovarianceEstimator {
    fn estimate(
        &self,
        factor_returns: ArrayView2<'_, f64>,
    ) -> Result<Array2<f64>, CovarianceError> {
        let n_periods = factor_returns.nrows();
        let required = self.config.min_observations.max(2);
        if n_periods < required {
            return Err(CovarianceError::InsufficientData {
                required,
                actual: n_periods,
            });
        }

        let weights = self.weights(n_periods);
        let column_weights = weights.view().insert_axis(Axis(1));
        let mean = (&factor_returns * &column_weights).sum_axis(Axis(0));
        let centered = &factor_returns - &mean;
        let weighted = &centered * &column_weights;
        let mut cov = weighted.t().dot(&centered);

        if self.config.bias_correction {
            let sum_sq: f64 = weights.iter().map(|w| w * w).sum();
            cov /= 1.0 - sum_sq;
        }

        if cov.iter().any(|v| !v.is_finite()) {
            return Err(CovarianceError::NonFinite);
        }
        Ok(cov)
    }
}
