//! Specific risk estimator
//!
//! Variance of residual returns, either the plain sample variance or an
//! exponentially weighted recursion.

use super::SpecificRiskError;
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Configuration for specific risk estimation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecificRiskConfig {
    /// Method to use for variance estimation
    pub method: VarianceMethod,

    /// EWMA decay factor (if using EWMA method)
    pub ewma_decay: f64,

    /// Minimum number of residuals required
    pub min_observations: usize,

    /// Multiplier applied to the per-period variance (e.g. 252 to annualise
    /// daily data). The default of 1.0 keeps per-period units, matching the
    /// factor covariance.
    pub annualization_factor: f64,
}

/// Methods for estimating residual variance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceMethod {
    /// Sample variance with an n - 1 denominator
    #[default]
    Historical,
    /// Exponentially weighted moving average of squared residuals
    Ewma,
}

impl Default for SpecificRiskConfig {
    fn default() -> Self {
        Self {
            method: VarianceMethod::Historical,
            ewma_decay: 0.94,
            min_observations: 2,
            annualization_factor: 1.0,
        }
    }
}

/// Specific risk estimator
#[derive(Debug, Clone, Default)]
pub struct SpecificRiskEstimator {
    config: SpecificRiskConfig,
}

impl SpecificRiskEstimator {
    /// Create a new specific risk estimator
    pub const fn new(config: SpecificRiskConfig) -> Self {
        Self { config }
    }

    /// The active configuration
    pub const fn config(&self) -> &SpecificRiskConfig {
        &self.config
    }

    /// Estimate specific variance from residual returns
    ///
    /// # Errors
    /// Fails with [`SpecificRiskError::InsufficientData`] below the minimum
    /// residual count and [`SpecificRiskError::InvalidVariance`] if the
    /// estimate is negative or non-finite.
    pub fn estimate(&self, residuals: ArrayView1<'_, f64>) -> Result<f64, SpecificRiskError> {
        let n = residuals.len();
        let required = self.config.min_observations.max(2);
        if n < required {
            return Err(SpecificRiskError::InsufficientData {
                required,
                actual: n,
            });
        }

        let variance = match self.config.method {
            VarianceMethod::Historical => historical_variance(residuals),
            VarianceMethod::Ewma => ewma_variance(residuals, self.config.ewma_decay),
        } * self.config.annualization_factor;

        if !variance.is_finite() || variance < 0.0 {
            return Err(SpecificRiskError::InvalidVariance(format!(
                "estimated variance {variance}"
            )));
        }
        Ok(variance)
    }
}

fn historical_variance(residuals: ArrayView1<'_, f64>) -> f64 {
    let n = residuals.len() as f64;
    let mean = residuals.sum() / n;
    residuals.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)
}

fn ewma_variance(residuals: ArrayView1<'_, f64>, lambda: f64) -> f64 {
    let mut iter = residuals.iter();
    let Some(first) = iter.next() else {
        return 0.0;
    };
    iter.fold(first.powi(2), |var, r| lambda * var + (1.0 - lambda) * r.powi(2))
}
