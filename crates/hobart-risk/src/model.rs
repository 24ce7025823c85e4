//! Risk Model
//!
//! Estimates per-asset factor exposures by market-cap-weighted regression,
//! then combines the factor covariance with per-asset specific variance.
//!
//! Portfolio variance decomposition:
//! Var(R_p) = w^T * (X * F * X^T + Δ) * w
//!
//! where:
//! - w = portfolio weights
//! - X = factor exposures matrix
//! - F = factor covariance matrix
//! - Δ = diagonal specific variance matrix

use crate::covariance::{CovarianceError, CovarianceMethod};
use crate::regression::{RegressionError, weighted_least_squares};
use crate::specific_risk::{SpecificRiskConfig, SpecificRiskEstimator};
use chrono::NaiveDate;
use hobart_data::{AssetSeries, DataError, FactorSet};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Risk model errors
#[derive(Debug, Error)]
pub enum RiskModelError {
    /// Asset and factor histories do not line up
    #[error(transparent)]
    Data(#[from] DataError),

    /// Covariance estimation error
    #[error("Covariance error: {0}")]
    Covariance(#[from] CovarianceError),

    /// Dimension mismatch
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Every asset regression failed
    #[error("No asset could be estimated ({failures} failures)")]
    NoEstimates {
        /// Number of failed assets
        failures: usize,
    },

    /// Factor name not in the model
    #[error("Unknown factor: {0}")]
    UnknownFactor(String),
}

/// Risk model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskModelConfig {
    /// Trailing factor dates used for estimation (`None` = all history)
    pub estimation_window: Option<usize>,

    /// Factor covariance estimation method
    pub covariance: CovarianceMethod,

    /// Specific risk estimation
    pub specific_risk: SpecificRiskConfig,

    /// Fit assets on the rayon pool
    pub parallel: bool,
}

impl Default for RiskModelConfig {
    fn default() -> Self {
        Self {
            estimation_window: Some(252),
            covariance: CovarianceMethod::Sample,
            specific_risk: SpecificRiskConfig::default(),
            parallel: true,
        }
    }
}

/// An asset whose regression failed
#[derive(Debug, Clone, PartialEq)]
pub struct AssetFailure {
    /// Asset symbol
    pub symbol: String,
    /// Why the fit failed
    pub error: RegressionError,
}

/// One asset's regression inputs over the estimation window
#[derive(Debug)]
struct AssetWindow {
    symbol: String,
    design: Array2<f64>,
    returns: Array1<f64>,
    weights: Array1<f64>,
}

#[derive(Debug)]
struct AssetFit {
    exposures: Array1<f64>,
    specific_variance: f64,
    r_squared: f64,
}

/// Multi-factor risk model
#[derive(Debug, Clone, Default)]
pub struct RiskModel {
    config: RiskModelConfig,
}

impl RiskModel {
    /// Create a new risk model
    pub const fn new(config: RiskModelConfig) -> Self {
        Self { config }
    }

    /// The active configuration
    pub const fn config(&self) -> &RiskModelConfig {
        &self.config
    }

    /// Estimate exposures, factor covariance and specific variances.
    ///
    /// Each asset is regressed on the factor returns over the estimation
    /// window with weight `√market_cap`. Assets whose fit fails are recorded
    /// in [`RiskModelResult::failures`] and left out of the result.
    ///
    /// # Errors
    /// [`RiskModelError::Data`] if an asset return inside the window has no
    /// factor row, [`RiskModelError::Covariance`] if the factor covariance
    /// cannot be estimated, and [`RiskModelError::NoEstimates`] if no asset
    /// could be fitted.
    pub fn estimate(
        &self,
        assets: &[AssetSeries],
        factors: &FactorSet,
    ) -> Result<RiskModelResult, RiskModelError> {
        let (window_dates, window_returns) = factors.trailing(self.config.estimation_window);
        let factor_covariance = self.config.covariance.build()?.estimate(window_returns)?;

        let windows = assets
            .iter()
            .map(|asset| asset_window(asset, factors, window_dates))
            .collect::<Result<Vec<_>, _>>()?;

        let specific = SpecificRiskEstimator::new(self.config.specific_risk.clone());
        let fits: Vec<Result<AssetFit, RegressionError>> = if self.config.parallel {
            windows.par_iter().map(|w| fit_asset(w, &specific)).collect()
        } else {
            windows.iter().map(|w| fit_asset(w, &specific)).collect()
        };

        let n_factors = factors.n_factors();
        let mut symbols = Vec::new();
        let mut rows = Vec::new();
        let mut specific_variances = Vec::new();
        let mut r_squared = Vec::new();
        let mut failures = Vec::new();
        for (window, fit) in windows.into_iter().zip(fits) {
            match fit {
                Ok(fit) => {
                    tracing::debug!(
                        symbol = %window.symbol,
                        observations = window.returns.len(),
                        r_squared = fit.r_squared,
                        "fitted exposures"
                    );
                    symbols.push(window.symbol);
                    rows.extend(fit.exposures.iter().copied());
                    specific_variances.push(fit.specific_variance);
                    r_squared.push(fit.r_squared);
                }
                Err(error) => {
                    tracing::warn!(symbol = %window.symbol, %error, "regression failed, asset skipped");
                    failures.push(AssetFailure {
                        symbol: window.symbol,
                        error,
                    });
                }
            }
        }

        if symbols.is_empty() {
            return Err(RiskModelError::NoEstimates {
                failures: failures.len(),
            });
        }

        let exposures = Array2::from_shape_vec((symbols.len(), n_factors), rows)
            .map_err(|e| RiskModelError::DimensionMismatch(e.to_string()))?;

        let r_squared = Array1::from_vec(r_squared);
        tracing::info!(
            assets = symbols.len(),
            failures = failures.len(),
            factors = n_factors,
            periods = window_dates.len(),
            mean_r_squared = r_squared.mean().unwrap_or(0.0),
            "risk model estimated"
        );

        Ok(RiskModelResult {
            symbols,
            factor_names: factors.names().to_vec(),
            exposures,
            factor_covariance,
            specific_variances: Array1::from_vec(specific_variances),
            r_squared,
            failures,
            window: window_dates.first().copied().zip(window_dates.last().copied()),
        })
    }
}

fn asset_window(
    asset: &AssetSeries,
    factors: &FactorSet,
    window_dates: &[NaiveDate],
) -> Result<AssetWindow, DataError> {
    let mut indices = Vec::new();
    let mut returns = Vec::new();
    let mut weights = Vec::new();

    if let (Some(&start), Some(&end)) = (window_dates.first(), window_dates.last()) {
        for (obs, ret) in asset.observations().iter().zip(asset.returns()) {
            if obs.date < start || obs.date > end {
                continue;
            }
            let Some(ret) = ret else { continue };
            let index = factors.date_index(obs.date).ok_or_else(|| {
                DataError::Alignment(format!(
                    "{} has a return on {} but there is no factor row",
                    asset.symbol(),
                    obs.date
                ))
            })?;
            if !ret.is_finite() || obs.market_cap.is_nan() || obs.market_cap <= 0.0 {
                continue;
            }
            indices.push(index);
            returns.push(*ret);
            weights.push(obs.market_cap.sqrt());
        }
    }

    Ok(AssetWindow {
        symbol: asset.symbol().to_string(),
        design: factors.returns().select(Axis(0), &indices),
        returns: Array1::from_vec(returns),
        weights: Array1::from_vec(weights),
    })
}

fn fit_asset(
    window: &AssetWindow,
    specific: &SpecificRiskEstimator,
) -> Result<AssetFit, RegressionError> {
    let fit = weighted_least_squares(
        window.design.view(),
        window.returns.view(),
        window.weights.view(),
    )?;
    let specific_variance = specific.estimate(fit.residuals.view())?;
    Ok(AssetFit {
        exposures: fit.coefficients,
        specific_variance,
        r_squared: fit.r_squared,
    })
}

/// Output of [`RiskModel::estimate`]
///
/// Rows of `exposures` and entries of `specific_variances` and `r_squared`
/// follow `symbols`; columns of `exposures` and both axes of `factor_covariance`
/// follow `factor_names`.
#[derive(Debug, Clone)]
pub struct RiskModelResult {
    symbols: Vec<String>,
    factor_names: Vec<String>,
    exposures: Array2<f64>,
    factor_covariance: Array2<f64>,
    specific_variances: Array1<f64>,
    r_squared: Array1<f64>,
    failures: Vec<AssetFailure>,
    window: Option<(NaiveDate, NaiveDate)>,
}

impl RiskModelResult {
    /// Assemble a result from precomputed parts. Fit quality is unknown and
    /// reads as NaN until set with [`Self::with_r_squared`].
    ///
    /// # Errors
    /// Returns [`RiskModelError::DimensionMismatch`] unless exposures are
    /// N x F, the covariance is F x F and there are N specific variances.
    pub fn new(
        symbols: Vec<String>,
        factor_names: Vec<String>,
        exposures: Array2<f64>,
        factor_covariance: Array2<f64>,
        specific_variances: Array1<f64>,
    ) -> Result<Self, RiskModelError> {
        let (n, f) = (symbols.len(), factor_names.len());
        if exposures.dim() != (n, f) {
            return Err(RiskModelError::DimensionMismatch(format!(
                "exposures are {:?}, expected ({n}, {f})",
                exposures.dim()
            )));
        }
        if factor_covariance.dim() != (f, f) {
            return Err(RiskModelError::DimensionMismatch(format!(
                "factor covariance is {:?}, expected ({f}, {f})",
                factor_covariance.dim()
            )));
        }
        if specific_variances.len() != n {
            return Err(RiskModelError::DimensionMismatch(format!(
                "{} specific variances for {n} assets",
                specific_variances.len()
            )));
        }
        Ok(Self {
            symbols,
            factor_names,
            exposures,
            factor_covariance,
            specific_variances,
            r_squared: Array1::from_elem(n, f64::NAN),
            failures: Vec::new(),
            window: None,
        })
    }

    /// Attach per-asset R².
    ///
    /// # Errors
    /// Returns [`RiskModelError::DimensionMismatch`] unless there is one
    /// value per asset.
    pub fn with_r_squared(mut self, r_squared: Array1<f64>) -> Result<Self, RiskModelError> {
        if r_squared.len() != self.symbols.len() {
            return Err(RiskModelError::DimensionMismatch(format!(
                "{} R² values for {} assets",
                r_squared.len(),
                self.symbols.len()
            )));
        }
        self.r_squared = r_squared;
        Ok(self)
    }

    /// Estimated symbols, in row order
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Factor names, in column order
    pub fn factor_names(&self) -> &[String] {
        &self.factor_names
    }

    /// Exposure matrix (N x F)
    pub const fn exposures(&self) -> &Array2<f64> {
        &self.exposures
    }

    /// Factor covariance matrix (F x F)
    pub const fn factor_covariance(&self) -> &Array2<f64> {
        &self.factor_covariance
    }

    /// Per-asset specific variances
    pub const fn specific_variances(&self) -> &Array1<f64> {
        &self.specific_variances
    }

    /// Per-asset R² of the exposure regression, weighted by `√market_cap`
    /// and uncentered since the regression has no intercept
    pub const fn r_squared(&self) -> &Array1<f64> {
        &self.r_squared
    }

    /// R² of `symbol`
    pub fn r_squared_for(&self, symbol: &str) -> Option<f64> {
        self.index_of(symbol).map(|i| self.r_squared[i])
    }

    /// Assets whose regression failed
    pub fn failures(&self) -> &[AssetFailure] {
        &self.failures
    }

    /// First and last factor date of the estimation window
    pub const fn window(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.window
    }

    /// Row of `symbol`
    pub fn index_of(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    /// Exposure vector of `symbol`
    pub fn exposures_for(&self, symbol: &str) -> Option<ArrayView1<'_, f64>> {
        self.index_of(symbol).map(|i| self.exposures.row(i))
    }

    /// Every asset's exposure to one factor
    ///
    /// # Errors
    /// Returns [`RiskModelError::UnknownFactor`] if `factor` is not modelled.
    pub fn market_betas(&self, factor: &str) -> Result<ArrayView1<'_, f64>, RiskModelError> {
        self.factor_names
            .iter()
            .position(|f| f == factor)
            .map(|j| self.exposures.column(j))
            .ok_or_else(|| RiskModelError::UnknownFactor(factor.to_string()))
    }

    fn check_weights(&self, weights: ArrayView1<'_, f64>) -> Result<(), RiskModelError> {
        if weights.len() != self.symbols.len() {
            return Err(RiskModelError::DimensionMismatch(format!(
                "{} weights for {} assets",
                weights.len(),
                self.symbols.len()
            )));
        }
        Ok(())
    }

    /// Factor and specific variance of a weight vector
    fn variance_parts(&self, weights: ArrayView1<'_, f64>) -> Result<(f64, f64), RiskModelError> {
        self.check_weights(weights)?;
        // Factor risk: (X^T w)^T F (X^T w)
        let factor_weights = self.exposures.t().dot(&weights);
        let factor_var = factor_weights.dot(&self.factor_covariance.dot(&factor_weights));
        // Specific risk: sum(w_i^2 * σ_i^2)
        let specific_var = weights
            .iter()
            .zip(self.specific_variances.iter())
            .map(|(w, var)| w.powi(2) * var)
            .sum::<f64>();
        Ok((factor_var, specific_var))
    }

    /// Compute portfolio variance
    ///
    /// # Errors
    /// Returns [`RiskModelError::DimensionMismatch`] if `weights` does not
    /// have one entry per asset.
    pub fn portfolio_variance(&self, weights: ArrayView1<'_, f64>) -> Result<f64, RiskModelError> {
        let (factor, specific) = self.variance_parts(weights)?;
        Ok(factor + specific)
    }

    /// Compute portfolio volatility (standard deviation)
    ///
    /// # Errors
    /// See [`Self::portfolio_variance`].
    pub fn portfolio_volatility(&self, weights: ArrayView1<'_, f64>) -> Result<f64, RiskModelError> {
        Ok(self.portfolio_variance(weights)?.max(0.0).sqrt())
    }

    /// Decompose portfolio risk into factor and specific components
    ///
    /// # Returns
    /// * (factor_risk, specific_risk, total_risk) as volatilities
    ///
    /// # Errors
    /// See [`Self::portfolio_variance`].
    pub fn risk_decomposition(
        &self,
        weights: ArrayView1<'_, f64>,
    ) -> Result<(f64, f64, f64), RiskModelError> {
        let (factor, specific) = self.variance_parts(weights)?;
        Ok((
            factor.max(0.0).sqrt(),
            specific.max(0.0).sqrt(),
            (factor + specific).max(0.0).sqrt(),
        ))
    }

    /// Residual returns `r - x·f` of the modelled assets on `dates`.
    ///
    /// Returns a T x N matrix with columns in [`Self::symbols`] order. A
    /// missing or non-finite asset return contributes zero.
    ///
    /// # Errors
    /// Returns [`RiskModelError::Data`] if a date has no factor row, and
    /// [`RiskModelError::DimensionMismatch`] if `factors` is ordered
    /// differently from the model.
    pub fn specific_returns(
        &self,
        assets: &[AssetSeries],
        factors: &FactorSet,
        dates: &[NaiveDate],
    ) -> Result<Array2<f64>, RiskModelError> {
        if factors.names() != self.factor_names.as_slice() {
            return Err(RiskModelError::DimensionMismatch(
                "factor set does not match the model's factors".to_string(),
            ));
        }
        let factor_rows = factors.rows_for(dates)?;
        let series: Vec<Option<&AssetSeries>> = self
            .symbols
            .iter()
            .map(|s| assets.iter().find(|a| a.symbol() == s))
            .collect();

        let explained = factor_rows.dot(&self.exposures.t());
        Ok(Array2::from_shape_fn(
            (dates.len(), self.symbols.len()),
            |(t, i)| match series[i].and_then(|a| a.return_on(dates[t])) {
                Some(r) if r.is_finite() => r - explained[[t, i]],
                _ => 0.0,
            },
        ))
    }

    /// Model restricted to the given rows, in the given order.
    ///
    /// # Errors
    /// Returns [`RiskModelError::DimensionMismatch`] for an unknown symbol.
    pub fn select(&self, symbols: &[String]) -> Result<Self, RiskModelError> {
        let rows = symbols
            .iter()
            .map(|s| {
                self.index_of(s).ok_or_else(|| {
                    RiskModelError::DimensionMismatch(format!("{s} is not in the risk model"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            symbols: symbols.to_vec(),
            factor_names: self.factor_names.clone(),
            exposures: self.exposures.select(Axis(0), &rows),
            factor_covariance: self.factor_covariance.clone(),
            specific_variances: self.specific_variances.select(Axis(0), &rows),
            r_squared: self.r_squared.select(Axis(0), &rows),
            failures: self.failures.clone(),
            window: self.window,
        })
    }
}
