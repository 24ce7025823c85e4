//! Portfolio constraint budgets
//!
//! Budgets are expressed as fractions of gross market value (GMV). Factor
//! bounds are keyed by factor name and resolved against the factor order of
//! the risk model, so a bound always lands on the column it names.

use crate::error::{OptimizerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Gross, per-position and total-risk budgets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioConstraints {
    /// Target gross market value in currency units
    pub target_gmv: f64,
    /// Largest |weight| of a single position
    pub max_position_frac: f64,
    /// Upper bound on portfolio volatility, in the units of the risk model
    pub max_total_vol: f64,
}

impl PortfolioConstraints {
    /// Check the budgets.
    ///
    /// # Errors
    /// Returns [`OptimizerError::Configuration`] for a non-positive GMV or
    /// risk bound, or a position fraction outside `(0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if !(self.target_gmv.is_finite() && self.target_gmv > 0.0) {
            return Err(OptimizerError::Configuration(format!(
                "target GMV must be positive, got {}",
                self.target_gmv
            )));
        }
        if !(self.max_position_frac > 0.0 && self.max_position_frac <= 1.0) {
            return Err(OptimizerError::Configuration(format!(
                "max position fraction must be in (0, 1], got {}",
                self.max_position_frac
            )));
        }
        if !(self.max_total_vol.is_finite() && self.max_total_vol > 0.0) {
            return Err(OptimizerError::Configuration(format!(
                "max total volatility must be positive, got {}",
                self.max_total_vol
            )));
        }
        Ok(())
    }
}

/// Signed exposure bounds per factor, as fractions of GMV
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorBounds {
    /// Bound per factor name
    pub bounds: BTreeMap<String, f64>,
    /// Bound for factors not listed; `None` leaves them unconstrained
    pub default_bound: Option<f64>,
}

impl FactorBounds {
    /// No bounds at all
    pub fn new() -> Self {
        Self::default()
    }

    /// Market, sector, style and Fama-French bounds from the research
    /// settings: market ±20%, sectors ±10%, styles ±30%.
    pub fn research_defaults() -> Self {
        let sectors = [
            "Technology",
            "Healthcare",
            "Financial",
            "Consumer",
            "Industrial",
            "Energy",
            "Utilities",
            "Materials",
            "Communication",
            "RealEstate",
        ];
        let mut bounds = BTreeMap::new();
        bounds.insert("market".to_string(), 0.2);
        bounds.extend(sectors.iter().map(|s| ((*s).to_string(), 0.1)));
        for style in ["momentum", "size", "value"] {
            bounds.insert(style.to_string(), 0.3);
        }
        bounds.insert("mktrf".to_string(), 0.2);
        for ff in ["smb", "hml", "rmw", "cma", "umd"] {
            bounds.insert(ff.to_string(), 0.3);
        }
        Self {
            bounds,
            default_bound: None,
        }
    }

    /// Add or replace one bound
    pub fn with_bound(mut self, factor: impl Into<String>, bound: f64) -> Self {
        self.bounds.insert(factor.into(), bound);
        self
    }

    /// Bound unlisted factors
    pub const fn with_default(mut self, bound: f64) -> Self {
        self.default_bound = Some(bound);
        self
    }

    /// Bound for one factor
    pub fn get(&self, factor: &str) -> Option<f64> {
        self.bounds.get(factor).copied().or(self.default_bound)
    }

    /// Bounds in the order of `factor_names`
    pub fn resolve(&self, factor_names: &[String]) -> Vec<Option<f64>> {
        factor_names.iter().map(|f| self.get(f)).collect()
    }

    /// Check every bound lies in `[0, 1]`.
    ///
    /// # Errors
    /// Returns [`OptimizerError::Configuration`] naming the first bad bound.
    pub fn validate(&self) -> Result<()> {
        let named = self.bounds.iter().map(|(k, v)| (k.as_str(), *v));
        let default = self.default_bound.map(|v| ("<default>", v));
        for (factor, bound) in named.chain(default) {
            if !(0.0..=1.0).contains(&bound) {
                return Err(OptimizerError::Configuration(format!(
                    "factor bound for {factor} must be in [0, 1], got {bound}"
                )));
            }
        }
        Ok(())
    }
}
