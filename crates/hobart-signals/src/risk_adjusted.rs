//! Risk-Adjusted Return Signal
//!
//! Trailing annualized Sharpe ratio of each asset's daily returns,
//! centered across assets by date.

use crate::traits::{Signal, SignalError};
use crate::utils::center_xsection;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for the risk-adjusted return signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAdjustedReturnConfig {
    /// Lookback window in days (default: 252)
    pub lookback_days: usize,
    /// Minimum returns in the window (default: 20)
    pub min_periods: usize,
    /// Periods per year used to annualize (default: 252)
    pub periods_per_year: f64,
}

impl Default for RiskAdjustedReturnConfig {
    fn default() -> Self {
        Self {
            lookback_days: 252,
            min_periods: 20,
            periods_per_year: 252.0,
        }
    }
}

/// Trailing Sharpe ratio, centered by date
#[derive(Debug, Default)]
pub struct RiskAdjustedReturnSignal {
    config: RiskAdjustedReturnConfig,
}

impl RiskAdjustedReturnSignal {
    /// Create with a configuration.
    pub const fn with_config(config: RiskAdjustedReturnConfig) -> Self {
        Self { config }
    }

    /// Active configuration.
    pub const fn config(&self) -> &RiskAdjustedReturnConfig {
        &self.config
    }
}

impl Signal for RiskAdjustedReturnSignal {
    fn name(&self) -> &str {
        "risk_adjusted_return"
    }

    fn compute_scores(&self, data: LazyFrame) -> Result<LazyFrame, SignalError> {
        let window = self.config.lookback_days;
        let min_periods = self.config.min_periods.clamp(2, window.max(2));
        if window < 2 {
            return Err(SignalError::InvalidParameter(format!(
                "lookback must be at least 2 days, got {window}"
            )));
        }
        let options = RollingOptionsFixedWindow {
            window_size: window,
            min_periods,
            ..Default::default()
        };

        let result = data
            .sort(["symbol", "date"], Default::default())
            .with_columns([
                col("returns")
                    .rolling_mean(options.clone())
                    .over([col("symbol")])
                    .alias("mean_return"),
                col("returns")
                    .rolling_std(options)
                    .over([col("symbol")])
                    .alias("std_return"),
            ])
            .with_columns([(col("mean_return") / col("std_return")
                * lit(self.config.periods_per_year.sqrt()))
            .alias("sharpe")])
            .with_columns([center_xsection("sharpe", false).alias("risk_adjusted_return_score")])
            .select([
                col("symbol"),
                col("date"),
                col("risk_adjusted_return_score"),
            ]);

        Ok(result)
    }

    fn required_columns(&self) -> &[&str] {
        &["symbol", "date", "returns"]
    }
}
