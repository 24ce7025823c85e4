//! Backtest configuration.

use crate::error::{BacktestError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Starting portfolio value
    pub initial_capital: f64,
    /// Trading days between rebalances
    pub rebalance_frequency: usize,
    /// Cost as a fraction of traded notional
    pub transaction_cost: f64,
    /// First simulated date (inclusive)
    pub start_date: Option<NaiveDate>,
    /// Last simulated date (inclusive)
    pub end_date: Option<NaiveDate>,
    /// Upper limit on the rolling Sharpe window
    pub rolling_sharpe_window: usize,
    /// Factor column or asset symbol to measure relative performance against
    pub benchmark: Option<String>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 1_000_000.0,
            rebalance_frequency: 21,
            transaction_cost: 0.0005,
            start_date: None,
            end_date: None,
            rolling_sharpe_window: 63,
            benchmark: None,
        }
    }
}

impl BacktestConfig {
    /// Check the settings.
    ///
    /// # Errors
    /// Returns [`BacktestError::Configuration`] for non-positive capital, a
    /// zero rebalance frequency, a transaction cost outside `[0, 1)`, an
    /// inverted date range or a blank benchmark name.
    pub fn validate(&self) -> Result<()> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(BacktestError::Configuration(format!(
                "initial capital must be positive, got {}",
                self.initial_capital
            )));
        }
        if self.rebalance_frequency == 0 {
            return Err(BacktestError::Configuration(
                "rebalance frequency must be at least one day".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.transaction_cost) {
            return Err(BacktestError::Configuration(format!(
                "transaction cost must be in [0, 1), got {}",
                self.transaction_cost
            )));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(BacktestError::Configuration(format!(
                    "start date {start} is after end date {end}"
                )));
            }
        }
        if self.benchmark.as_deref().is_some_and(|b| b.trim().is_empty()) {
            return Err(BacktestError::Configuration(
                "benchmark name must not be empty".to_string(),
            ));
        }
        if self.rolling_sharpe_window < 2 {
            return Err(BacktestError::Configuration(
                "rolling Sharpe window must be at least 2".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether day `index` of the simulation is a rebalance day
    pub const fn is_rebalance_day(&self, index: usize) -> bool {
        index % self.rebalance_frequency == 0
    }
}
