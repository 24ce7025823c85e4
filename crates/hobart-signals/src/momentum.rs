//! Momentum Signal
//!
//! Exponentially weighted trailing return, skipping the most recent `lag`
//! days to avoid short-term reversal. Weights halve every `half_life` days
//! going back from the most recent lagged return.
//!
//! The weighted sum runs over log returns and is compounded back with
//! `exp(x) - 1`.

use crate::traits::{Signal, SignalError};
use crate::utils::{center_xsection, exp_weights, map_f64};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for the momentum signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MomentumConfig {
    /// Trailing window in days (default: 252)
    pub trailing_days: usize,
    /// Half-life of the weights in days (default: 126)
    pub half_life: f64,
    /// Most recent days to skip (default: 20)
    pub lag: usize,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            trailing_days: 252,
            half_life: 126.0,
            lag: 20,
        }
    }
}

/// Exponentially weighted momentum
#[derive(Debug, Default)]
pub struct MomentumSignal {
    config: MomentumConfig,
}

impl MomentumSignal {
    /// Create with a configuration.
    pub const fn with_config(config: MomentumConfig) -> Self {
        Self { config }
    }

    /// Active configuration.
    pub const fn config(&self) -> &MomentumConfig {
        &self.config
    }
}

impl Signal for MomentumSignal {
    fn name(&self) -> &str {
        "momentum"
    }

    fn compute_scores(&self, data: LazyFrame) -> Result<LazyFrame, SignalError> {
        let window = self.config.trailing_days;
        if window == 0 || self.config.half_life <= 0.0 {
            return Err(SignalError::InvalidParameter(
                "momentum window and half-life must be positive".to_string(),
            ));
        }
        let weights = exp_weights(window, self.config.half_life);

        let result = data
            .sort(["symbol", "date"], Default::default())
            .with_columns([col("returns")
                .shift(lit(self.config.lag as i64))
                .over([col("symbol")])
                .alias("lagged_returns")])
            .with_columns([map_f64(col("lagged_returns"), f64::ln_1p).alias("lagged_log_returns")])
            .with_columns([col("lagged_log_returns")
                .rolling_sum(RollingOptionsFixedWindow {
                    window_size: window,
                    min_periods: window,
                    weights: Some(weights),
                    ..Default::default()
                })
                .over([col("symbol")])
                .alias("weighted_log_return")])
            .with_columns([map_f64(col("weighted_log_return"), f64::exp_m1).alias("raw_momentum")])
            .with_columns([center_xsection("raw_momentum", true).alias("momentum_score")])
            .select([col("symbol"), col("date"), col("momentum_score")]);

        Ok(result)
    }

    fn required_columns(&self) -> &[&str] {
        &["symbol", "date", "returns"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_name() {
        let signal = MomentumSignal::default();
        assert_eq!(signal.name(), "momentum");
        assert_eq!(signal.score_column(), "momentum_score");
    }

    #[test]
    fn test_config_defaults() {
        let config = MomentumConfig::default();
        assert_eq!(config.trailing_days, 252);
        assert_eq!(config.half_life, 126.0);
        assert_eq!(config.lag, 20);
    }

    #[test]
    fn test_zero_window_rejected() {
        let signal = MomentumSignal::with_config(MomentumConfig {
            trailing_days: 0,
            ..Default::default()
        });
        assert!(signal.compute_scores(DataFrame::empty().lazy()).is_err());
    }
}
