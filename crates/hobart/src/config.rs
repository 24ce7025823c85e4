//! Pipeline configuration.
//!
//! One JSON document drives every stage. [`PipelineConfig::validate`] runs
//! before any data is touched, so configuration mistakes surface before a
//! backtest starts.

use chrono::NaiveDate;
use derive_more::Display;
use hobart_backtest::BacktestConfig;
use hobart_optimizer::{FactorBounds, FallbackConstructor, PortfolioConstraints, SizingMethod};
use hobart_risk::RiskModelConfig;
use hobart_signals::{SignalCombiner, SignalKind, SignalParams};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Construction method is not recognized
    #[error("Unknown construction method: {0}")]
    UnknownMethod(String),

    /// Signal name is not recognized
    #[error("Unknown signal: {0}")]
    UnknownSignal(String),

    /// No signal is configured
    #[error("At least one signal must be configured")]
    NoSignals,

    /// A value lies outside its allowed range
    #[error("{field} must be in {range}, got {value}")]
    OutOfRange {
        /// Offending field
        field: String,
        /// Allowed range
        range: &'static str,
        /// Configured value
        value: f64,
    },

    /// A value that must be positive is not
    #[error("{field} must be positive, got {value}")]
    NonPositive {
        /// Offending field
        field: &'static str,
        /// Configured value
        value: f64,
    },

    /// Start date falls after end date
    #[error("start date {start} is after end date {end}")]
    DateRange {
        /// Configured start
        start: NaiveDate,
        /// Configured end
        end: NaiveDate,
    },

    /// Risk model settings are invalid
    #[error("Invalid risk model settings: {0}")]
    RiskModel(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// How target positions are built from alphas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConstructionMethod {
    /// Constrained convex optimization
    #[display("optimize")]
    Optimize,
    /// Closed-form sizing, capping and single-factor hedge
    #[display("{_0}")]
    Sizing(SizingMethod),
}

impl FromStr for ConstructionMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "optimize" {
            return Ok(Self::Optimize);
        }
        s.parse::<SizingMethod>()
            .map(Self::Sizing)
            .map_err(|_| ConfigError::UnknownMethod(s.to_string()))
    }
}

/// One weighted signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalWeight {
    /// Signal name, e.g. `momentum`
    pub signal: String,
    /// Weight in the combined alpha
    pub weight: f64,
}

impl SignalWeight {
    /// Weighted signal
    pub fn new(signal: impl Into<String>, weight: f64) -> Self {
        Self {
            signal: signal.into(),
            weight,
        }
    }
}

/// Settings for every pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Starting portfolio value of a backtest
    pub initial_capital: f64,
    /// Target gross market value of constructed portfolios
    pub target_gmv: f64,
    /// Largest |weight| of a single position
    pub max_stock_weight: f64,
    /// Risk aversion of mean-variance sizing
    pub risk_aversion: f64,
    /// History used by the risk model and the risk-adjusted return signal
    pub lookback_days: usize,
    /// Trading days between rebalances
    pub rebalance_frequency: usize,
    /// Cost as a fraction of traded notional
    pub transaction_cost: f64,
    /// `optimize`, `proportional`, `risk_parity` or `mean_variance`
    pub method: String,
    /// Factor hedged by closed-form sizing and reported as beta
    pub market_factor: String,
    /// Limit on the hedged factor exposure, as a fraction of GMV
    pub max_factor_exposure: f64,
    /// Upper bound on portfolio volatility for optimization
    pub max_total_vol: f64,
    /// Weighted signals forming the alpha
    pub signals: Vec<SignalWeight>,
    /// Winsorization percentile of the combined alpha
    pub winsorize: Option<f64>,
    /// Parameters of the configurable signals
    pub signal_params: SignalParams,
    /// Exposure bounds per factor for optimization
    pub factor_bounds: FactorBounds,
    /// Risk model settings; the estimation window follows `lookback_days`
    pub risk_model: RiskModelConfig,
    /// First backtest date
    pub start_date: Option<NaiveDate>,
    /// Last backtest date
    pub end_date: Option<NaiveDate>,
    /// Factor or asset the backtest is measured against; `market_factor`
    /// when unset
    pub benchmark: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            initial_capital: 1_000_000.0,
            target_gmv: 1_000_000.0,
            max_stock_weight: 0.15,
            risk_aversion: 1.0,
            lookback_days: 252,
            rebalance_frequency: 21,
            transaction_cost: 0.0005,
            method: ConstructionMethod::Optimize.to_string(),
            market_factor: "mktrf".to_string(),
            max_factor_exposure: 0.2,
            max_total_vol: 0.02,
            signals: vec![SignalWeight::new(
                SignalKind::RiskAdjustedReturn.to_string(),
                1.0,
            )],
            winsorize: Some(0.01),
            signal_params: SignalParams::default(),
            factor_bounds: FactorBounds::research_defaults(),
            risk_model: RiskModelConfig::default(),
            start_date: None,
            end_date: None,
            benchmark: None,
        }
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

fn fraction(field: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field: field.to_string(),
            range: "[0, 1]",
            value,
        })
    }
}

impl PipelineConfig {
    /// Load and validate a JSON configuration file.
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] or [`ConfigError::Json`] if the file
    /// cannot be read or parsed, and any [`Self::validate`] error.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Pretty JSON rendering.
    ///
    /// # Errors
    /// Returns [`ConfigError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every setting.
    ///
    /// # Errors
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("initial_capital", self.initial_capital)?;
        positive("target_gmv", self.target_gmv)?;
        positive("risk_aversion", self.risk_aversion)?;
        positive("max_total_vol", self.max_total_vol)?;
        positive("rebalance_frequency", self.rebalance_frequency as f64)?;

        if !(self.max_stock_weight > 0.0 && self.max_stock_weight <= 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "max_stock_weight".to_string(),
                range: "(0, 1]",
                value: self.max_stock_weight,
            });
        }
        fraction("max_factor_exposure", self.max_factor_exposure)?;
        if !(0.0..1.0).contains(&self.transaction_cost) {
            return Err(ConfigError::OutOfRange {
                field: "transaction_cost".to_string(),
                range: "[0, 1)",
                value: self.transaction_cost,
            });
        }
        if self.lookback_days < 2 {
            return Err(ConfigError::OutOfRange {
                field: "lookback_days".to_string(),
                range: "[2, ∞)",
                value: self.lookback_days as f64,
            });
        }
        if let Some(p) = self.winsorize {
            if !(0.0..=0.5).contains(&p) {
                return Err(ConfigError::OutOfRange {
                    field: "winsorize".to_string(),
                    range: "[0, 0.5]",
                    value: p,
                });
            }
        }

        self.construction_method()?;
        if self.signals.is_empty() {
            return Err(ConfigError::NoSignals);
        }
        for entry in &self.signals {
            entry
                .signal
                .parse::<SignalKind>()
                .map_err(|_| ConfigError::UnknownSignal(entry.signal.clone()))?;
            if !entry.weight.is_finite() {
                return Err(ConfigError::OutOfRange {
                    field: format!("signals.{}.weight", entry.signal),
                    range: "finite values",
                    value: entry.weight,
                });
            }
        }

        for (factor, bound) in &self.factor_bounds.bounds {
            fraction(&format!("factor_bounds.{factor}"), *bound)?;
        }
        if let Some(bound) = self.factor_bounds.default_bound {
            fraction("factor_bounds.default_bound", bound)?;
        }

        self.risk_model
            .covariance
            .build()
            .map_err(|e| ConfigError::RiskModel(e.to_string()))?;
        if !(self.risk_model.specific_risk.ewma_decay > 0.0
            && self.risk_model.specific_risk.ewma_decay < 1.0)
        {
            return Err(ConfigError::OutOfRange {
                field: "risk_model.specific_risk.ewma_decay".to_string(),
                range: "(0, 1)",
                value: self.risk_model.specific_risk.ewma_decay,
            });
        }

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(ConfigError::DateRange { start, end });
            }
        }
        Ok(())
    }

    /// Parsed construction method.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnknownMethod`] for an unrecognized name.
    pub fn construction_method(&self) -> Result<ConstructionMethod, ConfigError> {
        self.method.parse()
    }

    /// Signal combiner for the configured signals.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnknownSignal`] for an unrecognized name.
    pub fn combiner(&self) -> Result<SignalCombiner, ConfigError> {
        let mut params = self.signal_params.clone();
        params.risk_adjusted_return.lookback_days = self.lookback_days;

        let mut combiner = SignalCombiner::new();
        for entry in &self.signals {
            let kind = entry
                .signal
                .parse::<SignalKind>()
                .map_err(|_| ConfigError::UnknownSignal(entry.signal.clone()))?;
            combiner = combiner.with_signal(kind.build_with(&params), entry.weight);
        }
        match self.winsorize {
            Some(p) => combiner.with_winsorize(p).map_err(|_| ConfigError::OutOfRange {
                field: "winsorize".to_string(),
                range: "[0, 0.5]",
                value: p,
            }),
            None => Ok(combiner),
        }
    }

    /// Risk model settings with the configured lookback.
    pub fn risk_model_config(&self) -> RiskModelConfig {
        RiskModelConfig {
            estimation_window: Some(self.lookback_days),
            ..self.risk_model.clone()
        }
    }

    /// Budgets for the optimizer.
    pub const fn constraints(&self) -> PortfolioConstraints {
        PortfolioConstraints {
            target_gmv: self.target_gmv,
            max_position_frac: self.max_stock_weight,
            max_total_vol: self.max_total_vol,
        }
    }

    /// Closed-form constructor for a sizing method.
    pub const fn fallback(&self, method: SizingMethod) -> FallbackConstructor {
        FallbackConstructor {
            method,
            risk_aversion: self.risk_aversion,
            target_gmv: self.target_gmv,
            max_stock_weight: self.max_stock_weight,
            max_factor_exposure: self.max_factor_exposure,
        }
    }

    /// Backtest engine settings.
    pub fn backtest_config(&self) -> BacktestConfig {
        BacktestConfig {
            initial_capital: self.initial_capital,
            rebalance_frequency: self.rebalance_frequency,
            transaction_cost: self.transaction_cost,
            start_date: self.start_date,
            end_date: self.end_date,
            benchmark: Some(self.benchmark().to_string()),
            ..Default::default()
        }
    }

    /// Benchmark series name.
    pub fn benchmark(&self) -> &str {
        self.benchmark.as_deref().unwrap_or(&self.market_factor)
    }
}
