//! Signal Registry
//!
//! Lookup and instantiation of signals by name.

use crate::momentum::{MomentumConfig, MomentumSignal};
use crate::quality::QualitySignal;
use crate::risk_adjusted::{RiskAdjustedReturnConfig, RiskAdjustedReturnSignal};
use crate::size::SizeSignal;
use crate::traits::{Signal, SignalError};
use crate::value::ValueSignal;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Built-in signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Exponentially weighted momentum
    #[display("momentum")]
    Momentum,
    /// Negative log market cap
    #[display("size")]
    Size,
    /// Earnings and dividend yield
    #[display("value")]
    Value,
    /// Turnover minus volatility
    #[display("quality")]
    Quality,
    /// Trailing Sharpe ratio
    #[display("risk_adjusted_return")]
    RiskAdjustedReturn,
}

impl SignalKind {
    /// Every built-in signal.
    pub const ALL: [Self; 5] = [
        Self::Momentum,
        Self::Size,
        Self::Value,
        Self::Quality,
        Self::RiskAdjustedReturn,
    ];

    /// Instantiate with default parameters.
    pub fn build(self) -> Box<dyn Signal> {
        self.build_with(&SignalParams::default())
    }

    /// Instantiate with explicit parameters.
    pub fn build_with(self, params: &SignalParams) -> Box<dyn Signal> {
        match self {
            Self::Momentum => Box::new(MomentumSignal::with_config(params.momentum.clone())),
            Self::Size => Box::new(SizeSignal),
            Self::Value => Box::new(ValueSignal),
            Self::Quality => Box::new(QualitySignal),
            Self::RiskAdjustedReturn => Box::new(RiskAdjustedReturnSignal::with_config(
                params.risk_adjusted_return.clone(),
            )),
        }
    }
}

impl FromStr for SignalKind {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.to_string() == s)
            .ok_or_else(|| SignalError::UnknownSignal(s.to_string()))
    }
}

/// Parameters for the configurable signals
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalParams {
    /// Momentum parameters
    pub momentum: MomentumConfig,
    /// Risk-adjusted return parameters
    pub risk_adjusted_return: RiskAdjustedReturnConfig,
}

/// Names of every built-in signal
pub fn available_signals() -> Vec<String> {
    SignalKind::ALL.iter().map(ToString::to_string).collect()
}
