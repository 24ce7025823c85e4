//! Mutable simulation state and the per-day record.

use crate::error::RebalanceError;
use crate::strategy::Positions;
use chrono::NaiveDate;
use derive_more::Display;
use hobart_optimizer::PortfolioStats;
use serde::{Deserialize, Serialize};

/// Where the engine is within the current day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// The next step opens with a rebalance
    #[display("awaiting_rebalance")]
    AwaitingRebalance,
    /// The strategy is computing targets
    #[display("rebalancing")]
    Rebalancing,
    /// Positions are carried without trading
    #[display("holding")]
    Holding,
    /// Every date has been simulated, or the run was aborted
    #[display("finished")]
    Finished,
}

/// The record written at the end of each simulated day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Simulated date
    pub date: NaiveDate,
    /// Value after costs and after marking to the next date's returns
    pub portfolio_value: f64,
    /// Positions held through the mark
    pub positions: Positions,
    /// Whether positions were replaced today
    pub rebalanced: bool,
    /// Σ |new − old| over the union of symbols; zero on non-rebalance days
    pub turnover: f64,
    /// `turnover · transaction_cost`
    pub cost: f64,
    /// Return earned by the positions over the mark
    pub mark_return: f64,
    /// Strategy failure on this date, if any
    pub error: Option<RebalanceError>,
    /// Statistics reported by the strategy at this rebalance
    pub stats: Option<PortfolioStats>,
}

/// Engine state between steps
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestState {
    /// Current portfolio value
    pub portfolio_value: f64,
    /// Positions currently held
    pub positions: Positions,
    /// One snapshot per completed day
    pub history: Vec<Snapshot>,
    /// Current phase
    pub phase: Phase,
    /// Index of the next date to simulate
    pub day: usize,
}

impl BacktestState {
    /// Fresh state holding cash only
    pub const fn new(initial_capital: f64) -> Self {
        Self {
            portfolio_value: initial_capital,
            positions: Positions::new(),
            history: Vec::new(),
            phase: Phase::AwaitingRebalance,
            day: 0,
        }
    }

    /// Whether any positions have ever been set
    pub fn has_positions(&self) -> bool {
        self.history.iter().any(|s| s.rebalanced)
    }

    /// Whether the engine has nothing left to do
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }
}
