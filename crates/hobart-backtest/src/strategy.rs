//! The rebalancing callback driven by the engine.

use chrono::NaiveDate;
use hobart_data::MarketData;
use hobart_optimizer::PortfolioStats;
use std::collections::BTreeMap;

/// Currency positions keyed by symbol
pub type Positions = BTreeMap<String, f64>;

/// Error a strategy may return from a rebalance
pub type StrategyError = Box<dyn std::error::Error + Send + Sync>;

/// What a strategy hands back at a rebalance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyOutput {
    /// Target positions; symbols left out are closed
    pub positions: Positions,
    /// Statistics of the target portfolio, when the strategy has them
    pub stats: Option<PortfolioStats>,
}

impl StrategyOutput {
    /// Positions with no statistics attached
    pub const fn new(positions: Positions) -> Self {
        Self {
            positions,
            stats: None,
        }
    }

    /// Attach portfolio statistics
    pub fn with_stats(mut self, stats: PortfolioStats) -> Self {
        self.stats = Some(stats);
        self
    }
}

/// Produces target positions from the data available on a date
///
/// The engine only ever passes a panel truncated at `date`.
pub trait Strategy {
    /// Compute target positions for `date`.
    ///
    /// # Errors
    /// Any error is recorded against the rebalance; see
    /// [`crate::BacktestEngine::step`] for how failures are handled.
    fn rebalance(
        &mut self,
        data: &MarketData,
        date: NaiveDate,
    ) -> Result<StrategyOutput, StrategyError>;
}

impl<F> Strategy for F
where
    F: FnMut(&MarketData, NaiveDate) -> Result<StrategyOutput, StrategyError>,
{
    fn rebalance(
        &mut self,
        data: &MarketData,
        date: NaiveDate,
    ) -> Result<StrategyOutput, StrategyError> {
        self(data, date)
    }
}
