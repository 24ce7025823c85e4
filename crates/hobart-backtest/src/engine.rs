//! The day-by-day simulation loop.

use crate::config::BacktestConfig;
use crate::error::{BacktestError, RebalanceError, Result};
use crate::state::{BacktestState, Phase, Snapshot};
use crate::strategy::{Positions, Strategy, StrategyOutput};
use crate::summary::{PerformanceSeries, PerformanceSummary, performance_series, summarize};
use chrono::NaiveDate;
use derive_more::Display;
use hobart_data::MarketData;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every rebalance succeeded
    #[display("completed")]
    Completed,
    /// Some later rebalances failed and prior positions were carried
    #[display("completed with {errors} failed rebalances")]
    CompletedWithErrors {
        /// Number of failed rebalances
        errors: usize,
    },
    /// The first rebalance failed
    #[display("aborted: {_0}")]
    Aborted(RebalanceError),
}

/// Everything a run produced
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestReport {
    /// One snapshot per simulated day
    pub history: Vec<Snapshot>,
    /// Per-day performance series
    pub series: PerformanceSeries,
    /// Headline statistics
    pub summary: PerformanceSummary,
    /// How the run ended
    pub outcome: RunOutcome,
}

impl BacktestReport {
    /// Whether the run stopped at its first rebalance
    pub const fn is_aborted(&self) -> bool {
        matches!(self.outcome, RunOutcome::Aborted(_))
    }

    /// Failures recorded at later rebalances
    pub fn rebalance_errors(&self) -> impl Iterator<Item = &RebalanceError> {
        self.history.iter().filter_map(|s| s.error.as_ref())
    }

    /// Turn an aborted run into an error.
    ///
    /// # Errors
    /// Returns [`BacktestError::Aborted`] if the first rebalance failed.
    pub fn into_result(self) -> Result<Self> {
        match self.outcome {
            RunOutcome::Aborted(error) => Err(BacktestError::Aborted(error)),
            _ => Ok(self),
        }
    }
}

/// Simulates a strategy over the trading dates of a panel
///
/// Positions are held in currency units and only change at rebalances, which
/// fall on every `rebalance_frequency`-th simulated day starting with the
/// first. Each day's positions are marked with the returns of the following
/// date, so the last day carries no mark.
#[derive(Debug, Clone)]
pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    /// Create an engine.
    ///
    /// # Errors
    /// Returns [`BacktestError::Configuration`] if the settings are invalid.
    pub fn new(config: BacktestConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Engine settings
    pub const fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Trading dates of `data` inside the configured date range
    pub fn dates(&self, data: &MarketData) -> Vec<NaiveDate> {
        data.trading_dates()
            .into_iter()
            .filter(|d| self.config.start_date.is_none_or(|start| *d >= start))
            .filter(|d| self.config.end_date.is_none_or(|end| *d <= end))
            .collect()
    }

    /// State before the first day
    pub const fn initial_state(&self) -> BacktestState {
        BacktestState::new(self.config.initial_capital)
    }

    /// Simulate the day at `state.day`.
    ///
    /// On a rebalance day the strategy receives the panel truncated at the
    /// date. A failed rebalance keeps the prior positions and is recorded in
    /// the snapshot, unless no positions have been set yet.
    ///
    /// # Errors
    /// Returns the [`RebalanceError`] when the first rebalance fails; the
    /// state is then finished and holds no history for the date.
    pub fn step<S: Strategy + ?Sized>(
        &self,
        state: &mut BacktestState,
        strategy: &mut S,
        data: &MarketData,
        dates: &[NaiveDate],
    ) -> std::result::Result<(), RebalanceError> {
        let Some(&date) = dates.get(state.day) else {
            state.phase = Phase::Finished;
            return Ok(());
        };

        let mut rebalanced = false;
        let mut turnover = 0.0;
        let mut cost = 0.0;
        let mut error = None;
        let mut stats = None;

        if self.config.is_rebalance_day(state.day) {
            state.phase = Phase::Rebalancing;
            match strategy.rebalance(&data.as_of(date), date) {
                Ok(StrategyOutput {
                    positions,
                    stats: reported,
                }) => {
                    turnover = if state.has_positions() {
                        turnover_between(&state.positions, &positions)
                    } else {
                        positions.values().map(|p| p.abs()).sum()
                    };
                    cost = turnover * self.config.transaction_cost;
                    state.portfolio_value -= cost;
                    state.positions = positions;
                    stats = reported;
                    rebalanced = true;
                    tracing::info!(
                        %date,
                        turnover,
                        cost,
                        positions = state.positions.len(),
                        "rebalanced"
                    );
                }
                Err(source) => {
                    let failure = RebalanceError {
                        date,
                        message: source.to_string(),
                    };
                    if !state.has_positions() {
                        tracing::error!(%date, error = %failure.message, "first rebalance failed");
                        state.phase = Phase::Finished;
                        return Err(failure);
                    }
                    tracing::warn!(
                        %date,
                        error = %failure.message,
                        "rebalance failed; keeping prior positions"
                    );
                    error = Some(failure);
                }
            }
        }
        state.phase = Phase::Holding;

        let mark_return = dates
            .get(state.day + 1)
            .map_or(0.0, |&next| Self::mark_return(state, data, next));
        state.portfolio_value *= 1.0 + mark_return;

        tracing::debug!(%date, value = state.portfolio_value, mark_return, "day complete");
        state.history.push(Snapshot {
            date,
            portfolio_value: state.portfolio_value,
            positions: state.positions.clone(),
            rebalanced,
            turnover,
            cost,
            mark_return,
            error,
            stats,
        });

        state.day += 1;
        state.phase = if state.day >= dates.len() {
            Phase::Finished
        } else if self.config.is_rebalance_day(state.day) {
            Phase::AwaitingRebalance
        } else {
            Phase::Holding
        };
        Ok(())
    }

    /// Σ position · return(next) / value, skipping missing returns
    fn mark_return(state: &BacktestState, data: &MarketData, next: NaiveDate) -> f64 {
        if state.portfolio_value.abs() <= f64::EPSILON {
            tracing::warn!(value = state.portfolio_value, "portfolio value is zero; no mark");
            return 0.0;
        }
        let pnl: f64 = state
            .positions
            .iter()
            .filter_map(|(symbol, position)| {
                data.asset_return(symbol, next)
                    .filter(|r| r.is_finite())
                    .map(|r| position * r)
            })
            .sum();
        pnl / state.portfolio_value
    }

    /// Run the strategy over every date.
    ///
    /// A failed first rebalance ends the run early with
    /// [`RunOutcome::Aborted`]; use [`BacktestReport::into_result`] to treat
    /// that as an error. A date range holding no trading dates completes
    /// with an empty history and [`PerformanceSummary::empty`].
    ///
    /// # Errors
    /// Returns [`BacktestError::Configuration`] if the configured benchmark
    /// names neither a factor nor an asset of `data`.
    pub fn run<S: Strategy + ?Sized>(
        &self,
        data: &MarketData,
        strategy: &mut S,
    ) -> Result<BacktestReport> {
        if let Some(benchmark) = &self.config.benchmark {
            if !data.has_series(benchmark) {
                return Err(BacktestError::Configuration(format!(
                    "benchmark {benchmark} is neither a factor nor an asset"
                )));
            }
        }

        let dates = self.dates(data);
        let initial = self.config.initial_capital;
        let (Some(first), Some(last)) = (dates.first(), dates.last()) else {
            tracing::warn!(
                start = ?self.config.start_date,
                end = ?self.config.end_date,
                "no trading dates in the backtest range"
            );
            return Ok(BacktestReport {
                history: Vec::new(),
                series: PerformanceSeries::default(),
                summary: PerformanceSummary::empty(initial),
                outcome: RunOutcome::Completed,
            });
        };
        tracing::info!(
            start = %first,
            end = %last,
            days = dates.len(),
            frequency = self.config.rebalance_frequency,
            benchmark = self.config.benchmark.as_deref(),
            "starting backtest"
        );

        let mut state = self.initial_state();
        let mut aborted = None;
        while !state.is_finished() {
            if let Err(failure) = self.step(&mut state, strategy, data, &dates) {
                aborted = Some(failure);
            }
        }

        let mut series =
            performance_series(&state.history, initial, self.config.rolling_sharpe_window);
        if let Some(benchmark) = &self.config.benchmark {
            let returns = benchmark_returns(data, benchmark, &dates, state.history.len());
            series = series.with_benchmark(benchmark.as_str(), returns);
        }
        let summary = summarize(&state.history, &series, initial);
        let outcome = match aborted {
            Some(failure) => RunOutcome::Aborted(failure),
            None if summary.rebalance_errors > 0 => RunOutcome::CompletedWithErrors {
                errors: summary.rebalance_errors,
            },
            None => RunOutcome::Completed,
        };
        tracing::info!(
            %outcome,
            final_value = summary.final_value,
            total_return = summary.total_return,
            information_ratio = summary.information_ratio,
            "backtest finished"
        );

        Ok(BacktestReport {
            history: state.history,
            series,
            summary,
            outcome,
        })
    }
}

/// Benchmark return over the holding period of each of the first `days`
/// dates, realized on the following date like the portfolio mark. The last
/// date and missing or non-finite values count as zero.
fn benchmark_returns(
    data: &MarketData,
    benchmark: &str,
    dates: &[NaiveDate],
    days: usize,
) -> Vec<f64> {
    (0..days)
        .map(|t| {
            dates
                .get(t + 1)
                .and_then(|&next| data.series_return(benchmark, next))
                .filter(|r| r.is_finite())
                .unwrap_or(0.0)
        })
        .collect()
}

/// Σ |new − old| over the union of symbols
pub fn turnover_between(old: &Positions, new: &Positions) -> f64 {
    old.keys()
        .chain(new.keys())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|symbol| {
            let before = old.get(symbol).copied().unwrap_or(0.0);
            let after = new.get(symbol).copied().unwrap_or(0.0);
            (after - before).abs()
        })
        .sum()
}
