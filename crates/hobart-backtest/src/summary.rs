//! Performance series and headline statistics of a finished run.

use crate::state::Snapshot;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Trading days per year used to annualize daily statistics
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

const CALENDAR_DAYS_PER_YEAR: f64 = 365.25;

/// Per-day performance series aligned with the history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSeries {
    /// Simulated dates
    pub dates: Vec<NaiveDate>,
    /// Day-over-day change in portfolio value, the first day measured from
    /// the initial capital
    pub daily_returns: Vec<f64>,
    /// Compounded return since inception
    pub cumulative_returns: Vec<f64>,
    /// Running maximum of the cumulative return
    pub running_peak: Vec<f64>,
    /// `(cumulative − peak) / (1 + peak)`, never positive
    pub drawdowns: Vec<f64>,
    /// Annualized Sharpe over the trailing window; `None` until it fills
    pub rolling_sharpe: Vec<Option<f64>>,
    /// Window used for `rolling_sharpe`
    pub rolling_window: usize,
    /// Name of the benchmark series, if one was attached
    pub benchmark: Option<String>,
    /// Benchmark return over the same holding period as each entry of
    /// `daily_returns`; empty without a benchmark
    pub benchmark_returns: Vec<f64>,
    /// Compounded benchmark return since inception
    pub cumulative_benchmark: Vec<f64>,
}

impl PerformanceSeries {
    /// Attach a benchmark whose `returns` line up with `daily_returns`.
    pub fn with_benchmark(mut self, name: impl Into<String>, returns: Vec<f64>) -> Self {
        self.benchmark = Some(name.into());
        self.cumulative_benchmark = compound(&returns);
        self.benchmark_returns = returns;
        self
    }
}

/// Headline statistics of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    /// Starting value
    pub initial_capital: f64,
    /// Value after the last day
    pub final_value: f64,
    /// `final / initial − 1`
    pub total_return: f64,
    /// Total return scaled to a calendar year
    pub annualized_return: f64,
    /// Sample standard deviation of daily returns times √252
    pub annualized_volatility: f64,
    /// Annualized return over annualized volatility, zero without volatility
    pub sharpe_ratio: f64,
    /// Deepest drawdown, as a non-positive fraction
    pub max_drawdown: f64,
    /// Sum of transaction costs
    pub total_costs: f64,
    /// Mean turnover over successful rebalances
    pub average_turnover: f64,
    /// Successful rebalances
    pub rebalances: usize,
    /// Failed rebalances
    pub rebalance_errors: usize,
    /// Simulated days
    pub trading_days: usize,
    /// Benchmark series the relative figures refer to
    pub benchmark: Option<String>,
    /// Benchmark return scaled to a calendar year
    pub benchmark_return: Option<f64>,
    /// Annualized volatility of the benchmark
    pub benchmark_volatility: Option<f64>,
    /// Benchmark Sharpe ratio, same convention as `sharpe_ratio`
    pub benchmark_sharpe: Option<f64>,
    /// Annualized standard deviation of portfolio minus benchmark returns
    pub tracking_error: Option<f64>,
    /// Annualized mean active return over tracking error, zero without
    /// tracking error
    pub information_ratio: Option<f64>,
}

impl PerformanceSummary {
    /// Summary of a run that never traded
    pub const fn empty(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            final_value: initial_capital,
            total_return: 0.0,
            annualized_return: 0.0,
            annualized_volatility: 0.0,
            sharpe_ratio: 0.0,
            max_drawdown: 0.0,
            total_costs: 0.0,
            average_turnover: 0.0,
            rebalances: 0,
            rebalance_errors: 0,
            trading_days: 0,
            benchmark: None,
            benchmark_return: None,
            benchmark_volatility: None,
            benchmark_sharpe: None,
            tracking_error: None,
            information_ratio: None,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// `(1 + total)^(365.25 / days) − 1`; the total itself for a run shorter
/// than a day.
fn annualize(total_return: f64, days: i64) -> f64 {
    if days <= 0 {
        total_return
    } else if 1.0 + total_return <= 0.0 {
        -1.0
    } else {
        (1.0 + total_return).powf(CALENDAR_DAYS_PER_YEAR / days as f64) - 1.0
    }
}

/// `cumprod(1 + r) − 1`
fn compound(returns: &[f64]) -> Vec<f64> {
    returns
        .iter()
        .scan(1.0, |growth, r| {
            *growth *= 1.0 + r;
            Some(*growth - 1.0)
        })
        .collect()
}

fn annualized_sharpe(window: &[f64]) -> f64 {
    let std = sample_std(window);
    if std > 0.0 {
        mean(window) / std * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    }
}

/// Rolling window for `n` days: half the history, capped at `max_window`,
/// and at least two days.
pub fn rolling_window(n: usize, max_window: usize) -> usize {
    max_window.min(n / 2).max(2)
}

/// Build the performance series from a run's history.
pub fn performance_series(
    history: &[Snapshot],
    initial_capital: f64,
    max_window: usize,
) -> PerformanceSeries {
    let n = history.len();
    let window = rolling_window(n, max_window);

    let mut daily_returns = Vec::with_capacity(n);
    let mut previous = initial_capital;
    for snapshot in history {
        let r = if previous.abs() > f64::EPSILON {
            snapshot.portfolio_value / previous - 1.0
        } else {
            0.0
        };
        daily_returns.push(r);
        previous = snapshot.portfolio_value;
    }

    let cumulative_returns = compound(&daily_returns);
    let mut running_peak = Vec::with_capacity(n);
    let mut drawdowns = Vec::with_capacity(n);
    let mut peak = f64::NEG_INFINITY;
    for &cumulative in &cumulative_returns {
        peak = peak.max(cumulative);
        running_peak.push(peak);
        drawdowns.push(if 1.0 + peak > 0.0 {
            (cumulative - peak) / (1.0 + peak)
        } else {
            0.0
        });
    }

    let rolling_sharpe = (0..n)
        .map(|t| {
            (t + 1 >= window).then(|| annualized_sharpe(&daily_returns[t + 1 - window..=t]))
        })
        .collect();

    PerformanceSeries {
        dates: history.iter().map(|s| s.date).collect(),
        daily_returns,
        cumulative_returns,
        running_peak,
        drawdowns,
        rolling_sharpe,
        rolling_window: window,
        ..Default::default()
    }
}

/// Headline statistics of a run.
pub fn summarize(
    history: &[Snapshot],
    series: &PerformanceSeries,
    initial_capital: f64,
) -> PerformanceSummary {
    let (Some(first), Some(last)) = (history.first(), history.last()) else {
        return PerformanceSummary::empty(initial_capital);
    };

    let total_return = last.portfolio_value / initial_capital - 1.0;
    let days = (last.date - first.date).num_days();
    let annualized_return = annualize(total_return, days);
    let annualized_volatility = sample_std(&series.daily_returns) * TRADING_DAYS_PER_YEAR.sqrt();
    let sharpe_ratio = ratio(annualized_return, annualized_volatility);

    let max_drawdown = series.drawdowns.iter().copied().fold(0.0, f64::min);
    let rebalance_turnover: Vec<f64> = history
        .iter()
        .filter(|s| s.rebalanced)
        .map(|s| s.turnover)
        .collect();

    let mut summary = PerformanceSummary {
        initial_capital,
        final_value: last.portfolio_value,
        total_return,
        annualized_return,
        annualized_volatility,
        sharpe_ratio,
        max_drawdown,
        total_costs: history.iter().map(|s| s.cost).sum(),
        average_turnover: mean(&rebalance_turnover),
        rebalances: rebalance_turnover.len(),
        rebalance_errors: history.iter().filter(|s| s.error.is_some()).count(),
        trading_days: history.len(),
        ..PerformanceSummary::empty(initial_capital)
    };
    if series.benchmark_returns.len() == series.daily_returns.len() {
        summary.add_benchmark(series, days);
    }
    summary
}

impl PerformanceSummary {
    fn add_benchmark(&mut self, series: &PerformanceSeries, days: i64) {
        let Some(name) = &series.benchmark else {
            return;
        };
        let benchmark = &series.benchmark_returns;
        let total = series.cumulative_benchmark.last().copied().unwrap_or(0.0);
        let annualized = annualize(total, days);
        let volatility = sample_std(benchmark) * TRADING_DAYS_PER_YEAR.sqrt();

        let active: Vec<f64> = series
            .daily_returns
            .iter()
            .zip(benchmark)
            .map(|(p, b)| p - b)
            .collect();
        let tracking_error = sample_std(&active) * TRADING_DAYS_PER_YEAR.sqrt();

        self.benchmark = Some(name.clone());
        self.benchmark_return = Some(annualized);
        self.benchmark_volatility = Some(volatility);
        self.benchmark_sharpe = Some(ratio(annualized, volatility));
        self.tracking_error = Some(tracking_error);
        self.information_ratio = Some(ratio(
            mean(&active) * TRADING_DAYS_PER_YEAR,
            tracking_error,
        ));
    }
}
