//! Engine behavior over small hand-built panels.

use approx::assert_abs_diff_eq;
use chrono::{Duration, NaiveDate};
use hobart_backtest::{
    BacktestConfig, BacktestEngine, BacktestError, PerformanceSummary, Phase, Positions,
    RunOutcome, StrategyError, StrategyOutput,
};
use hobart_data::{AssetSeries, FactorSet, MarketData, Observation};
use ndarray::Array2;

fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(offset)
}

/// One series per price path, all starting on the same date.
fn panel(prices: &[&[f64]]) -> MarketData {
    panel_with_market(prices, &vec![0.0; prices[0].len()])
}

/// Same as [`panel`] with the given `market` factor returns.
fn panel_with_market(prices: &[&[f64]], market: &[f64]) -> MarketData {
    let n_days = prices[0].len();
    let assets = prices
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let observations = path
                .iter()
                .enumerate()
                .map(|(t, &price)| Observation::new(day(t as i64), price, 1e9))
                .collect();
            AssetSeries::new(format!("A{i}"), observations).unwrap()
        })
        .collect();
    let factors = FactorSet::new(
        vec!["market".to_string()],
        (0..n_days).map(|t| day(t as i64)).collect(),
        Array2::from_shape_fn((n_days, 1), |(t, _)| market[t]),
    )
    .unwrap();
    MarketData::new(assets, factors).unwrap()
}

fn equal_positions(n: usize, size: f64) -> Positions {
    (0..n).map(|i| (format!("A{i}"), size)).collect()
}

fn engine(initial_capital: f64, frequency: usize, cost: f64) -> BacktestEngine {
    BacktestEngine::new(BacktestConfig {
        initial_capital,
        rebalance_frequency: frequency,
        transaction_cost: cost,
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn test_first_day_mark_to_market() {
    let data = panel(&[&[100.0, 101.0], &[100.0, 98.0], &[100.0, 103.0]]);
    let mut strategy = |_: &MarketData, _: NaiveDate| -> Result<StrategyOutput, StrategyError> {
        Ok(StrategyOutput::new(equal_positions(3, 100_000.0)))
    };

    let report = engine(300_000.0, 21, 0.0).run(&data, &mut strategy).unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.history.len(), 2);

    let first = &report.history[0];
    assert!(first.rebalanced);
    assert_abs_diff_eq!(first.mark_return, 0.02 / 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(first.portfolio_value, 300_000.0 * (1.0 + 0.02 / 3.0), epsilon = 1e-6);
    assert_abs_diff_eq!(first.turnover, 300_000.0);
    assert_eq!(first.cost, 0.0);

    // Nothing left to mark against on the last day.
    assert_eq!(report.history[1].mark_return, 0.0);
    assert_eq!(report.history[1].portfolio_value, first.portfolio_value);
}

#[test]
fn test_costs_and_zero_turnover_on_identical_targets() {
    let data = panel(&[&[10.0, 10.0, 10.0, 10.0, 10.0], &[20.0, 20.0, 20.0, 20.0, 20.0]]);
    let mut strategy = |_: &MarketData, _: NaiveDate| -> Result<StrategyOutput, StrategyError> {
        Ok(StrategyOutput::new(equal_positions(2, 500.0)))
    };

    let report = engine(1_000.0, 2, 0.001).run(&data, &mut strategy).unwrap();
    let rebalances: Vec<_> = report.history.iter().filter(|s| s.rebalanced).collect();
    assert_eq!(rebalances.len(), 3);
    assert_abs_diff_eq!(rebalances[0].turnover, 1_000.0);
    assert_abs_diff_eq!(rebalances[0].cost, 1.0);
    assert!(rebalances[1..].iter().all(|s| s.turnover == 0.0 && s.cost == 0.0));

    assert_abs_diff_eq!(report.summary.final_value, 999.0, epsilon = 1e-9);
    assert_abs_diff_eq!(report.summary.total_costs, 1.0);
    assert!(report.history.iter().all(|s| s.turnover >= 0.0));
}

#[test]
fn test_strategy_sees_no_future_data() {
    let data = panel(&[&[1.0, 1.1, 1.2, 1.3, 1.4, 1.5]]);
    let mut seen = Vec::new();
    let mut strategy = |visible: &MarketData, date: NaiveDate| -> Result<StrategyOutput, StrategyError> {
        seen.push(date);
        assert_eq!(visible.trading_dates().last(), Some(&date));
        Ok(StrategyOutput::new(equal_positions(1, 1.0)))
    };

    engine(1.0, 2, 0.0).run(&data, &mut strategy).unwrap();
    assert_eq!(seen, vec![day(0), day(2), day(4)]);
}

#[test]
fn test_first_rebalance_failure_aborts() {
    let data = panel(&[&[1.0, 1.1, 1.2]]);
    let mut strategy = |_: &MarketData, _: NaiveDate| -> Result<StrategyOutput, StrategyError> {
        Err("no alphas".into())
    };

    let report = engine(100.0, 1, 0.0).run(&data, &mut strategy).unwrap();
    assert!(report.is_aborted());
    assert!(report.history.is_empty());
    assert_eq!(report.summary.final_value, 100.0);

    match report.into_result() {
        Err(BacktestError::Aborted(error)) => {
            assert_eq!(error.date, day(0));
            assert_eq!(error.message, "no alphas");
        }
        other => panic!("expected abort, got {other:?}"),
    }
}

#[test]
fn test_later_failure_keeps_positions() {
    let data = panel(&[&[100.0, 110.0, 121.0, 133.1]]);
    let mut calls = 0;
    let mut strategy = |_: &MarketData, _: NaiveDate| -> Result<StrategyOutput, StrategyError> {
        calls += 1;
        if calls == 2 {
            Err("solver failed".into())
        } else {
            Ok(StrategyOutput::new(equal_positions(1, 100.0)))
        }
    };

    let report = engine(100.0, 1, 0.0).run(&data, &mut strategy).unwrap();
    assert_eq!(report.outcome, RunOutcome::CompletedWithErrors { errors: 1 });
    assert_eq!(report.history.len(), 4);

    let failed = &report.history[1];
    assert!(!failed.rebalanced);
    assert_eq!(failed.positions, equal_positions(1, 100.0));
    assert_eq!(failed.error.as_ref().unwrap().message, "solver failed");
    assert_abs_diff_eq!(failed.mark_return, 100.0 * 0.1 / 110.0, epsilon = 1e-12);
    assert_eq!(report.rebalance_errors().count(), 1);
    assert_eq!(report.summary.rebalance_errors, 1);
}

#[test]
fn test_runs_are_deterministic() {
    let data = panel(&[
        &[10.0, 10.5, 10.2, 10.8, 11.0, 10.7],
        &[20.0, 19.5, 19.9, 20.4, 20.1, 20.6],
    ]);
    let run = || {
        let mut strategy =
            |visible: &MarketData, date: NaiveDate| -> Result<StrategyOutput, StrategyError> {
                let positions = visible
                    .symbols()
                    .into_iter()
                    .map(|s| {
                        let r = visible.asset_return(&s, date).unwrap_or(0.0);
                        (s, 1_000.0 * (1.0 + r))
                    })
                    .collect();
                Ok(StrategyOutput::new(positions))
            };
        engine(2_000.0, 2, 0.0005).run(&data, &mut strategy).unwrap()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_date_range_and_stepping() {
    let data = panel(&[&[1.0, 1.0, 1.0, 1.0, 1.0]]);
    let engine = BacktestEngine::new(BacktestConfig {
        initial_capital: 1.0,
        rebalance_frequency: 2,
        start_date: Some(day(1)),
        end_date: Some(day(3)),
        ..Default::default()
    })
    .unwrap();
    let dates = engine.dates(&data);
    assert_eq!(dates, vec![day(1), day(2), day(3)]);

    let mut strategy = |_: &MarketData, _: NaiveDate| -> Result<StrategyOutput, StrategyError> {
        Ok(StrategyOutput::new(equal_positions(1, 1.0)))
    };
    let mut state = engine.initial_state();
    assert_eq!(state.phase, Phase::AwaitingRebalance);
    engine.step(&mut state, &mut strategy, &data, &dates).unwrap();
    assert_eq!(state.phase, Phase::Holding);
    engine.step(&mut state, &mut strategy, &data, &dates).unwrap();
    assert_eq!(state.phase, Phase::AwaitingRebalance);
    engine.step(&mut state, &mut strategy, &data, &dates).unwrap();
    assert!(state.is_finished());
    assert_eq!(state.history.len(), 3);
}

#[test]
fn test_empty_range_yields_minimal_summary() {
    let data = panel(&[&[1.0, 1.0]]);
    let engine = BacktestEngine::new(BacktestConfig {
        initial_capital: 250_000.0,
        start_date: Some(day(10)),
        ..Default::default()
    })
    .unwrap();
    let mut calls = 0;
    let mut strategy = |_: &MarketData, _: NaiveDate| -> Result<StrategyOutput, StrategyError> {
        calls += 1;
        Ok(StrategyOutput::default())
    };

    let report = engine.run(&data, &mut strategy).unwrap();
    assert_eq!(calls, 0);
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert!(report.history.is_empty());
    assert!(report.series.dates.is_empty());
    assert_eq!(report.summary, PerformanceSummary::empty(250_000.0));
    assert_eq!(report.summary.final_value, 250_000.0);
    assert!(report.into_result().is_ok());
}

#[test]
fn test_factor_benchmark_tracks_next_day_returns() {
    let data = panel_with_market(&[&[1.0, 1.0, 1.0, 1.0]], &[0.5, -0.02, 0.03, 0.01]);
    let engine = BacktestEngine::new(BacktestConfig {
        transaction_cost: 0.0,
        benchmark: Some("market".to_string()),
        ..Default::default()
    })
    .unwrap();
    let mut strategy = |_: &MarketData, _: NaiveDate| -> Result<StrategyOutput, StrategyError> {
        Ok(StrategyOutput::default())
    };
    let report = engine.run(&data, &mut strategy).unwrap();

    // Day t is held over day t + 1; the last day has nothing to earn.
    assert_eq!(report.series.benchmark_returns, vec![-0.02, 0.03, 0.01, 0.0]);
    let growth = 0.98 * 1.03 * 1.01;
    assert_abs_diff_eq!(report.series.cumulative_benchmark[3], growth - 1.0, epsilon = 1e-12);

    let summary = &report.summary;
    assert_eq!(summary.benchmark.as_deref(), Some("market"));
    assert_eq!(summary.total_return, 0.0);
    assert!(summary.benchmark_volatility.unwrap() > 0.0);
    assert!(summary.tracking_error.unwrap() > 0.0);
    // A flat book trails a rising benchmark.
    assert!(summary.information_ratio.unwrap() < 0.0);
}

#[test]
fn test_asset_benchmark() {
    let data = panel(&[&[100.0, 110.0, 99.0], &[50.0, 50.0, 50.0]]);
    let engine = BacktestEngine::new(BacktestConfig {
        benchmark: Some("A0".to_string()),
        ..Default::default()
    })
    .unwrap();
    let mut strategy = |_: &MarketData, _: NaiveDate| -> Result<StrategyOutput, StrategyError> {
        Ok(StrategyOutput::new(equal_positions(1, 1.0)))
    };
    let report = engine.run(&data, &mut strategy).unwrap();
    assert_abs_diff_eq!(report.series.benchmark_returns[0], 0.1, epsilon = 1e-12);
    assert_abs_diff_eq!(report.series.benchmark_returns[1], -0.1, epsilon = 1e-12);
    assert_eq!(report.series.benchmark_returns[2], 0.0);
}

#[test]
fn test_unknown_benchmark_is_rejected() {
    let data = panel(&[&[1.0, 1.0]]);
    let engine = BacktestEngine::new(BacktestConfig {
        benchmark: Some("spx".to_string()),
        ..Default::default()
    })
    .unwrap();
    let mut strategy = |_: &MarketData, _: NaiveDate| -> Result<StrategyOutput, StrategyError> {
        Ok(StrategyOutput::default())
    };
    assert!(matches!(
        engine.run(&data, &mut strategy),
        Err(BacktestError::Configuration(message)) if message.contains("spx")
    ));
}
