//! End-to-end signal evaluation over a synthetic panel.

use approx::assert_abs_diff_eq;
use chrono::NaiveDate;
use hobart_data::{AssetSeries, FactorSet, MarketData, Observation};
use hobart_signals::{
    MomentumConfig, MomentumSignal, RiskAdjustedReturnConfig, RiskAdjustedReturnSignal,
    SignalCombiner, SignalKind,
};
use ndarray::Array2;

fn synthetic_panel(n_assets: usize, n_days: usize) -> MarketData {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    let dates: Vec<NaiveDate> = (0..n_days)
        .map(|t| start + chrono::Duration::days(t as i64))
        .collect();

    let assets = (0..n_assets)
        .map(|i| {
            let drift = 0.0005 * (i as f64 - 1.0);
            let mut price = 50.0;
            let observations = dates
                .iter()
                .enumerate()
                .map(|(t, date)| {
                    if t > 0 {
                        price *= 1.0 + drift + 0.01 * ((t as f64) * 0.7 + i as f64).sin();
                    }
                    Observation::new(*date, price, price * 1e6 * (i + 1) as f64).with_fundamentals(
                        Some(2.0 + i as f64 * 0.3),
                        Some(0.5),
                        Some(1e5 * (1.0 + 0.1 * ((t as f64) * 0.3).cos())),
                    )
                })
                .collect();
            AssetSeries::new(format!("S{i}"), observations).unwrap()
        })
        .collect();

    let factors = FactorSet::new(
        vec!["market".into()],
        dates.clone(),
        Array2::from_shape_fn((n_days, 1), |(t, _)| 0.01 * ((t as f64) * 0.5).sin()),
    )
    .unwrap();

    MarketData::new(assets, factors).unwrap()
}

#[test]
fn test_every_builtin_signal_produces_centered_alphas() {
    let data = synthetic_panel(5, 60);
    let date = *data.trading_dates().last().unwrap();

    let momentum = MomentumSignal::with_config(MomentumConfig {
        trailing_days: 20,
        half_life: 10.0,
        lag: 5,
    });
    let sharpe = RiskAdjustedReturnSignal::with_config(RiskAdjustedReturnConfig {
        lookback_days: 30,
        min_periods: 10,
        periods_per_year: 252.0,
    });

    let combiner = SignalCombiner::new()
        .with_signal(Box::new(momentum), 0.3)
        .with_signal(Box::new(sharpe), 0.4)
        .with_signal(SignalKind::Size.build(), 0.1)
        .with_signal(SignalKind::Value.build(), 0.1)
        .with_signal(SignalKind::Quality.build(), 0.1)
        .with_winsorize(0.05)
        .unwrap();

    let alphas = combiner.combine(&data, date).unwrap();
    assert_eq!(alphas.len(), 5);
    assert!(alphas.scores.iter().all(|v| v.is_finite()));
    assert_abs_diff_eq!(alphas.scores.sum(), 0.0, epsilon = 1e-9);
    assert!(alphas.scores.iter().any(|v| v.abs() > 1e-6));
}

#[test]
fn test_signals_see_only_visible_history() {
    let data = synthetic_panel(4, 60);
    let dates = data.trading_dates();
    let decision = dates[40];

    let combiner = SignalCombiner::new().with_signal(
        Box::new(RiskAdjustedReturnSignal::with_config(RiskAdjustedReturnConfig {
            lookback_days: 20,
            min_periods: 10,
            periods_per_year: 252.0,
        })),
        1.0,
    );

    let full = combiner.combine(&data, decision).unwrap();
    let truncated = combiner.combine(&data.as_of(decision), decision).unwrap();
    for (a, b) in full.scores.iter().zip(truncated.scores.iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-12);
    }
}

#[test]
fn test_insufficient_history_scores_zero() {
    // With fewer days than the momentum window every score is null, so the
    // combined alpha is all zeros rather than an error.
    let data = synthetic_panel(3, 10);
    let date = *data.trading_dates().last().unwrap();
    let combiner = SignalCombiner::new().with_signal(SignalKind::Momentum.build(), 1.0);
    let alphas = combiner.combine(&data, date).unwrap();
    assert!(alphas.scores.iter().all(|v| v.abs() < 1e-15));
}
