//! Constraint invariants of the Clarabel-backed optimizer.

use approx::assert_abs_diff_eq;
use hobart_optimizer::{
    FactorBounds, GROSS_TOLERANCE, OptimizationProblem, PortfolioConstraints, PortfolioOptimizer,
    SolveStatus,
};
use ndarray::{Array1, Array2, array};

const TOL: f64 = 1e-5;

struct Fixture {
    alphas: Array1<f64>,
    exposures: Array2<f64>,
    covariance: Array2<f64>,
    specific: Array1<f64>,
    names: Vec<String>,
}

fn fixture() -> Fixture {
    Fixture {
        alphas: array![0.05, 0.03, 0.01, -0.01, -0.03, -0.05],
        exposures: array![
            [1.2, 0.5],
            [1.1, -0.3],
            [1.0, 0.1],
            [0.9, 0.4],
            [0.8, -0.2],
            [0.7, 0.0]
        ],
        covariance: array![[0.0004, 0.00005], [0.00005, 0.0001]],
        specific: Array1::from_elem(6, 0.0004),
        names: vec!["market".to_string(), "size".to_string()],
    }
}

fn solve(
    fx: &Fixture,
    bounds: &FactorBounds,
    constraints: &PortfolioConstraints,
) -> hobart_optimizer::OptimizedPortfolio {
    let resolved = bounds.resolve(&fx.names);
    let problem = OptimizationProblem {
        alphas: fx.alphas.view(),
        exposures: fx.exposures.view(),
        factor_covariance: fx.covariance.view(),
        specific_risk: fx.specific.view(),
        factor_bounds: &resolved,
    };
    PortfolioOptimizer::default()
        .optimize(&problem, constraints, &fx.names)
        .unwrap()
}

#[test]
fn test_loose_risk_fills_position_caps() {
    let fx = fixture();
    let constraints = PortfolioConstraints {
        target_gmv: 1_000_000.0,
        max_position_frac: 0.25,
        max_total_vol: 1.0,
    };
    let result = solve(&fx, &FactorBounds::new(), &constraints);
    assert_eq!(result.status, SolveStatus::Optimal);
    assert_abs_diff_eq!(result.gross, 1.0, epsilon = TOL);

    let gmv: f64 = result.positions.iter().map(|p| p.abs()).sum();
    assert_abs_diff_eq!(gmv, 1_000_000.0, epsilon = 1.0);
    assert_abs_diff_eq!(result.weights[0], 0.25, epsilon = TOL);
    assert_abs_diff_eq!(result.weights[1], 0.25, epsilon = TOL);
    assert_abs_diff_eq!(result.weights[4], -0.25, epsilon = TOL);
    assert_abs_diff_eq!(result.weights[5], -0.25, epsilon = TOL);
    assert!(result
        .positions
        .iter()
        .all(|p| p.abs() <= 0.25 * gmv * (1.0 + TOL)));
}

#[test]
fn test_factor_bound_is_respected() {
    let fx = fixture();
    let constraints = PortfolioConstraints {
        target_gmv: 1_000_000.0,
        max_position_frac: 0.25,
        max_total_vol: 1.0,
    };
    let bounds = FactorBounds::new().with_bound("market", 0.05);
    let result = solve(&fx, &bounds, &constraints);

    let market = fx.exposures.column(0).dot(&result.weights);
    assert!(market.abs() <= 0.05 + TOL, "market exposure {market}");
    let stats_market = result.stats.exposure("market").unwrap();
    assert!(stats_market.pct_gmv.abs() <= 0.05 + TOL);

    let gmv: f64 = result.positions.iter().map(|p| p.abs()).sum();
    assert!(gmv <= 1_000_000.0 * (1.0 + TOL));
}

#[test]
fn test_risk_budget_binds() {
    let fx = fixture();
    let constraints = PortfolioConstraints {
        target_gmv: 1_000_000.0,
        max_position_frac: 0.25,
        max_total_vol: 0.005,
    };
    let result = solve(&fx, &FactorBounds::new(), &constraints);

    let w = &result.weights;
    let fw = fx.exposures.t().dot(w);
    let variance = fw.dot(&fx.covariance.dot(&fw))
        + w.iter().zip(fx.specific.iter()).map(|(w, s)| w * w * s).sum::<f64>();
    assert!(variance.sqrt() <= 0.005 + TOL);
    assert_abs_diff_eq!(result.stats.total_volatility, 0.005, epsilon = 1e-4);

    let gmv: f64 = result.positions.iter().map(|p| p.abs()).sum();
    assert!(gmv <= 1_000_000.0 * (1.0 + TOL));
    assert!(result.stats.expected_return > 0.0);
}

#[test]
fn test_optimal_status_means_fully_invested() {
    let fx = fixture();
    for max_total_vol in [1.0, 0.02, 0.01, 0.005] {
        let constraints = PortfolioConstraints {
            target_gmv: 1_000_000.0,
            max_position_frac: 0.25,
            max_total_vol,
        };
        let result = solve(&fx, &FactorBounds::new(), &constraints);

        let realized: f64 = result.weights.iter().map(|w| w.abs()).sum();
        assert_abs_diff_eq!(result.gross, realized, epsilon = 1e-12);
        assert_abs_diff_eq!(result.stats.gmv, realized * 1_000_000.0, epsilon = 1e-6);

        if result.status == SolveStatus::Optimal {
            assert!(result.gross >= 1.0 - GROSS_TOLERANCE, "vol {max_total_vol}");
            let largest = result.positions.iter().fold(0.0_f64, |m, p| m.max(p.abs()));
            assert!(
                largest <= 0.25 * result.stats.gmv * (1.0 + TOL),
                "vol {max_total_vol}: {largest} of {}",
                result.stats.gmv
            );
        } else {
            assert_eq!(result.status, SolveStatus::Underinvested, "vol {max_total_vol}");
            assert!(result.gross < 1.0 - GROSS_TOLERANCE);
        }
    }
}

#[test]
fn test_binding_risk_budget_reports_shortfall() {
    let fx = fixture();
    let constraints = PortfolioConstraints {
        target_gmv: 1_000_000.0,
        max_position_frac: 0.25,
        max_total_vol: 0.005,
    };
    let result = solve(&fx, &FactorBounds::new(), &constraints);
    assert_eq!(result.status, SolveStatus::Underinvested);
    assert!(result.gross < 0.9, "gross {}", result.gross);
}

#[test]
fn test_invalid_constraints_rejected_before_solving() {
    let fx = fixture();
    let resolved = FactorBounds::new().resolve(&fx.names);
    let problem = OptimizationProblem {
        alphas: fx.alphas.view(),
        exposures: fx.exposures.view(),
        factor_covariance: fx.covariance.view(),
        specific_risk: fx.specific.view(),
        factor_bounds: &resolved,
    };
    let constraints = PortfolioConstraints {
        target_gmv: -1.0,
        max_position_frac: 0.25,
        max_total_vol: 0.02,
    };
    assert!(PortfolioOptimizer::default()
        .optimize(&problem, &constraints, &fx.names)
        .is_err());
}
