//! Risk-constrained portfolio optimization
//!
//! Maximizes `α·w` over weights with `Σ|w| = 1` subject to per-position,
//! per-factor and total-risk budgets. Weights are split as `w = u − v` with
//! `u, v ≥ 0`, which turns the gross constraint into `Σ(u + v) = 1`. The risk
//! budget is a second-order cone on
//!
//! ```text
//! ( max_vol,  L w,  √s ∘ w )      with  Lᵀ L = F
//! ```
//!
//! where `L` is the square root of the factor covariance from its eigen
//! decomposition (clipped to positive semi-definite) applied to `Xᵀ`, and `s`
//! are the specific variances.

use crate::constraints::PortfolioConstraints;
use crate::error::{OptimizerError, Result};
use crate::portfolio::PortfolioStats;
use crate::sizing::{SizingMethod, cap_positions, neutralize_factor, size_positions};
use crate::solver::{ClarabelSolver, Cone, ConicProgram, ConvexSolver, SolveStatus};
use hobart_risk::RiskModelResult;
use hobart_risk::covariance::jacobi_eigendecomp;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, s};

/// Shortfall of `Σ|w|` below one tolerated as solver noise
pub const GROSS_TOLERANCE: f64 = 1e-4;

/// Inputs of one optimization
#[derive(Debug, Clone, Copy)]
pub struct OptimizationProblem<'a> {
    /// Alpha per asset (N)
    pub alphas: ArrayView1<'a, f64>,
    /// Factor exposures (N x F)
    pub exposures: ArrayView2<'a, f64>,
    /// Factor covariance (F x F)
    pub factor_covariance: ArrayView2<'a, f64>,
    /// Specific variance per asset (N)
    pub specific_risk: ArrayView1<'a, f64>,
    /// Exposure bound per factor as a fraction of GMV; `None` = unbounded
    pub factor_bounds: &'a [Option<f64>],
}

impl<'a> OptimizationProblem<'a> {
    /// Take exposures, covariance and specific variances from a risk model
    /// whose rows line up with `alphas`.
    pub fn from_risk_model(
        alphas: ArrayView1<'a, f64>,
        risk: &'a RiskModelResult,
        factor_bounds: &'a [Option<f64>],
    ) -> Self {
        Self {
            alphas,
            exposures: risk.exposures().view(),
            factor_covariance: risk.factor_covariance().view(),
            specific_risk: risk.specific_variances().view(),
            factor_bounds,
        }
    }

    fn validate(&self) -> Result<()> {
        let n = self.alphas.len();
        let f = self.factor_covariance.nrows();
        if self.exposures.dim() != (n, f)
            || self.factor_covariance.ncols() != f
            || self.specific_risk.len() != n
            || self.factor_bounds.len() != f
        {
            return Err(OptimizerError::DimensionMismatch(format!(
                "{n} alphas, exposures {:?}, covariance {:?}, {} specific risks, {} factor bounds",
                self.exposures.dim(),
                self.factor_covariance.dim(),
                self.specific_risk.len(),
                self.factor_bounds.len()
            )));
        }
        if n == 0 {
            return Err(OptimizerError::DimensionMismatch("no assets to optimize".to_string()));
        }
        let inputs = self
            .alphas
            .iter()
            .chain(self.exposures.iter())
            .chain(self.factor_covariance.iter())
            .chain(self.specific_risk.iter());
        for value in inputs {
            if !value.is_finite() {
                return Err(OptimizerError::Configuration(
                    "optimizer inputs contain non-finite values".to_string(),
                ));
            }
        }
        if self.specific_risk.iter().any(|&v| v < 0.0) {
            return Err(OptimizerError::Configuration(
                "specific variances must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Output of [`PortfolioOptimizer::optimize`]
#[derive(Debug, Clone)]
pub struct OptimizedPortfolio {
    /// Weights `u − v`. `Σ|w| = 1` unless [`SolveStatus::Underinvested`]
    pub weights: Array1<f64>,
    /// Realized `Σ|w|`
    pub gross: f64,
    /// `weights · target_gmv`
    pub positions: Array1<f64>,
    /// Statistics of `positions`
    pub stats: PortfolioStats,
    /// Solver termination status
    pub status: SolveStatus,
}

/// Convex portfolio optimizer over an injected solver
#[derive(Debug)]
pub struct PortfolioOptimizer {
    solver: Box<dyn ConvexSolver>,
}

impl Default for PortfolioOptimizer {
    fn default() -> Self {
        Self::new(Box::new(ClarabelSolver::default()))
    }
}

impl PortfolioOptimizer {
    /// Optimizer using `solver`
    pub fn new(solver: Box<dyn ConvexSolver>) -> Self {
        Self { solver }
    }

    /// Backend name
    pub fn solver_name(&self) -> &str {
        self.solver.name()
    }

    /// Solve for target positions.
    ///
    /// A non-optimal solver status is logged as a warning and the solver's
    /// best-effort point is still returned.
    ///
    /// The split `w = u − v` only bounds `Σ|w|` from above: when the risk
    /// budget binds, the solver can park gross in offsetting `u_i = v_i`
    /// pairs. A realized gross below `1 − GROSS_TOLERANCE` downgrades an
    /// optimal status to [`SolveStatus::Underinvested`], so the position cap
    /// then holds only against `target_gmv`, not against the realized book.
    ///
    /// # Errors
    /// [`OptimizerError::Configuration`] or
    /// [`OptimizerError::DimensionMismatch`] for bad inputs,
    /// [`OptimizerError::Solver`] if the backend fails to run, and
    /// [`OptimizerError::Infeasible`] if it returns non-finite weights.
    pub fn optimize(
        &self,
        problem: &OptimizationProblem<'_>,
        constraints: &PortfolioConstraints,
        factor_names: &[String],
    ) -> Result<OptimizedPortfolio> {
        constraints.validate()?;
        problem.validate()?;
        if factor_names.len() != problem.factor_covariance.nrows() {
            return Err(OptimizerError::DimensionMismatch(format!(
                "{} factor names for {} factors",
                factor_names.len(),
                problem.factor_covariance.nrows()
            )));
        }

        let program = build_program(problem, constraints)?;
        let solution = self.solver.solve(&program)?;
        let n = problem.alphas.len();

        if solution.x.len() != 2 * n {
            return Err(OptimizerError::Infeasible {
                status: solution.status,
                reason: format!("expected {} variables, got {}", 2 * n, solution.x.len()),
            });
        }
        if solution.x.iter().any(|v| !v.is_finite()) {
            return Err(OptimizerError::Infeasible {
                status: solution.status,
                reason: "solver returned non-finite weights".to_string(),
            });
        }
        if !solution.status.is_optimal() {
            tracing::warn!(
                solver = self.solver.name(),
                status = %solution.status,
                "optimization not optimal, using best-effort solution"
            );
        }

        let x = Array1::from_vec(solution.x);
        let weights = &x.slice(s![..n]) - &x.slice(s![n..]);
        let gross = weights.mapv(f64::abs).sum();
        let status = if gross < 1.0 - GROSS_TOLERANCE {
            tracing::warn!(
                solver = self.solver.name(),
                gross,
                "offsetting long and short legs leave the book underinvested"
            );
            if solution.status.is_optimal() {
                SolveStatus::Underinvested
            } else {
                solution.status
            }
        } else {
            solution.status
        };
        let positions = &weights * constraints.target_gmv;
        let stats = PortfolioStats::compute(
            positions.view(),
            problem.alphas,
            problem.exposures,
            problem.factor_covariance,
            problem.specific_risk,
            factor_names,
        )?;

        tracing::debug!(
            %status,
            gross,
            gmv = stats.gmv,
            total_volatility = stats.total_volatility,
            "optimized portfolio"
        );

        Ok(OptimizedPortfolio {
            weights,
            gross,
            positions,
            stats,
            status,
        })
    }
}

/// Assemble the conic program in `x = [u; v]`.
fn build_program(
    problem: &OptimizationProblem<'_>,
    constraints: &PortfolioConstraints,
) -> Result<ConicProgram> {
    let n = problem.alphas.len();
    let bounded: Vec<(usize, f64)> = problem
        .factor_bounds
        .iter()
        .enumerate()
        .filter_map(|(j, b)| b.map(|b| (j, b)))
        .collect();

    // Risk factor rows: L Xᵀ, with L = diag(√λ) Vᵀ.
    let root = jacobi_eigendecomp(problem.factor_covariance, 100, 1e-14)?
        .clipped(0.0)
        .root();
    let factor_rows = root.dot(&problem.exposures.t());
    let k = factor_rows.nrows();

    let n_linear = 2 * n + 2 * n + 2 * bounded.len();
    let n_soc = 1 + k + n;
    let m = 1 + n_linear + n_soc;
    let mut a = Array2::<f64>::zeros((m, 2 * n));
    let mut b = vec![0.0; m];

    // Σ(u + v) = 1
    a.row_mut(0).fill(1.0);
    b[0] = 1.0;
    let mut row = 1;

    // u ≥ 0, v ≥ 0
    for j in 0..2 * n {
        a[[row, j]] = -1.0;
        row += 1;
    }

    // ±(u_i − v_i) ≤ max_position_frac
    for sign in [1.0, -1.0] {
        for i in 0..n {
            a[[row, i]] = sign;
            a[[row, n + i]] = -sign;
            b[row] = constraints.max_position_frac;
            row += 1;
        }
    }

    // ±β_f·(u − v) ≤ bound_f
    for &(j, bound) in &bounded {
        for sign in [1.0, -1.0] {
            for i in 0..n {
                let beta = problem.exposures[[i, j]];
                a[[row, i]] = sign * beta;
                a[[row, n + i]] = -sign * beta;
            }
            b[row] = bound;
            row += 1;
        }
    }

    // (max_vol, L Xᵀ w, √s ∘ w) ∈ SOC, written as s = b − A x
    b[row] = constraints.max_total_vol;
    row += 1;
    for r in 0..k {
        for i in 0..n {
            a[[row, i]] = -factor_rows[[r, i]];
            a[[row, n + i]] = factor_rows[[r, i]];
        }
        row += 1;
    }
    for i in 0..n {
        let sd = problem.specific_risk[i].sqrt();
        a[[row, i]] = -sd;
        a[[row, n + i]] = sd;
        row += 1;
    }
    debug_assert_eq!(row, m);

    let mut q = Vec::with_capacity(2 * n);
    q.extend(problem.alphas.iter().map(|a| -a));
    q.extend(problem.alphas.iter().copied());

    Ok(ConicProgram {
        q,
        a,
        b,
        cones: vec![
            Cone::Zero(1),
            Cone::Nonnegative(n_linear),
            Cone::SecondOrder(n_soc),
        ],
    })
}

/// Closed-form construction: size, cap, then hedge one factor
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackConstructor {
    /// Sizing rule
    pub method: SizingMethod,
    /// Risk aversion for [`SizingMethod::MeanVariance`]
    pub risk_aversion: f64,
    /// Target gross market value
    pub target_gmv: f64,
    /// Largest |weight| of a single position
    pub max_stock_weight: f64,
    /// Limit on |Σ p·β| as a fraction of GMV
    pub max_factor_exposure: f64,
}

impl FallbackConstructor {
    /// Check the parameters.
    ///
    /// # Errors
    /// Returns [`OptimizerError::Configuration`] for a non-positive GMV or
    /// risk aversion, or a weight or exposure fraction outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if !(self.target_gmv.is_finite() && self.target_gmv > 0.0) {
            return Err(OptimizerError::Configuration(format!(
                "target GMV must be positive, got {}",
                self.target_gmv
            )));
        }
        if !(self.risk_aversion.is_finite() && self.risk_aversion > 0.0) {
            return Err(OptimizerError::Configuration(format!(
                "risk aversion must be positive, got {}",
                self.risk_aversion
            )));
        }
        for (name, value) in [
            ("max stock weight", self.max_stock_weight),
            ("max factor exposure", self.max_factor_exposure),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(OptimizerError::Configuration(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Positions for `alphas`, hedged against `betas`.
    ///
    /// # Errors
    /// See [`Self::validate`]; also fails if the inputs differ in length.
    pub fn construct(
        &self,
        alphas: ArrayView1<'_, f64>,
        idio_vol: ArrayView1<'_, f64>,
        betas: ArrayView1<'_, f64>,
    ) -> Result<Array1<f64>> {
        self.validate()?;
        let sized = size_positions(
            alphas,
            idio_vol,
            self.target_gmv,
            self.method,
            self.risk_aversion,
        )?;
        let capped = cap_positions(sized.view(), self.max_stock_weight);
        let outcome = neutralize_factor(capped.view(), betas, self.max_factor_exposure)?;
        Ok(outcome.positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::Solution;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[derive(Debug)]
    struct FixedSolver {
        x: Vec<f64>,
        status: SolveStatus,
    }

    impl ConvexSolver for FixedSolver {
        fn name(&self) -> &str {
            "fixed"
        }

        fn solve(&self, program: &ConicProgram) -> Result<Solution> {
            program.validate()?;
            Ok(Solution {
                x: self.x.clone(),
                status: self.status,
            })
        }
    }

    fn constraints() -> PortfolioConstraints {
        PortfolioConstraints {
            target_gmv: 1_000_000.0,
            max_position_frac: 0.4,
            max_total_vol: 1.0,
        }
    }

    #[test]
    fn test_program_shape() {
        let alphas = array![0.1, -0.2, 0.05];
        let exposures = array![[1.0, 0.1], [0.8, -0.2], [1.2, 0.0]];
        let cov = array![[0.04, 0.0], [0.0, 0.01]];
        let specific = array![0.01, 0.02, 0.03];
        let bounds = [Some(0.2), None];
        let problem = OptimizationProblem {
            alphas: alphas.view(),
            exposures: exposures.view(),
            factor_covariance: cov.view(),
            specific_risk: specific.view(),
            factor_bounds: &bounds,
        };
        let program = build_program(&problem, &constraints()).unwrap();
        assert!(program.validate().is_ok());
        // 1 equality + (6 sign + 6 position + 2 factor) + (1 + 2 + 3) cone rows
        assert_eq!(program.a.dim(), (1 + 14 + 6, 6));
        assert_eq!(program.q, vec![-0.1, 0.2, -0.05, 0.1, -0.2, 0.05]);
    }

    #[test]
    fn test_non_optimal_status_returns_solution() {
        let alphas = array![0.1, -0.1];
        let exposures = array![[1.0], [1.0]];
        let cov = array![[0.04]];
        let specific = array![0.01, 0.01];
        let bounds = [None];
        let problem = OptimizationProblem {
            alphas: alphas.view(),
            exposures: exposures.view(),
            factor_covariance: cov.view(),
            specific_risk: specific.view(),
            factor_bounds: &bounds,
        };
        let optimizer = PortfolioOptimizer::new(Box::new(FixedSolver {
            x: vec![0.5, 0.0, 0.0, 0.5],
            status: SolveStatus::LimitReached,
        }));
        let result = optimizer
            .optimize(&problem, &constraints(), &["market".to_string()])
            .unwrap();
        assert_eq!(result.status, SolveStatus::LimitReached);
        assert_abs_diff_eq!(result.positions[0], 500_000.0);
        assert_abs_diff_eq!(result.positions[1], -500_000.0);
        assert_abs_diff_eq!(result.stats.exposure("market").unwrap().net, 0.0);
    }

    #[test]
    fn test_offsetting_legs_are_underinvested() {
        let alphas = array![0.1, -0.1];
        let exposures = array![[1.0], [1.0]];
        let cov = array![[0.04]];
        let specific = array![0.01, 0.01];
        let bounds = [None];
        let problem = OptimizationProblem {
            alphas: alphas.view(),
            exposures: exposures.view(),
            factor_covariance: cov.view(),
            specific_risk: specific.view(),
            factor_bounds: &bounds,
        };
        let optimizer = PortfolioOptimizer::new(Box::new(FixedSolver {
            x: vec![0.3, 0.0, 0.2, 0.5],
            status: SolveStatus::Optimal,
        }));
        let result = optimizer
            .optimize(&problem, &constraints(), &["market".to_string()])
            .unwrap();
        assert_eq!(result.status, SolveStatus::Underinvested);
        assert!(!result.status.is_optimal());
        assert_abs_diff_eq!(result.gross, 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(result.stats.gmv, 600_000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_non_finite_solution_is_infeasible() {
        let alphas = array![0.1];
        let exposures = array![[1.0]];
        let cov = array![[0.04]];
        let specific = array![0.01];
        let bounds = [None];
        let problem = OptimizationProblem {
            alphas: alphas.view(),
            exposures: exposures.view(),
            factor_covariance: cov.view(),
            specific_risk: specific.view(),
            factor_bounds: &bounds,
        };
        let optimizer = PortfolioOptimizer::new(Box::new(FixedSolver {
            x: vec![f64::NAN, 0.0],
            status: SolveStatus::NumericalError,
        }));
        assert!(matches!(
            optimizer.optimize(&problem, &constraints(), &["market".to_string()]),
            Err(OptimizerError::Infeasible { .. })
        ));
    }

    #[test]
    fn test_fallback_pipeline() {
        let constructor = FallbackConstructor {
            method: SizingMethod::Proportional,
            risk_aversion: 1.0,
            target_gmv: 150.0,
            max_stock_weight: 1.0,
            max_factor_exposure: 0.1,
        };
        let positions = constructor
            .construct(
                array![2.0, -1.0].view(),
                array![0.1, 0.1].view(),
                array![1.0, 1.0].view(),
            )
            .unwrap();
        let exposure: f64 = positions.sum();
        assert!(exposure.abs() < 50.0);
        assert!(exposure > 0.0);
    }

    #[test]
    fn test_fallback_rejects_bad_weight() {
        let constructor = FallbackConstructor {
            method: SizingMethod::Proportional,
            risk_aversion: 1.0,
            target_gmv: 1e6,
            max_stock_weight: 1.5,
            max_factor_exposure: 0.1,
        };
        assert!(constructor.validate().is_err());
    }
}
