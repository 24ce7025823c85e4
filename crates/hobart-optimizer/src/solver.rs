//! Conic program representation and solver backends
//!
//! Programs use the standard conic form
//!
//! ```text
//! minimize    qᵀx
//! subject to  A x + s = b,   s ∈ K
//! ```
//!
//! where `K` is a product of the cones listed in [`ConicProgram::cones`], in
//! row order.

use crate::error::{OptimizerError, Result};
use derive_more::Display;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// One block of the cone product
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cone {
    /// `s = 0` (equalities)
    Zero(usize),
    /// `s ≥ 0` (inequalities)
    Nonnegative(usize),
    /// `s₀ ≥ ‖s₁..‖₂`
    SecondOrder(usize),
}

impl Cone {
    /// Number of rows the cone spans
    pub const fn dim(&self) -> usize {
        match self {
            Self::Zero(n) | Self::Nonnegative(n) | Self::SecondOrder(n) => *n,
        }
    }
}

/// A linear objective over a product of cones
#[derive(Debug, Clone)]
pub struct ConicProgram {
    /// Linear objective
    pub q: Vec<f64>,
    /// Dense constraint matrix, one row per cone entry
    pub a: Array2<f64>,
    /// Constraint offsets
    pub b: Vec<f64>,
    /// Cone blocks covering the rows of `a` in order
    pub cones: Vec<Cone>,
}

impl ConicProgram {
    /// Number of decision variables
    pub fn n_variables(&self) -> usize {
        self.q.len()
    }

    /// Check that the pieces agree in size.
    ///
    /// # Errors
    /// Returns [`OptimizerError::DimensionMismatch`] when they do not.
    pub fn validate(&self) -> Result<()> {
        let (m, n) = self.a.dim();
        let cone_rows: usize = self.cones.iter().map(Cone::dim).sum();
        if n != self.q.len() || m != self.b.len() || m != cone_rows {
            return Err(OptimizerError::DimensionMismatch(format!(
                "A is {m}x{n}, q has {}, b has {}, cones span {cone_rows}",
                self.q.len(),
                self.b.len()
            )));
        }
        Ok(())
    }
}

/// Termination status, normalised across backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// Solved to tolerance
    #[display("optimal")]
    Optimal,
    /// Solved to reduced tolerance
    #[display("almost_optimal")]
    AlmostOptimal,
    /// No point satisfies the constraints
    #[display("infeasible")]
    Infeasible,
    /// Objective unbounded below
    #[display("unbounded")]
    Unbounded,
    /// Iteration or time limit reached
    #[display("limit_reached")]
    LimitReached,
    /// Numerical breakdown or insufficient progress
    #[display("numerical_error")]
    NumericalError,
    /// Solved, but offsetting legs leave `Σ|w|` below one. Set by
    /// [`PortfolioOptimizer`](crate::PortfolioOptimizer), never by a backend
    #[display("underinvested")]
    Underinvested,
}

impl SolveStatus {
    /// Whether the solution is optimal to full tolerance
    pub const fn is_optimal(self) -> bool {
        matches!(self, Self::Optimal)
    }
}

/// Primal solution and status
#[derive(Debug, Clone)]
pub struct Solution {
    /// Primal variables
    pub x: Vec<f64>,
    /// Termination status
    pub status: SolveStatus,
}

/// A conic solver backend.
pub trait ConvexSolver: std::fmt::Debug + Send + Sync {
    /// Backend name, for logging
    fn name(&self) -> &str;

    /// Solve `program`. A non-optimal status is not an error; errors are
    /// reserved for failing to run the solver at all.
    ///
    /// # Errors
    /// Backend-specific setup failures.
    fn solve(&self, program: &ConicProgram) -> Result<Solution>;
}

/// Interior-point backend built on Clarabel
#[derive(Debug, Clone)]
pub struct ClarabelSolver {
    max_iter: u32,
    verbose: bool,
}

impl Default for ClarabelSolver {
    fn default() -> Self {
        Self {
            max_iter: 200,
            verbose: false,
        }
    }
}

impl ClarabelSolver {
    /// Set the iteration limit
    pub const fn with_max_iter(mut self, max_iter: u32) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Print solver progress to stdout
    pub const fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl ConvexSolver for ClarabelSolver {
    fn name(&self) -> &str {
        "clarabel"
    }

    fn solve(&self, program: &ConicProgram) -> Result<Solution> {
        use clarabel::algebra::CscMatrix;
        use clarabel::solver::{
            DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
        };

        program.validate()?;
        let n = program.n_variables();
        let (m, _) = program.a.dim();

        // Linear objective: P is empty
        let p = CscMatrix::new(n, n, vec![0; n + 1], Vec::new(), Vec::new());

        // Column by column (CSC format), rows ascending
        let mut a_data = Vec::new();
        let mut a_indices = Vec::new();
        let mut a_indptr = vec![0];
        for j in 0..n {
            for i in 0..m {
                let val = program.a[[i, j]];
                if val != 0.0 {
                    a_data.push(val);
                    a_indices.push(i);
                }
            }
            a_indptr.push(a_data.len());
        }
        let a = CscMatrix::new(m, n, a_indptr, a_indices, a_data);

        let cones: Vec<SupportedConeT<f64>> = program
            .cones
            .iter()
            .map(|cone| match *cone {
                Cone::Zero(k) => SupportedConeT::ZeroConeT(k),
                Cone::Nonnegative(k) => SupportedConeT::NonnegativeConeT(k),
                Cone::SecondOrder(k) => SupportedConeT::SecondOrderConeT(k),
            })
            .collect();

        let settings = DefaultSettingsBuilder::default()
            .max_iter(self.max_iter)
            .verbose(self.verbose)
            .build()
            .map_err(|e| OptimizerError::Solver(format!("failed to build settings: {e}")))?;

        let mut solver = DefaultSolver::new(&p, &program.q, &a, &program.b, &cones, settings)
            .map_err(|e| OptimizerError::Solver(format!("failed to create solver: {e:?}")))?;

        solver.solve();

        let status = match solver.solution.status {
            SolverStatus::Solved => SolveStatus::Optimal,
            SolverStatus::AlmostSolved => SolveStatus::AlmostOptimal,
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                SolveStatus::Infeasible
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                SolveStatus::Unbounded
            }
            SolverStatus::MaxIterations | SolverStatus::MaxTime => SolveStatus::LimitReached,
            _ => SolveStatus::NumericalError,
        };

        Ok(Solution {
            x: solver.solution.x.clone(),
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_validate_catches_cone_mismatch() {
        let program = ConicProgram {
            q: vec![1.0, 1.0],
            a: Array2::zeros((3, 2)),
            b: vec![0.0; 3],
            cones: vec![Cone::Nonnegative(2)],
        };
        assert!(program.validate().is_err());
    }

    #[test]
    fn test_clarabel_small_lp() {
        // minimize -x - 2y  s.t.  x + y <= 1, x >= 0, y >= 0
        let program = ConicProgram {
            q: vec![-1.0, -2.0],
            a: array![[1.0, 1.0], [-1.0, 0.0], [0.0, -1.0]],
            b: vec![1.0, 0.0, 0.0],
            cones: vec![Cone::Nonnegative(3)],
        };
        let solution = ClarabelSolver::default().solve(&program).unwrap();
        assert!(solution.status.is_optimal());
        assert_abs_diff_eq!(solution.x[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(solution.x[1], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_clarabel_second_order_cone() {
        // maximize x + y subject to ‖(x, y)‖ <= 1
        let program = ConicProgram {
            q: vec![-1.0, -1.0],
            a: array![[0.0, 0.0], [-1.0, 0.0], [0.0, -1.0]],
            b: vec![1.0, 0.0, 0.0],
            cones: vec![Cone::SecondOrder(3)],
        };
        let solution = ClarabelSolver::default().solve(&program).unwrap();
        assert!(solution.status.is_optimal());
        let half_root = 0.5_f64.sqrt();
        assert_abs_diff_eq!(solution.x[0], half_root, epsilon = 1e-6);
        assert_abs_diff_eq!(solution.x[1], half_root, epsilon = 1e-6);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(SolveStatus::AlmostOptimal.to_string(), "almost_optimal");
        assert!(!SolveStatus::LimitReached.is_optimal());
        assert_eq!(SolveStatus::Underinvested.to_string(), "underinvested");
        assert!(!SolveStatus::Underinvested.is_optimal());
    }
}
