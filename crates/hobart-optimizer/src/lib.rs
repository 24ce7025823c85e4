#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod constraints;
pub mod error;
pub mod optimizer;
pub mod portfolio;
pub mod sizing;
pub mod solver;

pub use constraints::{FactorBounds, PortfolioConstraints};
pub use error::{OptimizerError, Result};
pub use optimizer::{
    FallbackConstructor, GROSS_TOLERANCE, OptimizationProblem, OptimizedPortfolio, PortfolioOptimizer,
};
pub use portfolio::{FactorExposure, Holding, Portfolio, PortfolioStats};
pub use sizing::{
    NeutralizationOutcome, SizingMethod, cap_positions, neutralize_factor, size_positions,
};
pub use solver::{ClarabelSolver, Cone, ConicProgram, ConvexSolver, SolveStatus, Solution};
