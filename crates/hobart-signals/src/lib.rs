#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod combiner;
pub mod momentum;
pub mod quality;
pub mod registry;
pub mod risk_adjusted;
pub mod size;
pub mod traits;
pub mod utils;
pub mod value;

pub use combiner::{AlphaScores, SignalCombiner};
pub use momentum::{MomentumConfig, MomentumSignal};
pub use quality::QualitySignal;
pub use registry::{SignalKind, SignalParams, available_signals};
pub use risk_adjusted::{RiskAdjustedReturnConfig, RiskAdjustedReturnSignal};
pub use size::SizeSignal;
pub use traits::{Signal, SignalError};
pub use utils::{center, center_xsection, exp_weights, standardize, winsorize};
pub use value::ValueSignal;
