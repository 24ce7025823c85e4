#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod covariance;
pub mod model;
pub mod regression;
pub mod specific_risk;

// Re-export main types
pub use covariance::{
    CovarianceError, CovarianceEstimator, CovarianceMethod, EwmaCovarianceEstimator,
    SampleCovarianceEstimator,
};
pub use model::{AssetFailure, RiskModel, RiskModelConfig, RiskModelError, RiskModelResult};
pub use regression::{RegressionError, RegressionFit, weighted_least_squares};
pub use specific_risk::{SpecificRiskConfig, SpecificRiskError, SpecificRiskEstimator};
