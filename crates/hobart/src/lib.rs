#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod pipeline;

// Re-export the stage crates
pub use hobart_backtest as backtest;
pub use hobart_data as data;
pub use hobart_optimizer as optimizer;
pub use hobart_output as output;
pub use hobart_risk as risk;
pub use hobart_signals as signals;

pub use config::{ConfigError, ConstructionMethod, PipelineConfig, SignalWeight};
pub use error::{PipelineError, Result};
pub use pipeline::{Construction, Pipeline, PipelineStrategy};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
