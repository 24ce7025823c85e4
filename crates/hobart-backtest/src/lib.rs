#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod error;
pub mod state;
pub mod strategy;
pub mod summary;

pub use config::BacktestConfig;
pub use engine::{BacktestEngine, BacktestReport, RunOutcome, turnover_between};
pub use error::{BacktestError, RebalanceError, Result};
pub use state::{BacktestState, Phase, Snapshot};
pub use strategy::{Positions, Strategy, StrategyError, StrategyOutput};
pub use summary::{
    PerformanceSeries, PerformanceSummary, TRADING_DAYS_PER_YEAR, performance_series,
    rolling_window, summarize,
};
