#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod factors;
pub mod loader;
pub mod panel;
pub mod series;

pub use error::{DataError, Result};
pub use factors::FactorSet;
pub use loader::{load_market_data, read_factors, read_prices};
pub use panel::{DATE_FORMAT, MarketData, date_literal};
pub use series::{AssetSeries, Observation};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
