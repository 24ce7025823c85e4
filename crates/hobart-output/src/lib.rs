#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod attribution;
pub mod export;
pub mod report;
pub mod summary;

pub use attribution::{
    AttributionEngine, AttributionError, AttributionResult, AttributionRow, FactorAttribution,
    SPECIFIC_LEG, TOTAL_LEG, compound,
};
pub use export::{
    ExportError, ExportFormat, Exporter, HistoryRecord, PositionRecord, history_records,
    position_records,
};
pub use report::{Report, ReportBuilder, ReportError};
pub use summary::TextTable;
