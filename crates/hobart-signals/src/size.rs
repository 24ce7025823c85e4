//! Size Signal
//!
//! Negative log market capitalization, so smaller companies score higher.

use crate::traits::{Signal, SignalError};
use crate::utils::{center_xsection, map_f64};
use polars::prelude::*;

/// Size scored as `-ln(market_cap)`, standardized by date
#[derive(Debug, Default)]
pub struct SizeSignal;

impl Signal for SizeSignal {
    fn name(&self) -> &str {
        "size"
    }

    fn compute_scores(&self, data: LazyFrame) -> Result<LazyFrame, SignalError> {
        let result = data
            .filter(col("market_cap").gt(lit(0.0)))
            .with_columns([map_f64(col("market_cap"), |v| -v.ln()).alias("raw_size")])
            .with_columns([center_xsection("raw_size", true).alias("size_score")])
            .select([col("symbol"), col("date"), col("size_score")]);

        Ok(result)
    }

    fn required_columns(&self) -> &[&str] {
        &["symbol", "date", "market_cap"]
    }
}
