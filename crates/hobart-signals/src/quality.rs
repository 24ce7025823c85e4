//! Quality Signal
//!
//! Liquid, stable names score higher: daily share turnover minus the
//! asset's return volatility over the visible history.
//!
//! Turnover is `volume / shares_outstanding`, with shares outstanding
//! recovered as `market_cap / price`.

use crate::traits::{Signal, SignalError};
use crate::utils::center_xsection;
use polars::prelude::*;

/// Turnover minus volatility, standardized by date
#[derive(Debug, Default)]
pub struct QualitySignal;

impl Signal for QualitySignal {
    fn name(&self) -> &str {
        "quality"
    }

    fn compute_scores(&self, data: LazyFrame) -> Result<LazyFrame, SignalError> {
        let result = data
            .filter(col("market_cap").gt(lit(0.0)))
            .with_columns([
                (col("volume") * col("price") / col("market_cap")).alias("turnover"),
                col("returns")
                    .std(1)
                    .over([col("symbol")])
                    .alias("volatility"),
            ])
            .with_columns([(col("turnover") - col("volatility")).alias("raw_quality")])
            .with_columns([center_xsection("raw_quality", true).alias("quality_score")])
            .select([col("symbol"), col("date"), col("quality_score")]);

        Ok(result)
    }

    fn required_columns(&self) -> &[&str] {
        &["symbol", "date", "price", "returns", "market_cap", "volume"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_name() {
        assert_eq!(QualitySignal.name(), "quality");
        assert_eq!(QualitySignal.required_columns().len(), 6);
    }

    #[test]
    fn test_stable_liquid_scores_higher() {
        let df = df![
            "symbol" => ["A", "A", "A", "B", "B", "B"],
            "date" => ["d1", "d2", "d3", "d1", "d2", "d3"],
            "price" => [10.0, 10.0, 10.0, 10.0, 10.0, 10.0],
            "returns" => [None, Some(0.001), Some(-0.001), None, Some(0.05), Some(-0.05)],
            "market_cap" => [1000.0, 1000.0, 1000.0, 1000.0, 1000.0, 1000.0],
            "volume" => [10.0, 10.0, 10.0, 1.0, 1.0, 1.0],
        ]
        .unwrap();

        let scores = QualitySignal
            .compute_scores(df.lazy())
            .unwrap()
            .filter(col("date").eq(lit("d3")))
            .collect()
            .unwrap();
        let symbols = scores.column("symbol").unwrap().str().unwrap();
        let values = scores.column("quality_score").unwrap().f64().unwrap();
        let a = symbols.into_iter().position(|s| s == Some("A")).unwrap();
        let b = 1 - a;
        assert!(values.get(a).unwrap() > values.get(b).unwrap());
    }
}
