//! Value Signal
//!
//! Composite of earnings yield (earnings / price) and dividend yield
//! (dividends / price), each standardized by date before averaging. A
//! component that is missing for an asset counts as a neutral zero.

use crate::traits::{Signal, SignalError};
use crate::utils::center_xsection;
use polars::prelude::*;

/// Earnings and dividend yield composite
#[derive(Debug, Default)]
pub struct ValueSignal;

impl Signal for ValueSignal {
    fn name(&self) -> &str {
        "value"
    }

    fn compute_scores(&self, data: LazyFrame) -> Result<LazyFrame, SignalError> {
        let result = data
            .filter(col("price").gt(lit(0.0)))
            .with_columns([
                (col("earnings") / col("price")).alias("earnings_yield"),
                (col("dividends") / col("price")).alias("dividend_yield"),
            ])
            .with_columns([
                center_xsection("earnings_yield", true).alias("ey_score"),
                center_xsection("dividend_yield", true).alias("dy_score"),
            ])
            .with_columns([((col("ey_score").fill_null(lit(0.0))
                + col("dy_score").fill_null(lit(0.0)))
                / lit(2.0))
            .alias("value_score")])
            .select([col("symbol"), col("date"), col("value_score")]);

        Ok(result)
    }

    fn required_columns(&self) -> &[&str] {
        &["symbol", "date", "price", "earnings", "dividends"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cheap_stock_scores_higher() {
        let df = df![
            "symbol" => ["A", "B"],
            "date" => ["2024-01-02", "2024-01-02"],
            "price" => [10.0, 10.0],
            "earnings" => [Some(2.0), Some(0.5)],
            "dividends" => [None::<f64>, None],
        ]
        .unwrap();

        let scores = ValueSignal.compute_scores(df.lazy()).unwrap().collect().unwrap();
        let values = scores.column("value_score").unwrap().f64().unwrap();
        assert!(values.get(0).unwrap() > values.get(1).unwrap());
    }
}
