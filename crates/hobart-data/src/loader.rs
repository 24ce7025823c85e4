//! CSV loading for price and factor history.
//!
//! Two layouts are accepted:
//!
//! * prices, long format: `date,symbol,price,market_cap[,earnings,dividends,volume]`
//! * factors, wide format: `date,<factor_1>,...,<factor_F>`; column order
//!   defines factor order.
//!
//! Dates are ISO-8601 (`YYYY-MM-DD`).

use crate::error::{DataError, Result};
use crate::factors::FactorSet;
use crate::panel::{DATE_FORMAT, MarketData};
use crate::series::{AssetSeries, Observation};
use chrono::NaiveDate;
use ndarray::Array2;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct PriceRecord {
    date: NaiveDate,
    symbol: String,
    price: f64,
    market_cap: f64,
    #[serde(default)]
    earnings: Option<f64>,
    #[serde(default)]
    dividends: Option<f64>,
    #[serde(default)]
    volume: Option<f64>,
}

/// Read long-format price history.
///
/// Series are returned sorted by symbol.
///
/// # Errors
/// Returns an error on malformed rows or duplicate (symbol, date) pairs.
pub fn read_prices<R: Read>(reader: R) -> Result<Vec<AssetSeries>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut grouped: BTreeMap<String, Vec<Observation>> = BTreeMap::new();
    for record in rdr.deserialize() {
        let record: PriceRecord = record?;
        grouped.entry(record.symbol).or_default().push(
            Observation::new(record.date, record.price, record.market_cap).with_fundamentals(
                record.earnings,
                record.dividends,
                record.volume,
            ),
        );
    }

    grouped
        .into_iter()
        .map(|(symbol, observations)| AssetSeries::new(symbol, observations))
        .collect()
}

/// Read wide-format factor returns.
///
/// # Errors
/// Returns an error if the header lacks factor columns, a value is not a
/// number, or the resulting table is misaligned.
pub fn read_factors<R: Read>(reader: R) -> Result<FactorSet> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    if headers.len() < 2 {
        return Err(DataError::Parse(
            "factor file needs a date column and at least one factor".to_string(),
        ));
    }
    let names: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let mut dates = Vec::new();
    let mut values = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let raw_date = record.get(0).unwrap_or_default();
        let date = NaiveDate::parse_from_str(raw_date, DATE_FORMAT)
            .map_err(|e| DataError::Parse(format!("bad factor date {raw_date:?}: {e}")))?;
        dates.push(date);

        for (i, field) in record.iter().skip(1).enumerate() {
            let value = field.parse::<f64>().map_err(|e| {
                DataError::Parse(format!("bad value {field:?} for {} on {date}: {e}", names[i]))
            })?;
            values.push(value);
        }
    }

    let returns = Array2::from_shape_vec((dates.len(), names.len()), values)
        .map_err(|e| DataError::Parse(format!("ragged factor file: {e}")))?;

    FactorSet::new(names, dates, returns)
}

/// Load both files and assemble a panel.
///
/// # Errors
/// Propagates IO, parse and alignment failures.
pub fn load_market_data(prices: &Path, factors: &Path) -> Result<MarketData> {
    let assets = read_prices(std::fs::File::open(prices)?)?;
    let factors = read_factors(std::fs::File::open(factors)?)?;
    tracing::info!(
        assets = assets.len(),
        factors = factors.n_factors(),
        periods = factors.n_periods(),
        "loaded market data"
    );
    MarketData::new(assets, factors)
}
