//! Market data panel shared by every pipeline stage.

use crate::error::{DataError, Result};
use crate::factors::FactorSet;
use crate::series::AssetSeries;
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::{BTreeSet, HashMap};

/// Format of dates in CSV input.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Literal comparable with the `date` column of [`MarketData::to_frame`].
pub fn date_literal(date: NaiveDate) -> Expr {
    // chrono's date range keeps the day count well inside i32
    let days = date.signed_duration_since(NaiveDate::default()).num_days() as i32;
    lit(days).cast(DataType::Date)
}

/// Asset histories plus the factor return table.
///
/// Stages receive the panel by reference and never mutate it. The backtest
/// hands each rebalance a truncated copy from [`MarketData::as_of`] so no
/// stage can see returns after the decision date.
#[derive(Debug, Clone)]
pub struct MarketData {
    assets: Vec<AssetSeries>,
    factors: FactorSet,
    index: HashMap<String, usize>,
}

impl MarketData {
    /// Build a panel.
    ///
    /// # Errors
    /// Returns [`DataError::DuplicateSymbol`] if two series share a symbol.
    pub fn new(assets: Vec<AssetSeries>, factors: FactorSet) -> Result<Self> {
        let mut index = HashMap::with_capacity(assets.len());
        for (i, asset) in assets.iter().enumerate() {
            if index.insert(asset.symbol().to_string(), i).is_some() {
                return Err(DataError::DuplicateSymbol(asset.symbol().to_string()));
            }
        }
        Ok(Self {
            assets,
            factors,
            index,
        })
    }

    /// Asset histories in load order.
    pub fn assets(&self) -> &[AssetSeries] {
        &self.assets
    }

    /// Factor return table.
    pub const fn factors(&self) -> &FactorSet {
        &self.factors
    }

    /// Symbols in load order.
    pub fn symbols(&self) -> Vec<String> {
        self.assets.iter().map(|a| a.symbol().to_string()).collect()
    }

    /// Look up one asset.
    pub fn asset(&self, symbol: &str) -> Option<&AssetSeries> {
        self.index.get(symbol).map(|&i| &self.assets[i])
    }

    /// Return of `symbol` realized on `date`.
    pub fn asset_return(&self, symbol: &str, date: NaiveDate) -> Option<f64> {
        self.asset(symbol).and_then(|a| a.return_on(date))
    }

    /// Whether `name` is a factor column or an asset symbol.
    pub fn has_series(&self, name: &str) -> bool {
        self.factors.factor_index(name).is_some() || self.index.contains_key(name)
    }

    /// Return of the series `name` on `date`: the factor column of that
    /// name if there is one, otherwise the asset with that symbol.
    pub fn series_return(&self, name: &str, date: NaiveDate) -> Option<f64> {
        match self.factors.factor_index(name) {
            Some(f) => self
                .factors
                .date_index(date)
                .map(|t| self.factors.returns()[[t, f]]),
            None => self.asset_return(name, date),
        }
    }

    /// Sorted union of every asset's observation dates.
    pub fn trading_dates(&self) -> Vec<NaiveDate> {
        self.assets
            .iter()
            .flat_map(AssetSeries::dates)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Copy of the panel holding only data on or before `date`.
    pub fn as_of(&self, date: NaiveDate) -> Self {
        Self {
            assets: self.assets.iter().map(|a| a.as_of(date)).collect(),
            factors: self.factors.as_of(date),
            index: self.index.clone(),
        }
    }

    /// Long-format frame with one row per (symbol, date).
    ///
    /// Columns: `symbol`, `date` (polars `Date`), `price`, `returns`,
    /// `market_cap`, `earnings`, `dividends`, `volume`. Missing values are
    /// null.
    ///
    /// # Errors
    /// Returns an error if the frame cannot be assembled.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let rows: usize = self.assets.iter().map(AssetSeries::len).sum();

        let mut symbols = Vec::with_capacity(rows);
        let mut dates = Vec::with_capacity(rows);
        let mut prices = Vec::with_capacity(rows);
        let mut returns = Vec::with_capacity(rows);
        let mut market_caps = Vec::with_capacity(rows);
        let mut earnings = Vec::with_capacity(rows);
        let mut dividends = Vec::with_capacity(rows);
        let mut volumes = Vec::with_capacity(rows);

        for asset in &self.assets {
            for (obs, ret) in asset.observations().iter().zip(asset.returns()) {
                symbols.push(asset.symbol().to_string());
                dates.push(obs.date.format(DATE_FORMAT).to_string());
                prices.push(obs.price);
                returns.push(*ret);
                market_caps.push(obs.market_cap);
                earnings.push(obs.earnings);
                dividends.push(obs.dividends);
                volumes.push(obs.volume);
            }
        }

        let df = DataFrame::new(vec![
            Series::new("symbol".into(), symbols).into(),
            Series::new("date".into(), dates).into(),
            Series::new("price".into(), prices).into(),
            Series::new("returns".into(), returns).into(),
            Series::new("market_cap".into(), market_caps).into(),
            Series::new("earnings".into(), earnings).into(),
            Series::new("dividends".into(), dividends).into(),
            Series::new("volume".into(), volumes).into(),
        ])?
        .lazy()
        .with_column(col("date").cast(DataType::Date))
        .collect()?;

        Ok(df)
    }
}
