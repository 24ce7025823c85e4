//! Per-asset price and fundamental history.
//!
//! An [`AssetSeries`] holds the observations for one ticker sorted by date.
//! Returns are derived from consecutive valid prices when the series is
//! built: an observation with a non-finite or non-positive price is dropped
//! before returns are computed, so `return[t] = price[t] / price[t-1] - 1`
//! always refers to two real prices and never to a filled value.

use crate::error::{DataError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single dated observation for one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Observation date.
    pub date: NaiveDate,
    /// Closing price.
    pub price: f64,
    /// Market capitalization in currency units.
    pub market_cap: f64,
    /// Earnings per share, if reported.
    pub earnings: Option<f64>,
    /// Dividends per share, if reported.
    pub dividends: Option<f64>,
    /// Traded volume in shares, if reported.
    pub volume: Option<f64>,
}

impl Observation {
    /// Create an observation carrying only price and market cap.
    pub const fn new(date: NaiveDate, price: f64, market_cap: f64) -> Self {
        Self {
            date,
            price,
            market_cap,
            earnings: None,
            dividends: None,
            volume: None,
        }
    }

    /// Attach fundamentals to the observation.
    pub const fn with_fundamentals(
        mut self,
        earnings: Option<f64>,
        dividends: Option<f64>,
        volume: Option<f64>,
    ) -> Self {
        self.earnings = earnings;
        self.dividends = dividends;
        self.volume = volume;
        self
    }

    fn has_valid_price(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }
}

/// Aligned history for one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSeries {
    symbol: String,
    observations: Vec<Observation>,
    returns: Vec<Option<f64>>,
}

impl AssetSeries {
    /// Build a series from raw observations.
    ///
    /// Observations are sorted by date. Rows with an unusable price are
    /// dropped. Two rows on the same date are rejected.
    ///
    /// # Errors
    /// Returns [`DataError::Parse`] on duplicate dates.
    pub fn new(symbol: impl Into<String>, mut observations: Vec<Observation>) -> Result<Self> {
        let symbol = symbol.into();
        observations.sort_by_key(|o| o.date);

        if let Some(pair) = observations.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(DataError::Parse(format!(
                "duplicate observation for {} on {}",
                symbol, pair[0].date
            )));
        }

        let before = observations.len();
        observations.retain(Observation::has_valid_price);
        let dropped = before - observations.len();
        if dropped > 0 {
            tracing::debug!(symbol = %symbol, dropped, "dropped observations with invalid prices");
        }

        let returns = Self::compute_returns(&observations);

        Ok(Self {
            symbol,
            observations,
            returns,
        })
    }

    fn compute_returns(observations: &[Observation]) -> Vec<Option<f64>> {
        let mut returns = Vec::with_capacity(observations.len());
        returns.push(None);
        returns.extend(
            observations
                .windows(2)
                .map(|w| Some(w[1].price / w[0].price - 1.0)),
        );
        returns.truncate(observations.len());
        returns
    }

    /// Ticker symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Observations sorted by date.
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the series has no observations.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Observation dates in order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.observations.iter().map(|o| o.date)
    }

    /// First observation date.
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.date)
    }

    /// Last observation date.
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }

    /// Return series aligned with [`Self::observations`]; the first entry is
    /// always `None`.
    pub fn returns(&self) -> &[Option<f64>] {
        &self.returns
    }

    /// Dated returns, skipping the first observation.
    pub fn dated_returns(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.observations
            .iter()
            .zip(&self.returns)
            .filter_map(|(o, r)| r.map(|r| (o.date, r)))
    }

    fn position(&self, date: NaiveDate) -> Option<usize> {
        self.observations
            .binary_search_by_key(&date, |o| o.date)
            .ok()
    }

    /// Observation on `date`, if any.
    pub fn observation_on(&self, date: NaiveDate) -> Option<&Observation> {
        self.position(date).map(|i| &self.observations[i])
    }

    /// Return realized on `date`, if both `date` and the prior observation
    /// exist.
    pub fn return_on(&self, date: NaiveDate) -> Option<f64> {
        self.position(date).and_then(|i| self.returns[i])
    }

    /// Market cap on `date`, if observed.
    pub fn market_cap_on(&self, date: NaiveDate) -> Option<f64> {
        self.observation_on(date).map(|o| o.market_cap)
    }

    /// Latest observation on or before `date`.
    pub fn latest_as_of(&self, date: NaiveDate) -> Option<&Observation> {
        let end = self.observations.partition_point(|o| o.date <= date);
        end.checked_sub(1).map(|i| &self.observations[i])
    }

    /// Copy of the series truncated to observations on or before `date`.
    pub fn as_of(&self, date: NaiveDate) -> Self {
        let end = self.observations.partition_point(|o| o.date <= date);
        Self {
            symbol: self.symbol.clone(),
            observations: self.observations[..end].to_vec(),
            returns: self.returns[..end].to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn test_returns_from_consecutive_prices() {
        let series = AssetSeries::new(
            "AAA",
            vec![
                Observation::new(d(3), 110.0, 1e9),
                Observation::new(d(2), 100.0, 1e9),
                Observation::new(d(4), 99.0, 1e9),
            ],
        )
        .unwrap();

        assert_eq!(series.returns()[0], None);
        assert_relative_eq!(series.return_on(d(3)).unwrap(), 0.10, epsilon = 1e-12);
        assert_relative_eq!(series.return_on(d(4)).unwrap(), -0.10, epsilon = 1e-12);
        assert_eq!(series.return_on(d(2)), None);
    }

    #[test]
    fn test_invalid_price_dropped_not_filled() {
        let series = AssetSeries::new(
            "AAA",
            vec![
                Observation::new(d(2), 100.0, 1e9),
                Observation::new(d(3), f64::NAN, 1e9),
                Observation::new(d(4), 120.0, 1e9),
            ],
        )
        .unwrap();

        assert_eq!(series.len(), 2);
        assert!(series.observation_on(d(3)).is_none());
        // Return on the 4th spans the dropped row.
        assert_relative_eq!(series.return_on(d(4)).unwrap(), 0.20, epsilon = 1e-12);
    }

    #[test]
    fn test_duplicate_dates_rejected() {
        let result = AssetSeries::new(
            "AAA",
            vec![
                Observation::new(d(2), 100.0, 1e9),
                Observation::new(d(2), 101.0, 1e9),
            ],
        );
        assert!(matches!(result, Err(DataError::Parse(_))));
    }

    #[test]
    fn test_as_of_truncates() {
        let series = AssetSeries::new(
            "AAA",
            (2..=6)
                .map(|day| Observation::new(d(day), 100.0 + day as f64, 1e9))
                .collect(),
        )
        .unwrap();

        let truncated = series.as_of(d(4));
        assert_eq!(truncated.len(), 3);
        assert_eq!(truncated.last_date(), Some(d(4)));
        assert_eq!(truncated.returns().len(), 3);
        assert_eq!(series.latest_as_of(d(10)).map(|o| o.date), Some(d(6)));
        assert!(series.latest_as_of(d(1)).is_none());
    }
}
