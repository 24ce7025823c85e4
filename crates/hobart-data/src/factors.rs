//! Factor return history.

use crate::error::{DataError, Result};
use chrono::NaiveDate;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis, s};

/// Ordered set of named factors with a time-aligned return matrix.
///
/// Factor order is fixed at construction. Every consumer (risk model
/// exposures, covariance, optimizer constraints, attribution) indexes
/// factors by the position in [`FactorSet::names`].
#[derive(Debug, Clone, PartialEq)]
pub struct FactorSet {
    names: Vec<String>,
    dates: Vec<NaiveDate>,
    /// T x F matrix of factor returns.
    returns: Array2<f64>,
}

impl FactorSet {
    /// Create a factor set.
    ///
    /// # Errors
    /// Returns [`DataError::Alignment`] if the matrix shape does not match the
    /// names and dates, if dates are not strictly increasing, if a name is
    /// repeated, or if a return is not finite.
    pub fn new(names: Vec<String>, dates: Vec<NaiveDate>, returns: Array2<f64>) -> Result<Self> {
        let (rows, cols) = returns.dim();
        if rows != dates.len() || cols != names.len() {
            return Err(DataError::Alignment(format!(
                "factor matrix is {}x{} but there are {} dates and {} factors",
                rows,
                cols,
                dates.len(),
                names.len()
            )));
        }
        if let Some(w) = dates.windows(2).find(|w| w[0] >= w[1]) {
            return Err(DataError::Alignment(format!(
                "factor dates must be strictly increasing ({} then {})",
                w[0], w[1]
            )));
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(DataError::Alignment(format!("duplicate factor name {name}")));
            }
        }
        if let Some(((t, f), _)) = returns.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(DataError::Alignment(format!(
                "non-finite return for factor {} on {}",
                names[f], dates[t]
            )));
        }

        Ok(Self {
            names,
            dates,
            returns,
        })
    }

    /// Factor names in model order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Dates in ascending order.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Full T x F return matrix.
    pub const fn returns(&self) -> &Array2<f64> {
        &self.returns
    }

    /// Number of factors.
    pub fn n_factors(&self) -> usize {
        self.names.len()
    }

    /// Number of dates.
    pub fn n_periods(&self) -> usize {
        self.dates.len()
    }

    /// Position of a factor by name.
    pub fn factor_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Row index of `date`.
    pub fn date_index(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    /// Factor returns on `date`.
    pub fn returns_on(&self, date: NaiveDate) -> Option<ArrayView1<'_, f64>> {
        self.date_index(date).map(|t| self.returns.row(t))
    }

    /// Return series for one factor.
    pub fn factor_returns(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.factor_index(name).map(|f| self.returns.column(f))
    }

    /// Copy truncated to dates on or before `date`.
    pub fn as_of(&self, date: NaiveDate) -> Self {
        let end = self.dates.partition_point(|d| *d <= date);
        Self {
            names: self.names.clone(),
            dates: self.dates[..end].to_vec(),
            returns: self.returns.slice(s![..end, ..]).to_owned(),
        }
    }

    /// The trailing `window` dates ending at the last date, or every date
    /// when `window` is `None`.
    pub fn trailing(&self, window: Option<usize>) -> (&[NaiveDate], ArrayView2<'_, f64>) {
        let start = window.map_or(0, |w| self.dates.len().saturating_sub(w));
        (
            &self.dates[start..],
            self.returns.slice(s![start.., ..]),
        )
    }

    /// Dates strictly after `after` and on or before `until` (all remaining
    /// dates when `until` is `None`), with their returns.
    pub fn between(
        &self,
        after: NaiveDate,
        until: Option<NaiveDate>,
    ) -> (&[NaiveDate], ArrayView2<'_, f64>) {
        let start = self.dates.partition_point(|d| *d <= after);
        let end = until.map_or(self.dates.len(), |u| self.dates.partition_point(|d| *d <= u));
        let end = end.max(start);
        (
            &self.dates[start..end],
            self.returns.slice(s![start..end, ..]),
        )
    }

    /// Select rows for the given dates, in the given order.
    ///
    /// # Errors
    /// Returns [`DataError::Alignment`] if a date has no factor row.
    pub fn rows_for(&self, dates: &[NaiveDate]) -> Result<Array2<f64>> {
        let indices = dates
            .iter()
            .map(|d| {
                self.date_index(*d).ok_or_else(|| {
                    DataError::Alignment(format!("no factor returns on {d}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self.returns.select(Axis(0), &indices))
    }
}
