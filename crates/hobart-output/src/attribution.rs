//! Factor attribution of portfolio returns.
//!
//! Positions are normalized to weights by their gross value. The portfolio's
//! factor exposure `Xᵀw` is held fixed over the attribution window, so each
//! factor contributes `exposure_f · r_f(t)` on each date and the specific leg
//! contributes `w · s(t)`.

use chrono::NaiveDate;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur during attribution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributionError {
    /// Input shapes disagree.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Every position is zero, so weights are undefined.
    #[error("Positions have zero gross value")]
    ZeroGross,
}

/// Result type for attribution.
pub type Result<T> = std::result::Result<T, AttributionError>;

/// Leg name used for the idiosyncratic contribution.
pub const SPECIFIC_LEG: &str = "specific";

/// Leg name used for the total contribution.
pub const TOTAL_LEG: &str = "total";

/// Attribution of one factor over the whole window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactorAttribution {
    /// Factor name.
    pub factor: String,

    /// Portfolio exposure to the factor.
    pub exposure: f64,

    /// Compounded factor return over the window.
    pub factor_return: f64,

    /// Sum of the per-date contributions.
    pub contribution: f64,

    /// Compounded per-date contributions.
    pub cumulative_contribution: f64,

    /// Share of the total contribution, as a fraction.
    pub pct_of_total: f64,
}

impl fmt::Display for FactorAttribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:.2}% (exposure: {:.3}, return: {:.2}%)",
            self.factor,
            self.contribution * 100.0,
            self.exposure,
            self.factor_return * 100.0
        )
    }
}

/// One dated contribution of one leg, in long format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttributionRow {
    /// Date of the return.
    pub date: NaiveDate,

    /// Factor name, [`SPECIFIC_LEG`] or [`TOTAL_LEG`].
    pub leg: String,

    /// Contribution on this date.
    pub contribution: f64,

    /// Compounded contribution through this date.
    pub cumulative: f64,
}

/// Per-factor and specific decomposition of portfolio returns.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributionResult {
    /// Dates of the return rows.
    pub dates: Vec<NaiveDate>,

    /// Factor names, in column order.
    pub factor_names: Vec<String>,

    /// Portfolio weights `position / Σ|position|`.
    pub weights: Array1<f64>,

    /// Portfolio factor exposures `Xᵀw`.
    pub portfolio_exposures: Array1<f64>,

    /// Compounded return of each factor over the window.
    pub factor_returns: Array1<f64>,

    /// T x F contribution of each factor on each date.
    pub factor_contributions: Array2<f64>,

    /// Specific contribution on each date.
    pub specific_contributions: Array1<f64>,

    /// Factor plus specific contribution on each date.
    pub total_contributions: Array1<f64>,

    /// Each factor's share of the summed total contribution.
    pub factor_pct: Array1<f64>,

    /// The specific leg's share of the summed total contribution.
    pub specific_pct: f64,

    /// T x F compounded factor contributions.
    pub cumulative_factor: Array2<f64>,

    /// Compounded specific contributions.
    pub cumulative_specific: Array1<f64>,

    /// Compounded total contributions.
    pub cumulative_total: Array1<f64>,
}

/// `cumprod(1 + r) − 1`
pub fn compound(returns: ArrayView1<'_, f64>) -> Array1<f64> {
    let mut growth = 1.0;
    returns
        .iter()
        .map(|r| {
            growth *= 1.0 + r;
            growth - 1.0
        })
        .collect()
}

fn share(part: f64, total: f64) -> f64 {
    if total.abs() > 1e-12 { part / total } else { 0.0 }
}

impl AttributionResult {
    /// Summed total contribution.
    pub fn total_return(&self) -> f64 {
        self.total_contributions.sum()
    }

    /// Summed factor contribution across all factors.
    pub fn factor_return(&self) -> f64 {
        self.factor_contributions.sum()
    }

    /// Summed specific contribution.
    pub fn specific_return(&self) -> f64 {
        self.specific_contributions.sum()
    }

    /// Compounded total contribution at the end of the window.
    pub fn cumulative_return(&self) -> f64 {
        self.cumulative_total.last().copied().unwrap_or(0.0)
    }

    /// One summary line per factor.
    pub fn factors(&self) -> Vec<FactorAttribution> {
        let n_dates = self.dates.len();
        self.factor_names
            .iter()
            .enumerate()
            .map(|(j, name)| FactorAttribution {
                factor: name.clone(),
                exposure: self.portfolio_exposures[j],
                factor_return: self.factor_returns[j],
                contribution: self.factor_contributions.column(j).sum(),
                cumulative_contribution: if n_dates > 0 {
                    self.cumulative_factor[[n_dates - 1, j]]
                } else {
                    0.0
                },
                pct_of_total: self.factor_pct[j],
            })
            .collect()
    }

    /// Summary line for one factor.
    pub fn factor(&self, name: &str) -> Option<FactorAttribution> {
        self.factors().into_iter().find(|f| f.factor == name)
    }

    /// Every leg on every date, factors first, then specific and total.
    pub fn rows(&self) -> Vec<AttributionRow> {
        let mut rows = Vec::with_capacity(self.dates.len() * (self.factor_names.len() + 2));
        for (t, &date) in self.dates.iter().enumerate() {
            for (j, name) in self.factor_names.iter().enumerate() {
                rows.push(AttributionRow {
                    date,
                    leg: name.clone(),
                    contribution: self.factor_contributions[[t, j]],
                    cumulative: self.cumulative_factor[[t, j]],
                });
            }
            rows.push(AttributionRow {
                date,
                leg: SPECIFIC_LEG.to_string(),
                contribution: self.specific_contributions[t],
                cumulative: self.cumulative_specific[t],
            });
            rows.push(AttributionRow {
                date,
                leg: TOTAL_LEG.to_string(),
                contribution: self.total_contributions[t],
                cumulative: self.cumulative_total[t],
            });
        }
        rows
    }

    fn period(&self) -> String {
        match (self.dates.first(), self.dates.last()) {
            (Some(first), Some(last)) => format!("{first} to {last}"),
            _ => "no returns".to_string(),
        }
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str("\nFactor Attribution\n");
        output.push_str(&format!("Period: {}\n", self.period()));
        output.push_str(&"=".repeat(80));
        output.push('\n');
        output.push_str(&format!(
            "{:<20} {:>12} {:>12} {:>12} {:>12}\n",
            "Factor", "Exposure", "Return", "Contribution", "% of Total"
        ));
        output.push_str(&"-".repeat(80));
        output.push('\n');

        for factor in self.factors() {
            output.push_str(&format!(
                "{:<20} {:>12.4} {:>11.2}% {:>11.2}% {:>11.2}%\n",
                factor.factor,
                factor.exposure,
                factor.factor_return * 100.0,
                factor.contribution * 100.0,
                factor.pct_of_total * 100.0
            ));
        }
        output.push_str(&format!(
            "{:<20} {:>12} {:>12} {:>11.2}% {:>11.2}%\n",
            "Specific",
            "",
            "",
            self.specific_return() * 100.0,
            self.specific_pct * 100.0
        ));

        output.push_str(&"-".repeat(80));
        output.push('\n');
        output.push_str(&format!(
            "{:<20} {:>12} {:>12} {:>11.2}%\n",
            "Total",
            "",
            "",
            self.total_return() * 100.0
        ));
        output.push_str(&format!(
            "{:<20} {:>12} {:>12} {:>11.2}%\n",
            "Compounded",
            "",
            "",
            self.cumulative_return() * 100.0
        ));
        output.push_str(&"=".repeat(80));
        output.push('\n');

        output
    }

    /// Format as Markdown table for documentation.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str("# Factor Attribution\n\n");
        output.push_str(&format!("**Period:** {}\n\n", self.period()));
        output.push_str("| Factor | Exposure | Return | Contribution | % of Total |\n");
        output.push_str("|--------|----------|--------|--------------|------------|\n");

        for factor in self.factors() {
            output.push_str(&format!(
                "| {} | {:.4} | {:.2}% | {:.2}% | {:.2}% |\n",
                factor.factor,
                factor.exposure,
                factor.factor_return * 100.0,
                factor.contribution * 100.0,
                factor.pct_of_total * 100.0
            ));
        }
        output.push_str(&format!(
            "| Specific | | | {:.2}% | {:.2}% |\n",
            self.specific_return() * 100.0,
            self.specific_pct * 100.0
        ));

        output.push_str("\n## Summary\n\n");
        output.push_str(&format!(
            "- **Factor Return:** {:.2}%\n",
            self.factor_return() * 100.0
        ));
        output.push_str(&format!(
            "- **Specific Return:** {:.2}%\n",
            self.specific_return() * 100.0
        ));
        output.push_str(&format!(
            "- **Total Return:** {:.2}%\n",
            self.total_return() * 100.0
        ));
        output.push_str(&format!(
            "- **Compounded Return:** {:.2}%\n",
            self.cumulative_return() * 100.0
        ));

        output
    }
}

impl fmt::Display for AttributionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Attribution ({}):", self.period())?;
        writeln!(f, "  Total Return: {:.2}%", self.total_return() * 100.0)?;
        writeln!(f, "  Factor Return: {:.2}%", self.factor_return() * 100.0)?;
        writeln!(f, "  Specific Return: {:.2}%", self.specific_return() * 100.0)?;
        writeln!(f, "  Factors:")?;
        for factor in self.factors() {
            writeln!(f, "    {factor}")?;
        }
        Ok(())
    }
}

/// Decomposes portfolio returns into factor and specific legs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributionEngine;

impl AttributionEngine {
    /// Create an engine.
    pub const fn new() -> Self {
        Self
    }

    /// Attribute the returns of fixed positions.
    ///
    /// `exposures` is N x F, `factor_returns` is T x F and
    /// `specific_returns` is T x N, with rows dated by `dates`.
    ///
    /// # Errors
    /// Returns [`AttributionError::DimensionMismatch`] if the shapes
    /// disagree and [`AttributionError::ZeroGross`] if every position is
    /// zero.
    pub fn attribute(
        &self,
        positions: ArrayView1<'_, f64>,
        exposures: ArrayView2<'_, f64>,
        factor_returns: ArrayView2<'_, f64>,
        specific_returns: ArrayView2<'_, f64>,
        factor_names: &[String],
        dates: &[NaiveDate],
    ) -> Result<AttributionResult> {
        let n = positions.len();
        let f = factor_names.len();
        let t = dates.len();
        if exposures.dim() != (n, f)
            || factor_returns.dim() != (t, f)
            || specific_returns.dim() != (t, n)
        {
            return Err(AttributionError::DimensionMismatch(format!(
                "{n} positions, {f} factors, {t} dates but exposures {:?}, factor returns {:?}, specific returns {:?}",
                exposures.dim(),
                factor_returns.dim(),
                specific_returns.dim()
            )));
        }

        let gross: f64 = positions.iter().map(|p| p.abs()).sum();
        if gross == 0.0 || !gross.is_finite() {
            return Err(AttributionError::ZeroGross);
        }
        let weights = positions.mapv(|p| p / gross);
        let portfolio_exposures = exposures.t().dot(&weights);

        let factor_contributions = &factor_returns * &portfolio_exposures;
        let specific_contributions = specific_returns.dot(&weights);
        let total_contributions = factor_contributions.sum_axis(Axis(1)) + &specific_contributions;

        let total = total_contributions.sum();
        let factor_pct = factor_contributions
            .sum_axis(Axis(0))
            .mapv(|c| share(c, total));
        let specific_pct = share(specific_contributions.sum(), total);

        let mut cumulative_factor = Array2::zeros((t, f));
        let mut factor_compounded = Array1::zeros(f);
        for j in 0..f {
            let column = compound(factor_contributions.column(j));
            cumulative_factor.column_mut(j).assign(&column);
            factor_compounded[j] = compound(factor_returns.column(j))
                .last()
                .copied()
                .unwrap_or(0.0);
        }
        let cumulative_specific = compound(specific_contributions.view());
        let cumulative_total = compound(total_contributions.view());

        tracing::debug!(
            dates = t,
            factors = f,
            total,
            specific_pct,
            "attributed portfolio returns"
        );

        Ok(AttributionResult {
            dates: dates.to_vec(),
            factor_names: factor_names.to_vec(),
            weights,
            portfolio_exposures,
            factor_returns: factor_compounded,
            factor_contributions,
            specific_contributions,
            total_contributions,
            factor_pct,
            specific_pct,
            cumulative_factor,
            cumulative_specific,
            cumulative_total,
        })
    }
}
