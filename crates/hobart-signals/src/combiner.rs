//! Alpha synthesis from weighted signals.
//!
//! Each signal is evaluated over the full visible history, sliced at the
//! decision date and summed with its weight. Assets without a score for a
//! signal contribute zero for that signal rather than being dropped. The
//! sum is optionally winsorized and then centered across assets.

use crate::traits::{Signal, SignalError};
use crate::utils::{center, winsorize};
use chrono::NaiveDate;
use hobart_data::{MarketData, date_literal};
use ndarray::Array1;
use polars::prelude::*;
use std::collections::HashMap;

/// Centered alpha scores for one date.
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaScores {
    /// Decision date.
    pub date: NaiveDate,
    /// Symbols, aligned with `scores`.
    pub symbols: Vec<String>,
    /// Scores, mean zero across finite entries.
    pub scores: Array1<f64>,
}

impl AlphaScores {
    /// Score for one symbol.
    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.symbols
            .iter()
            .position(|s| s == symbol)
            .map(|i| self.scores[i])
    }

    /// Number of scored assets.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether no asset was scored.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Weighted combination of signals.
#[derive(Debug, Default)]
pub struct SignalCombiner {
    components: Vec<(Box<dyn Signal>, f64)>,
    winsorize: Option<f64>,
}

impl SignalCombiner {
    /// Empty combiner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a signal with a weight.
    pub fn with_signal(mut self, signal: Box<dyn Signal>, weight: f64) -> Self {
        self.components.push((signal, weight));
        self
    }

    /// Winsorize the combined score at a symmetric percentile.
    ///
    /// # Errors
    /// Returns [`SignalError::InvalidParameter`] if `percentile` is outside
    /// `[0, 0.5]`.
    pub fn with_winsorize(mut self, percentile: f64) -> Result<Self, SignalError> {
        if !(0.0..=0.5).contains(&percentile) {
            return Err(SignalError::InvalidParameter(format!(
                "winsorize percentile must be between 0 and 0.5, got {percentile}"
            )));
        }
        self.winsorize = Some(percentile);
        Ok(self)
    }

    /// Names and weights of the configured signals.
    pub fn components(&self) -> impl Iterator<Item = (&str, f64)> {
        self.components.iter().map(|(s, w)| (s.name(), *w))
    }

    /// Combine signals for every asset in `data` at `date`.
    ///
    /// # Errors
    /// Fails if no signal is configured, the frame lacks a required column,
    /// or polars evaluation fails.
    pub fn combine(&self, data: &MarketData, date: NaiveDate) -> Result<AlphaScores, SignalError> {
        let symbols: Vec<String> = data
            .assets()
            .iter()
            .filter(|a| a.latest_as_of(date).is_some())
            .map(|a| a.symbol().to_string())
            .collect();
        let frame = data.to_frame()?;
        self.combine_frame(&frame, &symbols, date)
    }

    /// Combine signals computed on an already-built frame.
    ///
    /// # Errors
    /// See [`SignalCombiner::combine`].
    pub fn combine_frame(
        &self,
        frame: &DataFrame,
        symbols: &[String],
        date: NaiveDate,
    ) -> Result<AlphaScores, SignalError> {
        if self.components.is_empty() {
            return Err(SignalError::InvalidParameter(
                "no signals configured".to_string(),
            ));
        }

        let mut combined = Array1::<f64>::zeros(symbols.len());
        for (signal, weight) in &self.components {
            let scores = evaluate_on(signal.as_ref(), frame, date)?;
            tracing::debug!(
                signal = signal.name(),
                scored = scores.len(),
                %date,
                "evaluated signal"
            );
            for (i, symbol) in symbols.iter().enumerate() {
                combined[i] += weight * scores.get(symbol).copied().unwrap_or(0.0);
            }
        }

        if let Some(p) = self.winsorize {
            combined = winsorize(&combined, p)?;
        }

        Ok(AlphaScores {
            date,
            symbols: symbols.to_vec(),
            scores: center(&combined),
        })
    }
}

/// Finite scores of one signal on `date`, keyed by symbol.
fn evaluate_on(
    signal: &dyn Signal,
    frame: &DataFrame,
    date: NaiveDate,
) -> Result<HashMap<String, f64>, SignalError> {
    let names = frame.get_column_names();
    for required in signal.required_columns() {
        if !names.iter().any(|n| n.as_str() == *required) {
            return Err(SignalError::MissingColumn {
                signal: signal.name().to_string(),
                column: (*required).to_string(),
            });
        }
    }

    let score_column = signal.score_column();
    let sliced = signal
        .compute_scores(frame.clone().lazy())?
        .filter(col("date").eq(date_literal(date)))
        .collect()?;

    let symbols = sliced.column("symbol")?.str()?;
    let scores = sliced.column(&score_column)?.f64()?;

    Ok(symbols
        .into_iter()
        .zip(scores)
        .filter_map(|(symbol, score)| match (symbol, score) {
            (Some(symbol), Some(score)) if score.is_finite() => Some((symbol.to_string(), score)),
            _ => None,
        })
        .collect())
}
