//! Closed-form position sizing
//!
//! The fallback construction path: size positions from alphas by a simple
//! rule, cap single positions, then hedge a single factor exposure back
//! toward its limit.

use crate::error::{OptimizerError, Result};
use derive_more::Display;
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Rule turning alphas into raw position signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingMethod {
    /// Raw signal = α
    #[display("proportional")]
    Proportional,
    /// Raw signal = α / σ_idio
    #[display("risk_parity")]
    RiskParity,
    /// Raw signal = α / (σ_idio² · risk_aversion)
    #[display("mean_variance")]
    MeanVariance,
}

impl SizingMethod {
    /// Every sizing method.
    pub const ALL: [Self; 3] = [Self::Proportional, Self::RiskParity, Self::MeanVariance];
}

impl FromStr for SizingMethod {
    type Err = OptimizerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.to_string() == s)
            .ok_or_else(|| OptimizerError::Configuration(format!("unknown sizing method: {s}")))
    }
}

/// Scale raw signals so that Σ|position| equals `target_gmv`.
///
/// Non-finite raw signals (missing alpha, zero volatility) become zero
/// positions rather than being dropped. If every raw signal is zero the
/// result is all zeros.
pub fn size_positions(
    alphas: ArrayView1<'_, f64>,
    idio_vol: ArrayView1<'_, f64>,
    target_gmv: f64,
    method: SizingMethod,
    risk_aversion: f64,
) -> Result<Array1<f64>> {
    if alphas.len() != idio_vol.len() {
        return Err(OptimizerError::DimensionMismatch(format!(
            "{} alphas but {} volatilities",
            alphas.len(),
            idio_vol.len()
        )));
    }

    let raw = Array1::from_iter(alphas.iter().zip(idio_vol.iter()).map(|(&a, &vol)| {
        let value = match method {
            SizingMethod::Proportional => a,
            SizingMethod::RiskParity => a / vol,
            SizingMethod::MeanVariance => a / (vol * vol * risk_aversion),
        };
        if value.is_finite() { value } else { 0.0 }
    }));

    let gross: f64 = raw.iter().map(|v| v.abs()).sum();
    if gross > 0.0 {
        Ok(raw * (target_gmv / gross))
    } else {
        Ok(raw.mapv(|_| 0.0))
    }
}

/// Cap every |position| at `max_weight` of the gross value.
///
/// This is not a plain clip. Clipping alone shrinks the gross, which lowers
/// the cap itself, so a clipped book can still hold a position above
/// `max_weight` of its new gross. Instead, capped excess is redistributed
/// pro rata over the uncapped positions so the gross is preserved and
/// `max|p| ≤ max_weight · Σ|p|` holds. When the
/// non-zero positions cannot absorb the gross under the cap
/// (`count · max_weight < 1`) every position is clipped to the cap and the
/// gross shrinks.
pub fn cap_positions(positions: ArrayView1<'_, f64>, max_weight: f64) -> Array1<f64> {
    let gmv: f64 = positions.iter().map(|p| p.abs()).sum();
    if gmv == 0.0 {
        return positions.to_owned();
    }
    let cap = max_weight * gmv;

    let mut order: Vec<usize> = (0..positions.len())
        .filter(|&i| positions[i] != 0.0)
        .collect();
    if (order.len() as f64) * max_weight < 1.0 {
        tracing::warn!(
            positions = order.len(),
            max_weight,
            "position cap cannot hold the gross value; clipping only"
        );
        return positions.mapv(|p| p.clamp(-cap, cap));
    }

    // Largest first: find how many positions sit at the cap.
    order.sort_by(|&i, &j| positions[j].abs().total_cmp(&positions[i].abs()));
    let mut capped = 0;
    let mut remaining: f64 = order.iter().map(|&i| positions[i].abs()).sum();
    let scale = loop {
        let budget = gmv - capped as f64 * cap;
        let scale = budget / remaining;
        match order.get(capped) {
            Some(&i) if positions[i].abs() * scale > cap => {
                remaining -= positions[i].abs();
                capped += 1;
            }
            _ => break scale,
        }
    };

    let mut out = positions.to_owned();
    for (rank, &i) in order.iter().enumerate() {
        let magnitude = if rank < capped {
            cap
        } else {
            positions[i].abs() * scale
        };
        out[i] = magnitude.copysign(positions[i]);
    }
    out
}

/// Result of hedging one factor exposure
#[derive(Debug, Clone, PartialEq)]
pub struct NeutralizationOutcome {
    /// Positions after the hedge
    pub positions: Array1<f64>,
    /// Σ position · beta before
    pub exposure_before: f64,
    /// Σ position · beta after
    pub exposure_after: f64,
    /// `max_exposure · GMV`
    pub limit: f64,
    /// Whether a hedge was applied
    pub adjusted: bool,
}

/// Hedge a single-factor exposure back toward `max_exposure · GMV`.
///
/// The shortfall `exposure − sign(exposure) · limit` is apportioned across
/// positions by their share `p·β / Σ|p·β|` and subtracted in one pass. This
/// is a best-effort linear hedge: it shrinks the exposure but does not
/// guarantee the limit is met.
///
/// # Errors
/// Returns [`OptimizerError::DimensionMismatch`] if the inputs differ in
/// length.
pub fn neutralize_factor(
    positions: ArrayView1<'_, f64>,
    betas: ArrayView1<'_, f64>,
    max_exposure: f64,
) -> Result<NeutralizationOutcome> {
    if positions.len() != betas.len() {
        return Err(OptimizerError::DimensionMismatch(format!(
            "{} positions but {} betas",
            positions.len(),
            betas.len()
        )));
    }

    let contribution: Array1<f64> = Array1::from_iter(
        positions
            .iter()
            .zip(betas.iter())
            .map(|(&p, &b)| if b.is_finite() { p * b } else { 0.0 }),
    );
    let exposure = contribution.sum();
    let gmv: f64 = positions.iter().map(|p| p.abs()).sum();
    let limit = gmv * max_exposure;

    let contribution_sum: f64 = contribution.iter().map(|c| c.abs()).sum();
    if exposure.abs() <= limit || contribution_sum == 0.0 {
        return Ok(NeutralizationOutcome {
            positions: positions.to_owned(),
            exposure_before: exposure,
            exposure_after: exposure,
            limit,
            adjusted: false,
        });
    }

    let hedge = exposure - exposure.signum() * limit;
    let adjustment = hedge / contribution_sum;
    let adjusted = &positions - &(&contribution * adjustment);
    let exposure_after: f64 = adjusted
        .iter()
        .zip(betas.iter())
        .map(|(&p, &b)| if b.is_finite() { p * b } else { 0.0 })
        .sum();

    tracing::debug!(exposure_before = exposure, exposure_after, limit, "hedged factor exposure");
    let new_limit = adjusted.iter().map(|p| p.abs()).sum::<f64>() * max_exposure;
    if exposure_after.abs() > new_limit {
        tracing::warn!(
            exposure = exposure_after,
            limit = new_limit,
            "factor exposure still above limit after hedge"
        );
    }

    Ok(NeutralizationOutcome {
        positions: adjusted,
        exposure_before: exposure,
        exposure_after,
        limit,
        adjusted: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rstest::rstest;

    #[rstest]
    #[case("proportional", SizingMethod::Proportional)]
    #[case("risk_parity", SizingMethod::RiskParity)]
    #[case("mean_variance", SizingMethod::MeanVariance)]
    fn test_parse(#[case] name: &str, #[case] method: SizingMethod) {
        assert_eq!(name.parse::<SizingMethod>().unwrap(), method);
        assert_eq!(method.to_string(), name);
    }

    #[test]
    fn test_unknown_method() {
        assert!(matches!(
            "kelly".parse::<SizingMethod>(),
            Err(OptimizerError::Configuration(_))
        ));
    }

    #[test]
    fn test_risk_parity_scenario() {
        let positions = size_positions(
            array![0.1, 0.2].view(),
            array![0.1, 0.4].view(),
            1_000_000.0,
            SizingMethod::RiskParity,
            1.0,
        )
        .unwrap();
        assert_abs_diff_eq!(positions[0], 666_666.67, epsilon = 0.01);
        assert_abs_diff_eq!(positions[1], 333_333.33, epsilon = 0.01);
    }

    #[rstest]
    #[case(SizingMethod::Proportional)]
    #[case(SizingMethod::RiskParity)]
    #[case(SizingMethod::MeanVariance)]
    fn test_zero_alphas_give_zero_positions(#[case] method: SizingMethod) {
        let positions = size_positions(
            Array1::zeros(4).view(),
            array![0.1, 0.2, 0.3, 0.4].view(),
            1e6,
            method,
            1.0,
        )
        .unwrap();
        assert!(positions.iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_mean_variance_sign_and_missing() {
        let positions = size_positions(
            array![0.1, -0.1, f64::NAN].view(),
            array![0.2, 0.1, 0.3].view(),
            100.0,
            SizingMethod::MeanVariance,
            2.0,
        )
        .unwrap();
        // raw = [1.25, -5.0, 0]
        assert_abs_diff_eq!(positions[0], 20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(positions[1], -80.0, epsilon = 1e-9);
        assert_eq!(positions[2], 0.0);
    }

    #[test]
    fn test_cap_redistributes() {
        let capped = cap_positions(array![700.0, -200.0, 100.0].view(), 0.5);
        let gmv: f64 = capped.iter().map(|p| p.abs()).sum();
        assert_abs_diff_eq!(gmv, 1000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(capped[0], 500.0, epsilon = 1e-9);
        // 500 left for the other two in ratio 2:1
        assert_abs_diff_eq!(capped[1], -1000.0 / 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(capped[2], 500.0 / 3.0, epsilon = 1e-9);
        assert!(capped.iter().all(|p| p.abs() <= 0.5 * gmv + 1e-9));
    }

    #[test]
    fn test_cap_clips_when_infeasible() {
        let capped = cap_positions(array![900.0, -100.0].view(), 0.3);
        assert_eq!(capped.to_vec(), vec![300.0, -100.0]);
    }

    #[test]
    fn test_cap_leaves_compliant_positions() {
        let positions = array![100.0, -100.0, 100.0, -100.0];
        assert_eq!(cap_positions(positions.view(), 0.25), positions);
    }

    #[test]
    fn test_neutralization_scenario() {
        let outcome =
            neutralize_factor(array![100.0, -50.0].view(), array![1.0, 1.0].view(), 0.1).unwrap();
        assert!(outcome.adjusted);
        assert_abs_diff_eq!(outcome.exposure_before, 50.0);
        assert_abs_diff_eq!(outcome.limit, 15.0, epsilon = 1e-12);
        // hedge 35 over Σ|pβ| = 150: positions shrink by 7/30 of their contribution
        assert_abs_diff_eq!(outcome.positions[0], 100.0 - 100.0 * 35.0 / 150.0, epsilon = 1e-9);
        assert_abs_diff_eq!(outcome.positions[1], -50.0 + 50.0 * 35.0 / 150.0, epsilon = 1e-9);
        assert!(outcome.exposure_after.abs() < outcome.exposure_before.abs());
        assert!(outcome.exposure_after > 15.0 - 1e-9);
    }

    #[test]
    fn test_neutralization_within_limit_is_noop() {
        let outcome =
            neutralize_factor(array![100.0, -90.0].view(), array![1.0, 1.0].view(), 0.1).unwrap();
        assert!(!outcome.adjusted);
        assert_eq!(outcome.positions, array![100.0, -90.0]);
    }
}
