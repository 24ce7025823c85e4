//! Cross-sectional transforms shared by the signals.

use crate::traits::SignalError;
use ndarray::Array1;
use polars::prelude::*;

/// Center `column` by date, optionally dividing by the cross-sectional
/// standard deviation.
pub fn center_xsection(column: &str, standardize: bool) -> Expr {
    let centered = col(column) - col(column).mean().over([col("date")]);
    if standardize {
        centered / col(column).std(1).over([col("date")])
    } else {
        centered
    }
}

/// Element-wise map over a float column. Nulls stay null.
pub(crate) fn map_f64(expr: Expr, f: fn(f64) -> f64) -> Expr {
    expr.apply(
        move |c: Column| {
            let s = c.as_materialized_series();
            Ok(Some(s.f64()?.apply_values(f).into_series().into()))
        },
        GetOutput::from_type(DataType::Float64),
    )
}

/// Subtract the mean. Non-finite inputs are left untouched and excluded
/// from the mean.
pub fn center(values: &Array1<f64>) -> Array1<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return values.clone();
    }
    let mean = finite.iter().sum::<f64>() / finite.len() as f64;
    values.mapv(|v| v - mean)
}

/// Center and scale to unit sample standard deviation. A constant vector
/// centers to zeros.
pub fn standardize(values: &Array1<f64>) -> Array1<f64> {
    let centered = center(values);
    let finite: Vec<f64> = centered.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < 2 {
        return centered;
    }
    let var = finite.iter().map(|v| v * v).sum::<f64>() / (finite.len() - 1) as f64;
    let std = var.sqrt();
    if std > 1e-15 {
        centered.mapv(|v| v / std)
    } else {
        centered
    }
}

/// Linear-interpolated percentile of sorted data, `q` in [0, 1].
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let rank = q * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Clip values to the symmetric `[p, 1 - p]` percentile band.
///
/// # Errors
/// Returns [`SignalError::InvalidParameter`] if `percentile` is outside
/// `[0, 1]`.
pub fn winsorize(values: &Array1<f64>, percentile_cut: f64) -> Result<Array1<f64>, SignalError> {
    if !(0.0..=1.0).contains(&percentile_cut) {
        return Err(SignalError::InvalidParameter(format!(
            "winsorize percentile must be between 0 and 1, got {percentile_cut}"
        )));
    }
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return Ok(values.clone());
    }
    sorted.sort_by(f64::total_cmp);

    let a = percentile(&sorted, percentile_cut);
    let b = percentile(&sorted, 1.0 - percentile_cut);
    let (lower, upper) = if a <= b { (a, b) } else { (b, a) };

    Ok(values.mapv(|v| if v.is_finite() { v.clamp(lower, upper) } else { v }))
}

/// Exponentially decaying weights over `window` points, oldest first. The
/// most recent weight is 1 and weights halve every `half_life` points.
pub fn exp_weights(window: usize, half_life: f64) -> Vec<f64> {
    let decay = std::f64::consts::LN_2 / half_life;
    (0..window).rev().map(|k| (-decay * k as f64).exp()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rstest::rstest;

    #[test]
    fn test_center_is_idempotent() {
        let scores = array![0.3, -1.2, 4.5, 0.0, 2.2];
        let once = center(&scores);
        let twice = center(&once);
        assert_abs_diff_eq!(once.sum(), 0.0, epsilon = 1e-12);
        for (a, b) in once.iter().zip(twice.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_center_ignores_nan() {
        let centered = center(&array![1.0, f64::NAN, 3.0]);
        assert_abs_diff_eq!(centered[0], -1.0, epsilon = 1e-12);
        assert!(centered[1].is_nan());
    }

    #[test]
    fn test_standardize_unit_std() {
        let z = standardize(&array![1.0, 2.0, 3.0, 4.0]);
        let var = z.iter().map(|v| v * v).sum::<f64>() / 3.0;
        assert_abs_diff_eq!(var, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_standardize_constant() {
        let z = standardize(&array![2.0, 2.0, 2.0]);
        assert!(z.iter().all(|v| v.abs() < 1e-15));
    }

    #[rstest]
    #[case(-0.1)]
    #[case(1.5)]
    fn test_winsorize_rejects_bad_percentile(#[case] p: f64) {
        assert!(winsorize(&array![1.0, 2.0], p).is_err());
    }

    #[test]
    fn test_winsorize_clips_tails() {
        let values = Array1::from_iter((0..=100).map(f64::from));
        let clipped = winsorize(&values, 0.05).unwrap();
        assert_abs_diff_eq!(clipped[0], 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(clipped[100], 95.0, epsilon = 1e-12);
        assert_abs_diff_eq!(clipped[50], 50.0, epsilon = 1e-12);
    }

    #[test]
    fn test_exp_weights() {
        let w = exp_weights(5, 2.0);
        assert_eq!(w.len(), 5);
        assert_abs_diff_eq!(w[4], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(w[2], 0.5, epsilon = 1e-12);
        assert!(w.windows(2).all(|p| p[0] < p[1]));
    }
}
