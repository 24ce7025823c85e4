//! Weighted least squares for per-asset factor exposures
//!
//! Solves the normal equations `Xᵀ W X β = Xᵀ W y` with `W = diag(w)` by
//! Gaussian elimination with partial pivoting. There is no intercept; the
//! factor set is expected to carry a market factor if one is wanted.

use crate::specific_risk::SpecificRiskError;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use thiserror::Error;

/// Pivots smaller than this fraction of the largest diagonal entry of the
/// normal matrix are treated as zero.
const SINGULAR_TOLERANCE: f64 = 1e-12;

/// Failure of a single asset's factor fit
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegressionError {
    /// Fewer usable observations than factors
    #[error("Underdetermined regression: {observations} observations for {factors} factors")]
    Underdetermined {
        /// Usable observations
        observations: usize,
        /// Number of factors
        factors: usize,
    },

    /// The weighted design matrix is rank deficient
    #[error("Singular design matrix")]
    Singular,

    /// The fit produced NaN or infinite coefficients
    #[error("Regression produced non-finite coefficients")]
    NonFinite,

    /// Residual variance could not be estimated
    #[error("Specific risk: {0}")]
    SpecificRisk(#[from] SpecificRiskError),
}

/// Coefficients, unweighted residuals and fit quality of one regression
#[derive(Debug, Clone)]
pub struct RegressionFit {
    /// Fitted exposures, one per factor
    pub coefficients: Array1<f64>,
    /// `y - X β` per observation
    pub residuals: Array1<f64>,
    /// Weighted, uncentered `1 − Σ w e² / Σ w y²`; zero when `y` is all
    /// zero
    pub r_squared: f64,
}

/// Fit `y ~ X` with per-observation weights.
///
/// # Errors
/// [`RegressionError::Underdetermined`] when `X` has fewer rows than columns,
/// [`RegressionError::Singular`] when `Xᵀ W X` cannot be inverted, and
/// [`RegressionError::NonFinite`] when the inputs or outputs are not finite.
pub fn weighted_least_squares(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    weights: ArrayView1<'_, f64>,
) -> Result<RegressionFit, RegressionError> {
    let (n_obs, n_factors) = x.dim();
    if n_obs < n_factors || n_obs == 0 {
        return Err(RegressionError::Underdetermined {
            observations: n_obs,
            factors: n_factors,
        });
    }
    if x.iter().chain(y.iter()).chain(weights.iter()).any(|v| !v.is_finite()) {
        return Err(RegressionError::NonFinite);
    }

    // Normalising the weights leaves β unchanged but keeps XᵀWX well scaled.
    let mean_weight = weights.sum() / n_obs as f64;
    if mean_weight <= 0.0 {
        return Err(RegressionError::Singular);
    }
    let w = weights.mapv(|v| v / mean_weight);

    let weighted_x = &x * &w.view().insert_axis(Axis(1));
    let normal = weighted_x.t().dot(&x);
    let rhs = weighted_x.t().dot(&y);

    let coefficients = solve(normal, rhs)?;
    if coefficients.iter().any(|v| !v.is_finite()) {
        return Err(RegressionError::NonFinite);
    }

    let residuals = &y - &x.dot(&coefficients);
    // Without an intercept the uncentered total sum of squares keeps R² in [0, 1].
    let total: f64 = w.iter().zip(y.iter()).map(|(w, y)| w * y * y).sum();
    let unexplained: f64 = w.iter().zip(residuals.iter()).map(|(w, e)| w * e * e).sum();
    let r_squared = if total > 0.0 {
        (1.0 - unexplained / total).clamp(0.0, 1.0)
    } else {
        0.0
    };
    Ok(RegressionFit {
        coefficients,
        residuals,
        r_squared,
    })
}

/// Solve `a x = b` for square `a` in place.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>, RegressionError> {
    let n = b.len();
    let scale = a.diag().iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if scale == 0.0 {
        return Err(RegressionError::Singular);
    }
    let threshold = scale * SINGULAR_TOLERANCE;

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .unwrap_or(col);
        if a[[pivot, col]].abs() <= threshold {
            return Err(RegressionError::Singular);
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }

        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rstest::rstest;

    #[test]
    fn test_recovers_exact_betas() {
        let x = array![
            [0.01, 0.002],
            [-0.02, 0.004],
            [0.015, -0.003],
            [0.005, 0.001],
            [-0.01, -0.002]
        ];
        let beta = array![1.3, -0.4];
        let y = x.dot(&beta);
        let weights = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let fit = weighted_least_squares(x.view(), y.view(), weights.view()).unwrap();
        assert_abs_diff_eq!(fit.coefficients[0], 1.3, epsilon = 1e-9);
        assert_abs_diff_eq!(fit.coefficients[1], -0.4, epsilon = 1e-9);
        assert!(fit.residuals.iter().all(|r| r.abs() < 1e-12));
        assert_abs_diff_eq!(fit.r_squared, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_r_squared_is_weighted_explained_share() {
        let x = array![[1.0], [2.0]];
        let y = array![1.0, 2.5];
        let weights = array![1.0, 3.0];
        let fit = weighted_least_squares(x.view(), y.view(), weights.view()).unwrap();

        // β = Σ w x y / Σ w x² = (1 + 15) / (1 + 12)
        let beta = 16.0 / 13.0;
        assert_abs_diff_eq!(fit.coefficients[0], beta, epsilon = 1e-12);
        let e = [1.0 - beta, 2.5 - 2.0 * beta];
        let expected = 1.0 - (e[0] * e[0] + 3.0 * e[1] * e[1]) / (1.0 + 3.0 * 6.25);
        assert_abs_diff_eq!(fit.r_squared, expected, epsilon = 1e-12);
        assert!(fit.r_squared > 0.0 && fit.r_squared < 1.0);
    }

    #[test]
    fn test_weights_pull_fit_toward_heavy_observations() {
        // y = x except one outlier; weighting the outlier down moves β to 1.
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![1.0, 2.0, 6.0];
        let light = weighted_least_squares(x.view(), y.view(), array![1.0, 1.0, 1e-6].view())
            .unwrap();
        let heavy = weighted_least_squares(x.view(), y.view(), array![1.0, 1.0, 1.0].view())
            .unwrap();
        assert!((light.coefficients[0] - 1.0).abs() < (heavy.coefficients[0] - 1.0).abs());
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    fn test_underdetermined(#[case] n_obs: usize) {
        let x = Array2::<f64>::ones((n_obs, 3));
        let y = Array1::<f64>::ones(n_obs);
        let w = Array1::<f64>::ones(n_obs);
        assert_eq!(
            weighted_least_squares(x.view(), y.view(), w.view()).unwrap_err(),
            RegressionError::Underdetermined {
                observations: n_obs,
                factors: 3
            }
        );
    }

    #[test]
    fn test_collinear_factors_are_singular() {
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]];
        let y = array![1.0, 2.0, 3.0];
        let w = array![1.0, 1.0, 1.0];
        assert_eq!(
            weighted_least_squares(x.view(), y.view(), w.view()).unwrap_err(),
            RegressionError::Singular
        );
    }

    #[test]
    fn test_zero_factor_column_is_singular() {
        let x = array![[0.01, 0.0], [0.02, 0.0], [-0.01, 0.0]];
        let y = array![0.01, 0.02, -0.01];
        let w = array![1.0, 1.0, 1.0];
        assert_eq!(
            weighted_least_squares(x.view(), y.view(), w.view()).unwrap_err(),
            RegressionError::Singular
        );
    }
}
