//! Symmetric matrix helpers
//!
//! Eigen-decomposition (cyclic Jacobi), eigenvalue clipping and square-root
//! factors used by the optimizer's risk cone.

use super::CovarianceError;
use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Configuration for positive definiteness enforcement
#[derive(Debug, Clone)]
pub struct PositiveDefiniteConfig {
    /// Eigenvalues below this are raised to it (default: 1e-10)
    pub min_eigenvalue: f64,
    /// Rescale the clipped spectrum so the trace is unchanged
    pub preserve_trace: bool,
}

impl Default for PositiveDefiniteConfig {
    fn default() -> Self {
        Self {
            min_eigenvalue: 1e-10,
            preserve_trace: false,
        }
    }
}

/// Eigenvalues and eigenvectors of a symmetric matrix
#[derive(Debug, Clone)]
pub struct EigenDecomposition {
    /// Eigenvalues, descending
    pub eigenvalues: Array1<f64>,
    /// Eigenvectors as columns, ordered like `eigenvalues`
    pub eigenvectors: Array2<f64>,
}

impl EigenDecomposition {
    /// Rebuild `V diag(λ) Vᵀ`.
    pub fn reconstruct(&self) -> Array2<f64> {
        let scaled = &self.eigenvectors * &self.eigenvalues.view().insert_axis(Axis(0));
        scaled.dot(&self.eigenvectors.t())
    }

    /// Clip every eigenvalue from below.
    pub fn clipped(mut self, floor: f64) -> Self {
        self.eigenvalues.mapv_inplace(|v| v.max(floor));
        self
    }

    /// Square-root factor `L = diag(√λ) Vᵀ`, so that `Lᵀ L` reproduces the
    /// matrix. Negative eigenvalues are treated as zero.
    pub fn root(&self) -> Array2<f64> {
        let sqrt = self.eigenvalues.mapv(|v| v.max(0.0).sqrt());
        &self.eigenvectors.t() * &sqrt.insert_axis(Axis(1))
    }
}

/// Whether `matrix` is square and symmetric to within `tolerance`.
pub fn is_symmetric(matrix: ArrayView2<'_, f64>, tolerance: f64) -> bool {
    let n = matrix.nrows();
    if n != matrix.ncols() {
        return false;
    }
    (0..n).all(|i| (i + 1..n).all(|j| (matrix[[i, j]] - matrix[[j, i]]).abs() <= tolerance))
}

/// Cyclic Jacobi eigen-decomposition of a symmetric matrix.
///
/// Sweeps every off-diagonal pair until the off-diagonal Frobenius norm falls
/// below `tolerance` relative to the full norm, or `max_sweeps` is reached.
///
/// # Errors
/// Returns [`CovarianceError::DimensionMismatch`] for a non-square input and
/// [`CovarianceError::NonFinite`] if it contains NaN or infinity.
pub fn jacobi_eigendecomp(
    matrix: ArrayView2<'_, f64>,
    max_sweeps: usize,
    tolerance: f64,
) -> Result<EigenDecomposition, CovarianceError> {
    let n = matrix.nrows();
    if n != matrix.ncols() {
        return Err(CovarianceError::DimensionMismatch {
            expected: n,
            actual: matrix.ncols(),
        });
    }
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(CovarianceError::NonFinite);
    }

    let mut a = matrix.to_owned();
    let mut v = Array2::<f64>::eye(n);
    let total_norm = a.iter().map(|x| x * x).sum::<f64>().sqrt();

    for _ in 0..max_sweeps {
        let off_norm = off_diagonal_norm(&a);
        if off_norm <= tolerance * total_norm.max(f64::MIN_POSITIVE) {
            break;
        }
        for p in 0..n {
            for q in p + 1..n {
                if a[[p, q]].abs() > f64::MIN_POSITIVE {
                    rotate(&mut a, &mut v, p, q);
                }
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a[[j, j]].total_cmp(&a[[i, i]]));

    let eigenvalues = Array1::from_iter(order.iter().map(|&i| a[[i, i]]));
    let eigenvectors = Array2::from_shape_fn((n, n), |(row, k)| v[[row, order[k]]]);

    Ok(EigenDecomposition {
        eigenvalues,
        eigenvectors,
    })
}

fn off_diagonal_norm(a: &Array2<f64>) -> f64 {
    let n = a.nrows();
    let mut sum = 0.0;
    for i in 0..n {
        for j in 0..n {
            if i != j {
                sum += a[[i, j]] * a[[i, j]];
            }
        }
    }
    sum.sqrt()
}

/// Annihilate `a[p, q]` with one Givens rotation, accumulating into `v`.
fn rotate(a: &mut Array2<f64>, v: &mut Array2<f64>, p: usize, q: usize) {
    let n = a.nrows();
    let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * a[[p, q]]);
    let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
    let c = 1.0 / (t * t + 1.0).sqrt();
    let s = t * c;

    for k in 0..n {
        let akp = a[[k, p]];
        let akq = a[[k, q]];
        a[[k, p]] = c * akp - s * akq;
        a[[k, q]] = s * akp + c * akq;
    }
    for k in 0..n {
        let apk = a[[p, k]];
        let aqk = a[[q, k]];
        a[[p, k]] = c * apk - s * aqk;
        a[[q, k]] = s * apk + c * aqk;
    }
    for k in 0..n {
        let vkp = v[[k, p]];
        let vkq = v[[k, q]];
        v[[k, p]] = c * vkp - s * vkq;
        v[[k, q]] = s * vkp + c * vkq;
    }
}

/// Enforce positive definiteness via eigenvalue clipping
///
/// # Errors
/// Propagates decomposition errors for non-square or non-finite input.
pub fn enforce_positive_definite(
    cov: ArrayView2<'_, f64>,
    config: &PositiveDefiniteConfig,
) -> Result<Array2<f64>, CovarianceError> {
    let decomp = jacobi_eigendecomp(cov, 100, 1e-14)?;
    let original_trace: f64 = decomp.eigenvalues.sum();

    let mut clipped = decomp.clipped(config.min_eigenvalue);
    if config.preserve_trace && original_trace > 0.0 {
        let scale = original_trace / clipped.eigenvalues.sum();
        clipped.eigenvalues.mapv_inplace(|v| v * scale);
    }

    let rebuilt = clipped.reconstruct();
    // Restore exact symmetry lost to rounding.
    Ok((&rebuilt + &rebuilt.t()) / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_diagonal_matrix() {
        let m = array![[1.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 2.0]];
        let decomp = jacobi_eigendecomp(m.view(), 50, 1e-14).unwrap();
        assert_eq!(decomp.eigenvalues.to_vec(), vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_symmetric_2x2() {
        let m = array![[2.0, 1.0], [1.0, 2.0]];
        let decomp = jacobi_eigendecomp(m.view(), 50, 1e-14).unwrap();
        assert_abs_diff_eq!(decomp.eigenvalues[0], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(decomp.eigenvalues[1], 1.0, epsilon = 1e-12);

        let rebuilt = decomp.reconstruct();
        for (a, b) in rebuilt.iter().zip(m.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_root_reproduces_matrix() {
        let m = array![[0.04, 0.01, 0.0], [0.01, 0.09, 0.02], [0.0, 0.02, 0.16]];
        let root = jacobi_eigendecomp(m.view(), 50, 1e-14).unwrap().root();
        let rebuilt = root.t().dot(&root);
        for (a, b) in rebuilt.iter().zip(m.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_enforce_positive_definite_clips_negative() {
        let m = array![[1.0, 2.0], [2.0, 1.0]];
        let fixed = enforce_positive_definite(m.view(), &PositiveDefiniteConfig::default()).unwrap();
        let decomp = jacobi_eigendecomp(fixed.view(), 50, 1e-14).unwrap();
        assert!(decomp.eigenvalues.iter().all(|&v| v >= 1e-10 - 1e-12));
        assert!(is_symmetric(fixed.view(), 0.0));
    }

    #[test]
    fn test_preserve_trace() {
        let m = array![[1.0, 2.0], [2.0, 1.0]];
        let config = PositiveDefiniteConfig {
            min_eigenvalue: 0.01,
            preserve_trace: true,
        };
        let fixed = enforce_positive_definite(m.view(), &config).unwrap();
        assert_abs_diff_eq!(fixed[[0, 0]] + fixed[[1, 1]], 2.0, epsilon = 1e-10);
    }

    #[test]
    fn test_non_square_rejected() {
        let m = Array2::<f64>::zeros((2, 3));
        assert!(jacobi_eigendecomp(m.view(), 10, 1e-12).is_err());
        assert!(!is_symmetric(m.view(), 1e-12));
    }
}
