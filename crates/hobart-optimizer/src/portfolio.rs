//! Portfolios and their derived statistics.

use crate::error::{OptimizerError, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Net exposure to one factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorExposure {
    /// Factor name
    pub factor: String,
    /// Σ position · exposure, in currency units
    pub net: f64,
    /// `net / GMV`
    pub pct_gmv: f64,
}

/// Statistics derived from a set of positions
///
/// Volatilities are per period of the risk model and refer to the weight
/// vector `position / GMV`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioStats {
    /// Σ |position|
    pub gmv: f64,
    /// Net exposure per factor, in factor order
    pub net_exposures: Vec<FactorExposure>,
    /// Factor component of volatility
    pub factor_volatility: f64,
    /// Idiosyncratic component of volatility
    pub idio_volatility: f64,
    /// Total volatility
    pub total_volatility: f64,
    /// Share of total variance that is idiosyncratic (0 when there is none)
    pub pct_idio_variance: f64,
    /// α · w
    pub expected_return: f64,
}

impl PortfolioStats {
    /// Derive statistics from positions.
    ///
    /// `exposures` is N x F with columns named by `factor_names`;
    /// `specific_variance` has one entry per asset.
    ///
    /// # Errors
    /// Returns [`OptimizerError::DimensionMismatch`] if the inputs disagree
    /// in size.
    pub fn compute(
        positions: ArrayView1<'_, f64>,
        alphas: ArrayView1<'_, f64>,
        exposures: ArrayView2<'_, f64>,
        factor_covariance: ArrayView2<'_, f64>,
        specific_variance: ArrayView1<'_, f64>,
        factor_names: &[String],
    ) -> Result<Self> {
        let n = positions.len();
        let f = factor_names.len();
        if alphas.len() != n
            || specific_variance.len() != n
            || exposures.dim() != (n, f)
            || factor_covariance.dim() != (f, f)
        {
            return Err(OptimizerError::DimensionMismatch(format!(
                "{n} positions, {} alphas, {} specific variances, exposures {:?}, covariance {:?}, {f} factors",
                alphas.len(),
                specific_variance.len(),
                exposures.dim(),
                factor_covariance.dim()
            )));
        }

        let gmv: f64 = positions.iter().map(|p| p.abs()).sum();
        let weights: Array1<f64> = if gmv > 0.0 {
            positions.mapv(|p| p / gmv)
        } else {
            Array1::zeros(n)
        };

        let net = exposures.t().dot(&positions);
        let net_exposures = factor_names
            .iter()
            .zip(net.iter())
            .map(|(factor, &net)| FactorExposure {
                factor: factor.clone(),
                net,
                pct_gmv: if gmv > 0.0 { net / gmv } else { 0.0 },
            })
            .collect();

        let factor_weights = exposures.t().dot(&weights);
        let factor_var = factor_weights.dot(&factor_covariance.dot(&factor_weights)).max(0.0);
        let idio_var: f64 = weights
            .iter()
            .zip(specific_variance.iter())
            .map(|(w, s)| w * w * s)
            .sum();
        let total_var = factor_var + idio_var;

        Ok(Self {
            gmv,
            net_exposures,
            factor_volatility: factor_var.sqrt(),
            idio_volatility: idio_var.max(0.0).sqrt(),
            total_volatility: total_var.max(0.0).sqrt(),
            pct_idio_variance: if total_var > 0.0 { idio_var / total_var } else { 0.0 },
            expected_return: alphas.dot(&weights),
        })
    }

    /// Net exposure to `factor`
    pub fn exposure(&self, factor: &str) -> Option<&FactorExposure> {
        self.net_exposures.iter().find(|e| e.factor == factor)
    }
}

/// One line of a portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    /// Asset symbol
    pub symbol: String,
    /// Signed position in currency units
    pub position: f64,
    /// `position / GMV`
    pub weight: f64,
    /// Alpha score used to size the position
    pub alpha: f64,
    /// Market beta
    pub beta: f64,
    /// Idiosyncratic volatility
    pub idio_vol: f64,
}

/// Target positions with their statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    /// Holdings, in input order
    pub holdings: Vec<Holding>,
    /// Statistics of the holdings
    pub stats: PortfolioStats,
}

impl Portfolio {
    /// Bind per-asset data to positions.
    ///
    /// # Errors
    /// Returns [`OptimizerError::DimensionMismatch`] unless every slice has
    /// one entry per symbol.
    pub fn from_parts(
        symbols: &[String],
        positions: ArrayView1<'_, f64>,
        alphas: ArrayView1<'_, f64>,
        betas: ArrayView1<'_, f64>,
        idio_vols: ArrayView1<'_, f64>,
        stats: PortfolioStats,
    ) -> Result<Self> {
        let n = symbols.len();
        if [positions.len(), alphas.len(), betas.len(), idio_vols.len()]
            .iter()
            .any(|&len| len != n)
        {
            return Err(OptimizerError::DimensionMismatch(format!(
                "{n} symbols but {} positions, {} alphas, {} betas, {} idio vols",
                positions.len(),
                alphas.len(),
                betas.len(),
                idio_vols.len()
            )));
        }
        let gmv = stats.gmv;
        let holdings = (0..n)
            .map(|i| Holding {
                symbol: symbols[i].clone(),
                position: positions[i],
                weight: if gmv > 0.0 { positions[i] / gmv } else { 0.0 },
                alpha: alphas[i],
                beta: betas[i],
                idio_vol: idio_vols[i],
            })
            .collect();
        Ok(Self { holdings, stats })
    }

    /// Positions keyed by symbol
    pub fn positions(&self) -> BTreeMap<String, f64> {
        self.holdings
            .iter()
            .map(|h| (h.symbol.clone(), h.position))
            .collect()
    }

    /// Σ |position|
    pub fn gmv(&self) -> f64 {
        self.stats.gmv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, array};

    #[test]
    fn test_stats_decomposition() {
        let positions = array![600.0, -400.0];
        let stats = PortfolioStats::compute(
            positions.view(),
            array![0.02, -0.01].view(),
            array![[1.0], [0.5]].view(),
            array![[0.04]].view(),
            array![0.01, 0.02].view(),
            &["market".to_string()],
        )
        .unwrap();

        assert_abs_diff_eq!(stats.gmv, 1000.0);
        let market = stats.exposure("market").unwrap();
        assert_abs_diff_eq!(market.net, 400.0, epsilon = 1e-12);
        assert_abs_diff_eq!(market.pct_gmv, 0.4, epsilon = 1e-12);

        // w = [0.6, -0.4]; factor var = 0.4^2 * 0.04; idio var = 0.36*0.01 + 0.16*0.02
        let factor_var = 0.16 * 0.04;
        let idio_var = 0.0036 + 0.0032;
        assert_abs_diff_eq!(stats.factor_volatility, f64::sqrt(factor_var), epsilon = 1e-12);
        assert_abs_diff_eq!(stats.idio_volatility, f64::sqrt(idio_var), epsilon = 1e-12);
        assert_abs_diff_eq!(
            stats.pct_idio_variance,
            idio_var / (factor_var + idio_var),
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(stats.expected_return, 0.6 * 0.02 + 0.4 * 0.01, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_portfolio_stats() {
        let stats = PortfolioStats::compute(
            Array1::zeros(2).view(),
            Array1::zeros(2).view(),
            Array2::zeros((2, 1)).view(),
            Array2::eye(1).view(),
            Array1::ones(2).view(),
            &["market".to_string()],
        )
        .unwrap();
        assert_eq!(stats.gmv, 0.0);
        assert_eq!(stats.pct_idio_variance, 0.0);
        assert_eq!(stats.net_exposures[0].pct_gmv, 0.0);
    }

    #[test]
    fn test_from_parts_checks_lengths() {
        let result = Portfolio::from_parts(
            &["A".to_string()],
            array![1.0, 2.0].view(),
            array![0.1].view(),
            array![1.0].view(),
            array![0.2].view(),
            PortfolioStats::default(),
        );
        assert!(matches!(result, Err(OptimizerError::DimensionMismatch(_))));
    }
}
