//! End-to-end research pipeline.
//!
//! [`Pipeline::construct`] turns one date's visible market data into a
//! target portfolio: alphas from the [`SignalCombiner`], exposures and
//! covariances from the [`RiskModel`], positions from the optimizer or a
//! closed-form [`FallbackConstructor`](hobart_optimizer::FallbackConstructor).
//! [`Pipeline::run_backtest`] drives that construction through the
//! [`BacktestEngine`], and the attribution helpers split realized returns of
//! a book into factor and specific legs.

use crate::config::{ConstructionMethod, PipelineConfig};
use crate::error::{PipelineError, Result};
use chrono::NaiveDate;
use hobart_backtest::{
    BacktestEngine, BacktestReport, Positions, Strategy, StrategyError, StrategyOutput,
};
use hobart_data::MarketData;
use hobart_optimizer::{
    ConvexSolver, OptimizationProblem, Portfolio, PortfolioOptimizer, PortfolioStats, SolveStatus,
};
use hobart_output::{AttributionEngine, AttributionResult};
use hobart_risk::{RiskModel, RiskModelResult};
use hobart_signals::SignalCombiner;
use ndarray::Array1;

/// A constructed portfolio with the inputs it was built from.
#[derive(Debug, Clone)]
pub struct Construction {
    /// Target holdings.
    pub portfolio: Portfolio,
    /// Risk model restricted to the holdings, in holding order.
    pub risk: RiskModelResult,
    /// Alpha per holding.
    pub alphas: Array1<f64>,
    /// Solver status when the optimizer was used.
    pub status: Option<SolveStatus>,
}

/// Configured pipeline stages.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    method: ConstructionMethod,
    combiner: SignalCombiner,
    risk_model: RiskModel,
    optimizer: PortfolioOptimizer,
}

impl Pipeline {
    /// Build every stage from a validated configuration.
    ///
    /// # Errors
    /// Returns [`PipelineError::Config`] if the configuration is invalid.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_solver(config, Box::new(hobart_optimizer::ClarabelSolver::default()))
    }

    /// Same as [`Self::new`] with a custom solver backend.
    ///
    /// # Errors
    /// Returns [`PipelineError::Config`] if the configuration is invalid.
    pub fn with_solver(config: PipelineConfig, solver: Box<dyn ConvexSolver>) -> Result<Self> {
        config.validate()?;
        let method = config.construction_method()?;
        let combiner = config.combiner()?;
        let risk_model = RiskModel::new(config.risk_model_config());
        Ok(Self {
            config,
            method,
            combiner,
            risk_model,
            optimizer: PortfolioOptimizer::new(solver),
        })
    }

    /// Active configuration.
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Construction method in use.
    pub const fn method(&self) -> ConstructionMethod {
        self.method
    }

    /// Target portfolio for `date`, using only data visible on that date.
    ///
    /// # Errors
    /// See [`Self::construct_visible`].
    pub fn construct(&self, data: &MarketData, date: NaiveDate) -> Result<Construction> {
        self.construct_visible(&data.as_of(date), date)
    }

    /// Target portfolio for `date` from data already cut at that date.
    ///
    /// Assets enter the universe when they have a finite alpha and a risk
    /// estimate; the rest are dropped for this date.
    ///
    /// # Errors
    /// Returns [`PipelineError::EmptyUniverse`] when no asset qualifies, and
    /// the error of whichever stage fails otherwise.
    pub fn construct_visible(&self, data: &MarketData, date: NaiveDate) -> Result<Construction> {
        let scores = self.combiner.combine(data, date)?;
        let full_risk = self.risk_model.estimate(data.assets(), data.factors())?;

        let (symbols, alphas): (Vec<String>, Vec<f64>) = scores
            .symbols
            .iter()
            .zip(scores.scores.iter())
            .filter(|(s, a)| a.is_finite() && full_risk.index_of(s).is_some())
            .map(|(s, a)| (s.clone(), *a))
            .unzip();
        if symbols.is_empty() {
            return Err(PipelineError::EmptyUniverse { date });
        }
        let dropped = scores.len() - symbols.len();
        if dropped > 0 {
            tracing::debug!(%date, dropped, "assets without alpha or risk estimate dropped");
        }

        let risk = full_risk.select(&symbols)?;
        let alphas = Array1::from_vec(alphas);
        let betas = risk.market_betas(&self.config.market_factor)?.to_owned();
        let idio_vol = risk.specific_variances().mapv(f64::sqrt);

        let (positions, stats, status) = match self.method {
            ConstructionMethod::Optimize => {
                let bounds = self.config.factor_bounds.resolve(risk.factor_names());
                let problem = OptimizationProblem::from_risk_model(alphas.view(), &risk, &bounds);
                let solved = self.optimizer.optimize(
                    &problem,
                    &self.config.constraints(),
                    risk.factor_names(),
                )?;
                (solved.positions, solved.stats, Some(solved.status))
            }
            ConstructionMethod::Sizing(sizing) => {
                let positions = self.config.fallback(sizing).construct(
                    alphas.view(),
                    idio_vol.view(),
                    betas.view(),
                )?;
                let stats = PortfolioStats::compute(
                    positions.view(),
                    alphas.view(),
                    risk.exposures().view(),
                    risk.factor_covariance().view(),
                    risk.specific_variances().view(),
                    risk.factor_names(),
                )?;
                (positions, stats, None)
            }
        };

        let portfolio = Portfolio::from_parts(
            &symbols,
            positions.view(),
            alphas.view(),
            betas.view(),
            idio_vol.view(),
            stats,
        )?;
        tracing::info!(
            %date,
            method = %self.method,
            assets = symbols.len(),
            gmv = portfolio.gmv(),
            volatility = portfolio.stats.total_volatility,
            "portfolio constructed"
        );

        Ok(Construction {
            portfolio,
            risk,
            alphas,
            status,
        })
    }

    /// Backtest the pipeline over the configured date range.
    ///
    /// An aborted run still yields a report; see
    /// [`BacktestReport::into_result`]. Relative statistics are measured
    /// against [`PipelineConfig::benchmark`].
    ///
    /// # Errors
    /// Returns [`PipelineError::Backtest`] for an invalid backtest
    /// configuration or a benchmark missing from `data`.
    pub fn run_backtest(&self, data: &MarketData) -> Result<BacktestReport> {
        let engine = BacktestEngine::new(self.config.backtest_config())?;
        let mut strategy = PipelineStrategy::new(self);
        Ok(engine.run(data, &mut strategy)?)
    }

    /// Attribute the returns of `positions`, held from `after` through
    /// `until`, to the factors and specific returns of `risk`.
    ///
    /// Positions outside `risk` are left out of the attribution.
    ///
    /// # Errors
    /// Returns [`PipelineError::EmptyWindow`] if no factor returns fall in
    /// the window, and [`PipelineError::Attribution`] if the book is empty.
    pub fn attribute_forward(
        &self,
        data: &MarketData,
        positions: &Positions,
        risk: &RiskModelResult,
        after: NaiveDate,
        until: Option<NaiveDate>,
    ) -> Result<AttributionResult> {
        let (dates, factor_returns) = data.factors().between(after, until);
        if dates.is_empty() {
            return Err(PipelineError::EmptyWindow { after });
        }

        let (symbols, book): (Vec<String>, Vec<f64>) = positions
            .iter()
            .filter(|(symbol, position)| {
                let known = risk.index_of(symbol).is_some();
                if !known && **position != 0.0 {
                    tracing::warn!(%symbol, "position has no risk estimate, left out of attribution");
                }
                known && **position != 0.0
            })
            .map(|(s, p)| (s.clone(), *p))
            .unzip();

        let held = risk.select(&symbols)?;
        let specific = held.specific_returns(data.assets(), data.factors(), dates)?;
        let result = AttributionEngine::new().attribute(
            Array1::from_vec(book).view(),
            held.exposures().view(),
            factor_returns,
            specific.view(),
            held.factor_names(),
            dates,
        )?;
        tracing::info!(
            %after,
            periods = dates.len(),
            total = result.total_return(),
            factor = result.factor_return(),
            specific = result.specific_return(),
            "returns attributed"
        );
        Ok(result)
    }

    /// Attribute the book of the last successful rebalance of `report` over
    /// the remaining days of the run.
    ///
    /// Exposures are re-estimated from the data visible on the rebalance
    /// date. Returns `None` when no rebalance produced a non-empty book or
    /// the rebalance fell on the last day.
    ///
    /// # Errors
    /// Returns the error of the risk model or the attribution.
    pub fn attribute_backtest(
        &self,
        data: &MarketData,
        report: &BacktestReport,
    ) -> Result<Option<AttributionResult>> {
        let Some(last) = report.history.iter().rev().find(|s| {
            s.rebalanced && s.error.is_none() && s.positions.values().any(|p| *p != 0.0)
        }) else {
            return Ok(None);
        };
        let end = report.history.last().map(|s| s.date);
        if end == Some(last.date) {
            return Ok(None);
        }

        let visible = data.as_of(last.date);
        let risk = self.risk_model.estimate(visible.assets(), visible.factors())?;
        self.attribute_forward(data, &last.positions, &risk, last.date, end)
            .map(Some)
    }
}

/// Adapter running a [`Pipeline`] as a backtest [`Strategy`].
#[derive(Debug)]
pub struct PipelineStrategy<'a> {
    pipeline: &'a Pipeline,
}

impl<'a> PipelineStrategy<'a> {
    /// Strategy constructing with `pipeline`.
    pub const fn new(pipeline: &'a Pipeline) -> Self {
        Self { pipeline }
    }
}

impl Strategy for PipelineStrategy<'_> {
    fn rebalance(
        &mut self,
        data: &MarketData,
        date: NaiveDate,
    ) -> std::result::Result<StrategyOutput, StrategyError> {
        let construction = self.pipeline.construct_visible(data, date)?;
        let positions = construction.portfolio.positions();
        Ok(StrategyOutput::new(positions).with_stats(construction.portfolio.stats))
    }
}
