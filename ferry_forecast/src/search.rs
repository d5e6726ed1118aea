//! Exhaustive search over SARIMA orders and optimisation methods

use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::fitter::{FitFailure, FitResult, ModelFitter};
use crate::models::{OptimizationMethod, Order, ParameterCandidate, SeasonalOrder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Inclusive integer range of an order component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntRange {
    pub min: usize,
    pub max: usize,
}

impl IntRange {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    /// A range holding one value
    pub const fn single(value: usize) -> Self {
        Self::new(value, value)
    }

    pub fn values(&self) -> RangeInclusive<usize> {
        self.min..=self.max
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.max - self.min + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }
}

impl fmt::Display for IntRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.min, self.max)
    }
}

/// The Cartesian product searched: orders x seasonal orders x methods
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSpace {
    pub p: IntRange,
    pub d: IntRange,
    pub q: IntRange,
    pub seasonal_p: IntRange,
    pub seasonal_d: IntRange,
    pub seasonal_q: IntRange,
    pub period: usize,
    pub methods: Vec<OptimizationMethod>,
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            p: IntRange::new(0, 3),
            d: IntRange::new(0, 3),
            q: IntRange::new(0, 3),
            seasonal_p: IntRange::new(0, 1),
            seasonal_d: IntRange::new(0, 1),
            seasonal_q: IntRange::new(0, 1),
            period: 12,
            methods: OptimizationMethod::ALL.to_vec(),
        }
    }
}

impl SearchSpace {
    pub fn with_orders(mut self, p: IntRange, d: IntRange, q: IntRange) -> Self {
        self.p = p;
        self.d = d;
        self.q = q;
        self
    }

    pub fn with_seasonal_orders(mut self, p: IntRange, d: IntRange, q: IntRange) -> Self {
        self.seasonal_p = p;
        self.seasonal_d = d;
        self.seasonal_q = q;
        self
    }

    pub fn with_period(mut self, period: usize) -> Self {
        self.period = period;
        self
    }

    pub fn with_methods(mut self, methods: Vec<OptimizationMethod>) -> Self {
        self.methods = methods;
        self
    }

    /// Non-seasonal orders, p varying slowest
    pub fn orders(&self) -> Vec<Order> {
        let mut orders = Vec::with_capacity(self.p.len() * self.d.len() * self.q.len());
        for p in self.p.values() {
            for d in self.d.values() {
                for q in self.q.values() {
                    orders.push(Order::new(p, d, q));
                }
            }
        }
        orders
    }

    /// Seasonal orders at the configured period, P varying slowest
    pub fn seasonal_orders(&self) -> Vec<SeasonalOrder> {
        let mut orders = Vec::new();
        for p in self.seasonal_p.values() {
            for d in self.seasonal_d.values() {
                for q in self.seasonal_q.values() {
                    orders.push(SeasonalOrder::new(p, d, q, self.period));
                }
            }
        }
        orders
    }

    /// Every candidate: method outermost, then order, then seasonal order
    pub fn candidates(&self) -> impl Iterator<Item = ParameterCandidate> + '_ {
        let orders = self.orders();
        let seasonal = self.seasonal_orders();
        self.methods.iter().flat_map(move |&method| {
            let seasonal = seasonal.clone();
            orders.clone().into_iter().flat_map(move |order| {
                seasonal
                    .clone()
                    .into_iter()
                    .map(move |s| ParameterCandidate::new(order, s, method))
            })
        })
    }

    /// Number of candidates
    pub fn total(&self) -> usize {
        self.p.len()
            * self.d.len()
            * self.q.len()
            * self.seasonal_p.len()
            * self.seasonal_d.len()
            * self.seasonal_q.len()
            * self.methods.len()
    }

    pub fn validate(&self) -> Result<()> {
        let ranges = [
            ("p", self.p),
            ("d", self.d),
            ("q", self.q),
            ("seasonal_p", self.seasonal_p),
            ("seasonal_d", self.seasonal_d),
            ("seasonal_q", self.seasonal_q),
        ];
        if let Some((name, range)) = ranges.iter().find(|(_, r)| r.is_empty()) {
            return Err(ForecastError::InvalidParameter(format!(
                "range for {} is empty ({})",
                name, range
            )));
        }
        if self.period < 2 {
            return Err(ForecastError::InvalidParameter(format!(
                "seasonal period must be at least 2, got {}",
                self.period
            )));
        }
        if self.methods.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "at least one optimization method is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Value a search minimises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionCriterion {
    /// Mean absolute error of the forecast against held-out actuals
    #[default]
    ForecastError,
    /// Akaike information criterion of the fit; needs no actuals
    Aic,
}

impl SelectionCriterion {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionCriterion::ForecastError => "forecast_error",
            SelectionCriterion::Aic => "aic",
        }
    }

    /// The value of `fit` under this criterion, if it was measured
    pub fn value(&self, fit: &FitResult) -> Option<f64> {
        match self {
            SelectionCriterion::ForecastError => fit.error(),
            SelectionCriterion::Aic => Some(fit.aic()),
        }
    }

    pub fn needs_actuals(&self) -> bool {
        matches!(self, SelectionCriterion::ForecastError)
    }
}

impl fmt::Display for SelectionCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Search behaviour outside the parameter space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Steps forecast by each candidate
    pub horizon: usize,
    pub criterion: SelectionCriterion,
    /// Criterion values at or above this never count as an improvement
    pub improvement_threshold: Option<f64>,
    /// Evaluate candidates on the rayon pool (needs the `parallel` feature)
    ///
    /// Observer callbacks then arrive in enumeration order once every
    /// candidate has finished; per-fit progress is only logged at debug level.
    pub parallel: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            horizon: 12,
            criterion: SelectionCriterion::ForecastError,
            improvement_threshold: None,
            parallel: false,
        }
    }
}

impl SearchConfig {
    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn with_criterion(mut self, criterion: SelectionCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_improvement_threshold(mut self, threshold: f64) -> Self {
        self.improvement_threshold = Some(threshold);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "forecast horizon must be positive".to_string(),
            ));
        }
        if let Some(threshold) = self.improvement_threshold {
            // AIC may be negative, errors may not
            let in_range = match self.criterion {
                SelectionCriterion::ForecastError => threshold > 0.0,
                SelectionCriterion::Aic => true,
            };
            if !(threshold.is_finite() && in_range) {
                return Err(ForecastError::InvalidParameter(format!(
                    "improvement_threshold {} is not valid for {}",
                    threshold, self.criterion
                )));
            }
        }
        Ok(())
    }
}

/// A search that produced no usable model
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("none of the {attempted} candidates could be fitted")]
    NoCandidateConverged {
        attempted: usize,
        failures: Vec<FitFailure>,
    },

    #[error("{converged} candidates were fitted but the best {criterion} {best_value} did not beat {threshold}")]
    NoImprovement {
        converged: usize,
        criterion: SelectionCriterion,
        best_value: f64,
        threshold: f64,
    },

    #[error("{converged} candidates were fitted but none has a finite {criterion}")]
    NoFiniteValue {
        converged: usize,
        criterion: SelectionCriterion,
    },
}

/// A new best candidate, in discovery order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Improvement {
    /// Zero-based enumeration index of the candidate
    pub index: usize,
    pub candidate: ParameterCandidate,
    /// Criterion value that made it the best
    pub value: f64,
    pub error: Option<f64>,
    pub error_ratio: Option<f64>,
}

/// Progress notification for one evaluated candidate
#[derive(Debug)]
pub struct SearchProgress<'a> {
    /// One-based position in the enumeration
    pub index: usize,
    pub total: usize,
    pub outcome: std::result::Result<&'a FitResult, &'a FitFailure>,
    /// Criterion value of a fitted candidate
    pub value: Option<f64>,
    /// Whether this candidate became the new best
    pub improved: bool,
}

impl SearchProgress<'_> {
    pub fn candidate(&self) -> ParameterCandidate {
        match self.outcome {
            Ok(fit) => fit.candidate,
            Err(failure) => failure.candidate,
        }
    }
}

/// Receives search progress
pub trait SearchObserver: Send + Sync {
    fn on_start(&self, _total: usize) {}

    fn on_candidate(&self, progress: &SearchProgress<'_>);

    fn on_finish(&self, _report: &SearchReport) {}
}

/// Logs progress through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SearchObserver for TracingObserver {
    fn on_start(&self, total: usize) {
        info!(total, "starting exhaustive search over {} candidates", total);
    }

    fn on_candidate(&self, progress: &SearchProgress<'_>) {
        match progress.outcome {
            Ok(fit) => {
                info!(
                    "{}/{} with {} -> {:.3}",
                    progress.index,
                    progress.total,
                    fit.candidate,
                    progress.value.unwrap_or(f64::NAN)
                );
                if progress.improved {
                    info!(
                        error = ?fit.error(),
                        ratio = ?fit.error_ratio(),
                        aic = fit.aic(),
                        "new best {}",
                        fit.candidate
                    );
                }
            }
            Err(failure) => {
                warn!(
                    "{}/{} with {} failed: {}",
                    progress.index, progress.total, failure.candidate, failure.cause
                );
            }
        }
    }

    fn on_finish(&self, report: &SearchReport) {
        info!(
            converged = report.ranked.len(),
            failed = report.failures.len(),
            best = %report.best.candidate,
            criterion = %report.criterion,
            error = ?report.best.error(),
            aic = report.best.aic(),
            "search finished"
        );
    }
}

/// Outcome of a completed search
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub criterion: SelectionCriterion,
    /// The winner: first candidate reaching the lowest criterion value
    pub best: FitResult,
    /// Every fitted candidate, lowest criterion value first, ties in
    /// enumeration order
    pub ranked: Vec<FitResult>,
    pub improvements: Vec<Improvement>,
    pub failures: Vec<FitFailure>,
    pub attempted: usize,
    pub total: usize,
}

#[derive(Default)]
struct FoldState {
    best: Option<(usize, f64)>,
    improvements: Vec<Improvement>,
    successes: Vec<FitResult>,
    failures: Vec<FitFailure>,
    attempted: usize,
}

/// Grid search driving `ModelFitter` over a `SearchSpace`
#[derive(Clone)]
pub struct ParameterSearch {
    space: SearchSpace,
    config: SearchConfig,
    fitter: ModelFitter,
    observer: Arc<dyn SearchObserver>,
}

impl fmt::Debug for ParameterSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterSearch")
            .field("space", &self.space)
            .field("config", &self.config)
            .field("fitter", &self.fitter)
            .finish_non_exhaustive()
    }
}

impl ParameterSearch {
    pub fn new(space: SearchSpace, fitter: ModelFitter) -> Self {
        Self {
            space,
            config: SearchConfig::default(),
            fitter,
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_observer<O: SearchObserver + 'static>(mut self, observer: O) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Search with calendar series
    pub fn search_series(&self, train: &TimeSeries, actuals: &TimeSeries) -> Result<SearchReport> {
        self.search(train.values(), actuals.values())
    }

    /// Fit every candidate on `train` and keep the one minimising the
    /// configured criterion
    ///
    /// Forecasts are scored against `actuals` whenever any are given. Only
    /// the forecast-error criterion requires them.
    pub fn search(&self, train: &[f64], actuals: &[f64]) -> Result<SearchReport> {
        self.space.validate()?;
        self.config.validate()?;
        let criterion = self.config.criterion;
        if actuals.is_empty() && criterion.needs_actuals() {
            return Err(ForecastError::LengthMismatch(
                "no actual values to score candidates against".to_string(),
            ));
        }

        let total = self.space.total();
        debug!(
            orders = self.space.orders().len(),
            seasonal_orders = self.space.seasonal_orders().len(),
            methods = self.space.methods.len(),
            %criterion,
            "search space"
        );
        self.observer.on_start(total);

        let candidates = self.space.candidates();
        let horizon = self.config.horizon;
        let evaluate = |candidate: ParameterCandidate| {
            if actuals.is_empty() {
                self.fitter.fit_and_forecast(train, candidate, horizon)
            } else {
                self.fitter.fit_and_score(train, actuals, candidate, horizon)
            }
        };

        let state = if self.config.parallel {
            self.fold_parallel(candidates.collect(), &evaluate, total)
        } else {
            self.fold(candidates.map(&evaluate), total)
        };

        self.finish(state, total)
    }

    #[cfg(feature = "parallel")]
    fn fold_parallel<F>(&self, candidates: Vec<ParameterCandidate>, evaluate: &F, total: usize) -> FoldState
    where
        F: Fn(ParameterCandidate) -> std::result::Result<FitResult, FitFailure> + Sync,
    {
        let outcomes: Vec<_> = candidates
            .into_par_iter()
            .map(|candidate| {
                let outcome = evaluate(candidate);
                match &outcome {
                    Ok(fit) => {
                        debug!(%candidate, aic = fit.aic(), error = ?fit.error(), "candidate finished")
                    }
                    Err(failure) => debug!(%candidate, cause = %failure.cause, "candidate failed"),
                }
                outcome
            })
            .collect();
        self.fold(outcomes.into_iter(), total)
    }

    #[cfg(not(feature = "parallel"))]
    fn fold_parallel<F>(&self, candidates: Vec<ParameterCandidate>, evaluate: &F, total: usize) -> FoldState
    where
        F: Fn(ParameterCandidate) -> std::result::Result<FitResult, FitFailure> + Sync,
    {
        debug!("built without the parallel feature; evaluating sequentially");
        self.fold(candidates.into_iter().map(evaluate), total)
    }

    /// Reduce outcomes in enumeration order; only a strictly lower criterion
    /// value replaces the current best
    fn fold<I>(&self, outcomes: I, total: usize) -> FoldState
    where
        I: Iterator<Item = std::result::Result<FitResult, FitFailure>>,
    {
        let threshold = self.config.improvement_threshold;
        let criterion = self.config.criterion;
        outcomes
            .enumerate()
            .fold(FoldState::default(), |mut state, (index, outcome)| {
                state.attempted += 1;
                match outcome {
                    Ok(fit) => {
                        let value = criterion.value(&fit).filter(|v| v.is_finite());
                        let bar = state.best.map(|(_, v)| v).or(threshold);
                        let improved = value.is_some_and(|v| bar.map_or(true, |b| v < b));
                        if let Some(value) = value.filter(|_| improved) {
                            state.best = Some((state.successes.len(), value));
                            state.improvements.push(Improvement {
                                index,
                                candidate: fit.candidate,
                                value,
                                error: fit.error(),
                                error_ratio: fit.error_ratio(),
                            });
                        }
                        self.observer.on_candidate(&SearchProgress {
                            index: index + 1,
                            total,
                            outcome: Ok(&fit),
                            value,
                            improved,
                        });
                        state.successes.push(fit);
                    }
                    Err(failure) => {
                        self.observer.on_candidate(&SearchProgress {
                            index: index + 1,
                            total,
                            outcome: Err(&failure),
                            value: None,
                            improved: false,
                        });
                        state.failures.push(failure);
                    }
                }
                state
            })
    }

    fn finish(&self, state: FoldState, total: usize) -> Result<SearchReport> {
        let FoldState {
            best,
            improvements,
            mut successes,
            failures,
            attempted,
        } = state;

        if successes.is_empty() {
            return Err(SearchError::NoCandidateConverged {
                attempted,
                failures,
            }
            .into());
        }

        let criterion = self.config.criterion;
        let value_of = |fit: &FitResult| {
            criterion
                .value(fit)
                .filter(|v| v.is_finite())
                .unwrap_or(f64::INFINITY)
        };

        let Some(best) = best.and_then(|(position, _)| successes.get(position).cloned()) else {
            let converged = successes.len();
            let best_value = successes.iter().map(value_of).fold(f64::INFINITY, f64::min);
            let error = match self.config.improvement_threshold {
                Some(threshold) if best_value.is_finite() => SearchError::NoImprovement {
                    converged,
                    criterion,
                    best_value,
                    threshold,
                },
                _ => SearchError::NoFiniteValue {
                    converged,
                    criterion,
                },
            };
            return Err(error.into());
        };

        successes.sort_by(|a, b| value_of(a).total_cmp(&value_of(b)));

        let report = SearchReport {
            criterion,
            best,
            ranked: successes,
            improvements,
            failures,
            attempted,
            total,
        };
        self.observer.on_finish(&report);
        Ok(report)
    }
}
