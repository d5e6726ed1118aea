//! Fitting single SARIMA candidates

use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::metrics::{ForecastEvaluator, ForecastScore};
use crate::models::{EstimationOptions, FittedSarima, ParameterCandidate, Sarima};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Longest accepted per-fit time limit (one week)
pub const MAX_TIMEOUT_SECS: f64 = 7.0 * 24.0 * 3600.0;

/// How a single fit is run and scored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Share of the series used for training when validating
    pub train_ratio: f64,
    /// Iteration budget of every solver
    pub max_iters: u64,
    /// Wall-clock limit per fit in seconds (`None` disables it)
    pub fit_timeout_secs: Option<f64>,
    /// Fail fits that exhaust `max_iters` instead of keeping the last iterate
    pub strict_convergence: bool,
    /// Round forecasts to whole passengers before scoring
    pub round_forecasts: bool,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            train_ratio: 0.8,
            max_iters: 500,
            fit_timeout_secs: Some(30.0),
            strict_convergence: false,
            round_forecasts: true,
        }
    }
}

impl FitConfig {
    pub fn with_train_ratio(mut self, train_ratio: f64) -> Self {
        self.train_ratio = train_ratio;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fit_timeout_secs = timeout.map(|t| t.as_secs_f64());
        self
    }

    pub fn with_max_iters(mut self, max_iters: u64) -> Self {
        self.max_iters = max_iters;
        self
    }

    pub fn with_strict_convergence(mut self, strict: bool) -> Self {
        self.strict_convergence = strict;
        self
    }

    pub fn with_round_forecasts(mut self, round: bool) -> Self {
        self.round_forecasts = round;
        self
    }

    /// Time limit per fit; `None` when disabled or not representable
    pub fn timeout(&self) -> Option<Duration> {
        self.fit_timeout_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.train_ratio > 0.0 && self.train_ratio < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "train_ratio must be in (0, 1), got {}",
                self.train_ratio
            )));
        }
        if self.max_iters == 0 {
            return Err(ForecastError::InvalidParameter(
                "max_iters must be positive".to_string(),
            ));
        }
        if let Some(secs) = self.fit_timeout_secs {
            if !(secs.is_finite() && secs > 0.0) {
                return Err(ForecastError::InvalidParameter(format!(
                    "fit_timeout_secs must be positive, got {}",
                    secs
                )));
            }
            if secs > MAX_TIMEOUT_SECS {
                return Err(ForecastError::InvalidParameter(format!(
                    "fit_timeout_secs must be at most {}, got {}",
                    MAX_TIMEOUT_SECS, secs
                )));
            }
        }
        Ok(())
    }

    fn estimation_options(&self) -> EstimationOptions {
        EstimationOptions {
            max_iters: self.max_iters,
            timeout: self.timeout(),
            strict_convergence: self.strict_convergence,
            ..EstimationOptions::default()
        }
    }
}

/// Why a candidate could not be fitted or scored
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FitFailureCause {
    #[error("insufficient data: need at least {needed} observations, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("optimizer error: {0}")]
    Optimizer(String),

    #[error("numerical instability: {0}")]
    NumericalInstability(String),

    #[error("timed out after {limit_secs} s")]
    Timeout { limit_secs: f64 },

    #[error("no convergence within {iterations} iterations")]
    NotConverged { iterations: u64 },

    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

/// A candidate that failed, with the reason
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("fit of {candidate} failed: {cause}")]
pub struct FitFailure {
    pub candidate: ParameterCandidate,
    pub cause: FitFailureCause,
}

impl FitFailure {
    pub fn new(candidate: ParameterCandidate, cause: FitFailureCause) -> Self {
        Self { candidate, cause }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.cause, FitFailureCause::Timeout { .. })
    }
}

/// A fitted candidate with its forecast
#[derive(Debug, Clone, Serialize)]
pub struct FitResult {
    pub candidate: ParameterCandidate,
    pub model: FittedSarima,
    pub forecast: Vec<f64>,
    /// Accuracy against actuals; `None` when the fit was not scored
    pub score: Option<ForecastScore>,
}

impl FitResult {
    /// Mean absolute error against the actuals
    pub fn error(&self) -> Option<f64> {
        self.score.map(|s| s.mean_absolute_error)
    }

    pub fn error_ratio(&self) -> Option<f64> {
        self.score.map(|s| s.ratio_to_mean)
    }

    pub fn aic(&self) -> f64 {
        self.model.aic
    }

    pub fn bic(&self) -> f64 {
        self.model.bic
    }
}

/// Fits single candidates and scores their forecasts
#[derive(Debug, Clone, Default)]
pub struct ModelFitter {
    config: FitConfig,
    evaluator: ForecastEvaluator,
}

impl ModelFitter {
    pub fn new(config: FitConfig) -> Self {
        Self {
            config,
            evaluator: ForecastEvaluator::new(),
        }
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    /// Fit `candidate` to a whole series
    pub fn fit(
        &self,
        series: &TimeSeries,
        candidate: ParameterCandidate,
    ) -> std::result::Result<FittedSarima, FitFailure> {
        self.fit_values(series.values(), candidate)
    }

    /// Fit `candidate` to raw values
    pub fn fit_values(
        &self,
        values: &[f64],
        candidate: ParameterCandidate,
    ) -> std::result::Result<FittedSarima, FitFailure> {
        Sarima::new(candidate)
            .with_options(self.config.estimation_options())
            .estimate(values)
            .map_err(|cause| FitFailure::new(candidate, cause))
    }

    /// Forecast `steps` values, rounded if configured
    pub fn forecast(&self, model: &FittedSarima, steps: usize) -> Vec<f64> {
        let values = model.forecast_values(steps);
        if self.config.round_forecasts {
            values.into_iter().map(f64::round).collect()
        } else {
            values
        }
    }

    /// Fit on `train` and forecast `horizon` steps without scoring
    pub fn fit_and_forecast(
        &self,
        train: &[f64],
        candidate: ParameterCandidate,
        horizon: usize,
    ) -> std::result::Result<FitResult, FitFailure> {
        let model = self.fit_values(train, candidate)?;
        let forecast = self.forecast(&model, horizon);
        if forecast.iter().any(|v| !v.is_finite()) {
            return Err(FitFailure::new(
                candidate,
                FitFailureCause::NumericalInstability("forecast is not finite".to_string()),
            ));
        }
        debug!(%candidate, aic = model.aic, "fitted candidate");

        Ok(FitResult {
            candidate,
            model,
            forecast,
            score: None,
        })
    }

    /// Fit on `train`, forecast `horizon` steps and score against `actuals`
    pub fn fit_and_score(
        &self,
        train: &[f64],
        actuals: &[f64],
        candidate: ParameterCandidate,
        horizon: usize,
    ) -> std::result::Result<FitResult, FitFailure> {
        let mut fit = self.fit_and_forecast(train, candidate, horizon)?;
        let score = self
            .evaluator
            .score(&fit.forecast, actuals)
            .map_err(|e| FitFailure::new(candidate, FitFailureCause::Evaluation(e.to_string())))?;

        debug!(%candidate, error = score.mean_absolute_error, "scored candidate");
        fit.score = Some(score);
        Ok(fit)
    }

    /// Fit on the leading `train_ratio` share of `series` and score the
    /// forecast on the remainder
    pub fn validate(&self, series: &TimeSeries, candidate: ParameterCandidate) -> Result<FitResult> {
        let (train, test) = series.split_at_ratio(self.config.train_ratio)?;
        if test.is_empty() {
            return Err(ForecastError::InsufficientData {
                needed: 2,
                got: series.len(),
            });
        }
        Ok(self.fit_and_score(train.values(), test.values(), candidate, test.len())?)
    }
}
