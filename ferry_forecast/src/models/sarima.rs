//! Seasonal ARIMA estimated by conditional sum of squares

use crate::fitter::FitFailureCause;
use crate::models::optimizer::{
    arma_residuals, run_solver, CssProblem, DeadlineExceeded, ParamLayout, SolverSettings,
    LARGE_COST,
};
use crate::models::ParameterCandidate;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::debug;

/// Variance floor so an exact fit still has finite information criteria
pub const MIN_VARIANCE: f64 = 1e-12;

/// Objective value below which the starting point is accepted as optimal
const EXACT_FIT_COST: f64 = 1e-14;

/// Budget and stopping rules for one estimation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimationOptions {
    pub max_iters: u64,
    /// Wall-clock limit for the whole estimation
    pub timeout: Option<Duration>,
    pub tolerance_grad: f64,
    /// Treat an exhausted iteration budget as a failure
    pub strict_convergence: bool,
}

impl Default for EstimationOptions {
    fn default() -> Self {
        Self {
            max_iters: 500,
            timeout: Some(Duration::from_secs(30)),
            tolerance_grad: 1e-6,
            strict_convergence: false,
        }
    }
}

/// SARIMA(p,d,q)x(P,D,Q,s) model specification
#[derive(Debug, Clone)]
pub struct Sarima {
    candidate: ParameterCandidate,
    options: EstimationOptions,
}

/// Estimated coefficients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SarimaCoefficients {
    pub ar: Vec<f64>,
    pub seasonal_ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub seasonal_ma: Vec<f64>,
    /// Mean of the series, for models without differencing
    pub mean: Option<f64>,
}

/// A SARIMA model fitted to a series
#[derive(Debug, Clone, Serialize)]
pub struct FittedSarima {
    pub candidate: ParameterCandidate,
    pub coefficients: SarimaCoefficients,
    /// Innovation variance on the scale of the differenced series
    pub sigma2: f64,
    pub log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
    /// Residuals contributing to the objective
    pub nobs: usize,
    pub iterations: u64,
    /// False when the solver stopped on its iteration budget
    pub converged: bool,
    #[serde(skip)]
    history: Vec<f64>,
    #[serde(skip)]
    z: Vec<f64>,
    #[serde(skip)]
    residuals: Vec<f64>,
    #[serde(skip)]
    ar_lags: Vec<f64>,
    #[serde(skip)]
    ma_lags: Vec<f64>,
    #[serde(skip)]
    z_mean: f64,
    #[serde(skip)]
    center: f64,
    #[serde(skip)]
    scale: f64,
    #[serde(skip)]
    differencing: Vec<f64>,
}

impl Sarima {
    pub fn new(candidate: ParameterCandidate) -> Self {
        Self {
            candidate,
            options: EstimationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EstimationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn candidate(&self) -> ParameterCandidate {
        self.candidate
    }

    pub fn options(&self) -> EstimationOptions {
        self.options
    }

    fn layout(&self) -> ParamLayout {
        let c = &self.candidate;
        ParamLayout {
            p: c.order.p,
            seasonal_p: c.seasonal.p,
            q: c.order.q,
            seasonal_q: c.seasonal.q,
            period: c.seasonal.period,
            mean: c.includes_mean(),
        }
    }

    /// Smallest series length the model can be estimated on
    pub fn min_observations(&self) -> usize {
        let layout = self.layout();
        self.candidate.differencing_lag() + layout.conditioning() + layout.len().max(1) + 1
    }

    /// Estimate the model on `values`
    pub fn estimate(&self, values: &[f64]) -> std::result::Result<FittedSarima, FitFailureCause> {
        let started = Instant::now();
        let candidate = self.candidate;
        let seasonal = candidate.seasonal;
        if seasonal.period < 2 && seasonal.p + seasonal.d + seasonal.q > 0 {
            return Err(FitFailureCause::InvalidOrder(format!(
                "seasonal order {} needs a period of at least 2",
                seasonal
            )));
        }

        let needed = self.min_observations();
        if values.len() < needed {
            return Err(FitFailureCause::InsufficientData {
                needed,
                got: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(FitFailureCause::NumericalInstability(
                "series contains non-finite values".to_string(),
            ));
        }

        let differencing =
            ferry_math::differencing_polynomial(candidate.order.d, seasonal.d, seasonal.period);
        let w = ferry_math::apply_polynomial(values, &differencing);

        let layout = self.layout();
        let center = if layout.mean {
            ferry_math::mean(&w).unwrap_or(0.0)
        } else {
            0.0
        };
        let scale = match ferry_math::std_dev(&w) {
            Some(sd) if sd.is_finite() && sd > 0.0 => sd,
            _ => 1.0,
        };
        let z: Vec<f64> = w.iter().map(|v| (v - center) / scale).collect();

        let mut problem = CssProblem::new(z.clone(), layout);
        if let Some(limit) = self.options.timeout {
            problem = problem.with_deadline(started, limit);
        }

        let init = vec![0.0; layout.len()];
        let init_cost = problem.objective(&init);
        let init_grad_norm = problem
            .numeric_gradient(&init)
            .iter()
            .map(|g| g * g)
            .sum::<f64>()
            .sqrt();

        let (param, iterations) = if layout.is_empty()
            || init_cost < EXACT_FIT_COST
            || init_grad_norm < self.options.tolerance_grad
        {
            debug!(%candidate, init_cost, "starting point already optimal");
            (init, 0)
        } else {
            let settings = SolverSettings {
                max_iters: self.options.max_iters,
                tolerance_grad: self.options.tolerance_grad,
                ..SolverSettings::default()
            };
            let outcome = run_solver(problem.clone(), candidate.method, init, settings)
                .map_err(|err| {
                    if err.downcast_ref::<DeadlineExceeded>().is_some() || problem.expired() {
                        FitFailureCause::Timeout {
                            limit_secs: self.options.timeout.unwrap_or_default().as_secs_f64(),
                        }
                    } else {
                        FitFailureCause::Optimizer(err.to_string())
                    }
                })?;
            debug!(
                %candidate,
                iterations = outcome.iterations,
                cost = outcome.cost,
                termination = %outcome.termination,
                "solver finished"
            );
            (outcome.param, outcome.iterations)
        };

        if param.iter().any(|v| !v.is_finite()) {
            return Err(FitFailureCause::NumericalInstability(
                "optimizer returned non-finite coefficients".to_string(),
            ));
        }
        let cost = problem.objective(&param);
        if !cost.is_finite() || cost >= LARGE_COST {
            return Err(FitFailureCause::NumericalInstability(format!(
                "objective diverged ({})",
                cost
            )));
        }

        let converged = iterations < self.options.max_iters;
        if !converged && self.options.strict_convergence {
            return Err(FitFailureCause::NotConverged { iterations });
        }

        let decoded = layout.decode(&param);
        let ar_lags = decoded.ar_lags(layout.period);
        let ma_lags = decoded.ma_lags(layout.period);
        let residuals = arma_residuals(&z, &ar_lags, &ma_lags, decoded.mean, layout.conditioning());

        let nobs = problem.effective_len();
        let n = nobs as f64;
        let sigma2 = (cost * scale * scale).max(MIN_VARIANCE);
        let log_likelihood = -n / 2.0 * ((2.0 * std::f64::consts::PI * sigma2).ln() + 1.0);
        let k = (layout.len() + 1) as f64;
        let aic = -2.0 * log_likelihood + 2.0 * k;
        let bic = -2.0 * log_likelihood + k * n.ln();

        let coefficients = SarimaCoefficients {
            mean: layout.mean.then(|| center + decoded.mean * scale),
            ar: decoded.ar,
            seasonal_ar: decoded.seasonal_ar,
            ma: decoded.ma,
            seasonal_ma: decoded.seasonal_ma,
        };

        Ok(FittedSarima {
            candidate,
            coefficients,
            sigma2,
            log_likelihood,
            aic,
            bic,
            nobs,
            iterations,
            converged,
            history: values.to_vec(),
            z,
            residuals,
            ar_lags,
            ma_lags,
            z_mean: decoded.mean,
            center,
            scale,
            differencing,
        })
    }
}

impl FittedSarima {
    /// Forecast `steps` values past the end of the fitted series, setting
    /// future innovations to zero
    pub fn forecast_values(&self, steps: usize) -> Vec<f64> {
        let n = self.z.len();
        let mut x: Vec<f64> = self.z.iter().map(|v| v - self.z_mean).collect();
        let mut e = self.residuals.clone();

        for _ in 0..steps {
            let t = x.len();
            let ar: f64 = self
                .ar_lags
                .iter()
                .enumerate()
                .filter(|(i, _)| t > *i)
                .map(|(i, a)| a * x[t - i - 1])
                .sum();
            let ma: f64 = self
                .ma_lags
                .iter()
                .enumerate()
                .filter(|(j, _)| t > *j)
                .map(|(j, b)| b * e[t - j - 1])
                .sum();
            x.push(ar + ma);
            e.push(0.0);
        }

        let differenced: Vec<f64> = x[n..]
            .iter()
            .map(|v| (v + self.z_mean) * self.scale + self.center)
            .collect();
        ferry_math::integrate(&differenced, &self.history, &self.differencing)
    }

    /// Number of observations the model was fitted on
    pub fn training_len(&self) -> usize {
        self.history.len()
    }

    /// In-sample residuals on the standardized differenced scale
    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }
}
