//! Conditional sum of squares objective and the solvers that minimise it

use argmin::core::{CostFunction, Error as ArgminError, Executor, Gradient, State};
use argmin::solver::conjugategradient::{beta::PolakRibiere, NonlinearConjugateGradient};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::neldermead::NelderMead;
use argmin::solver::quasinewton::{BFGS, LBFGS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Objective value used when parameters give a non-finite cost
pub const LARGE_COST: f64 = 1e30;

const LBFGS_HISTORY: usize = 7;
const SIMPLEX_STEP: f64 = 0.5;

/// Numerical optimisation method used to estimate the coefficients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationMethod {
    /// Quasi-Newton BFGS
    Bfgs,
    /// Limited-memory BFGS
    Lbfgs,
    /// Nelder-Mead direct search
    NelderMead,
    /// Nonlinear conjugate gradient (Polak-Ribière)
    ConjugateGradient,
}

impl OptimizationMethod {
    pub const ALL: [OptimizationMethod; 4] = [
        OptimizationMethod::Bfgs,
        OptimizationMethod::Lbfgs,
        OptimizationMethod::NelderMead,
        OptimizationMethod::ConjugateGradient,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationMethod::Bfgs => "bfgs",
            OptimizationMethod::Lbfgs => "lbfgs",
            OptimizationMethod::NelderMead => "nelder_mead",
            OptimizationMethod::ConjugateGradient => "conjugate_gradient",
        }
    }
}

impl fmt::Display for OptimizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "bfgs" => Ok(OptimizationMethod::Bfgs),
            "lbfgs" | "l_bfgs" => Ok(OptimizationMethod::Lbfgs),
            "nelder_mead" | "nm" => Ok(OptimizationMethod::NelderMead),
            "conjugate_gradient" | "cg" => Ok(OptimizationMethod::ConjugateGradient),
            other => Err(format!("unknown optimization method '{}'", other)),
        }
    }
}

/// Raised from inside the objective once the wall-clock budget is spent
#[derive(Debug, Clone, Copy, Error)]
#[error("fit exceeded its time limit of {limit:?}")]
pub struct DeadlineExceeded {
    pub limit: Duration,
}

/// Layout of the SARIMA parameter vector
///
/// Unconstrained values are stored in the order: AR, seasonal AR, MA,
/// seasonal MA, then the mean when present. ARMA coefficients are mapped
/// through `tanh`, which keeps each one inside (-1, 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamLayout {
    pub p: usize,
    pub seasonal_p: usize,
    pub q: usize,
    pub seasonal_q: usize,
    pub period: usize,
    pub mean: bool,
}

/// Coefficients decoded from a parameter vector
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedParams {
    pub ar: Vec<f64>,
    pub seasonal_ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub seasonal_ma: Vec<f64>,
    pub mean: f64,
}

impl ParamLayout {
    pub fn len(&self) -> usize {
        self.p + self.seasonal_p + self.q + self.seasonal_q + usize::from(self.mean)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Observations consumed before residuals are computed
    pub fn conditioning(&self) -> usize {
        self.p + self.period * self.seasonal_p
    }

    pub fn decode(&self, param: &[f64]) -> DecodedParams {
        let mut it = param.iter().copied();
        let mut take = |n: usize| -> Vec<f64> { it.by_ref().take(n).map(f64::tanh).collect() };
        let ar = take(self.p);
        let seasonal_ar = take(self.seasonal_p);
        let ma = take(self.q);
        let seasonal_ma = take(self.seasonal_q);
        let mean = if self.mean {
            param.get(self.len() - 1).copied().unwrap_or(0.0)
        } else {
            0.0
        };
        DecodedParams {
            ar,
            seasonal_ar,
            ma,
            seasonal_ma,
            mean,
        }
    }
}

impl DecodedParams {
    /// Lag weights `a_i` of the expanded AR operator: `x_t = sum a_i x_{t-i} + ...`
    pub fn ar_lags(&self, period: usize) -> Vec<f64> {
        let poly = ferry_math::poly_mul(
            &lag_polynomial(&self.ar, 1, -1.0),
            &lag_polynomial(&self.seasonal_ar, period, -1.0),
        );
        poly.iter().skip(1).map(|c| -c).collect()
    }

    /// Lag weights `b_j` of the expanded MA operator: `... + sum b_j e_{t-j}`
    pub fn ma_lags(&self, period: usize) -> Vec<f64> {
        let poly = ferry_math::poly_mul(
            &lag_polynomial(&self.ma, 1, 1.0),
            &lag_polynomial(&self.seasonal_ma, period, 1.0),
        );
        poly.into_iter().skip(1).collect()
    }
}

/// `1 + sign * sum c_k B^(k * step)`
fn lag_polynomial(coefficients: &[f64], step: usize, sign: f64) -> Vec<f64> {
    if coefficients.is_empty() || step == 0 {
        return vec![1.0];
    }
    let mut poly = vec![0.0; coefficients.len() * step + 1];
    poly[0] = 1.0;
    for (k, c) in coefficients.iter().enumerate() {
        poly[(k + 1) * step] = sign * c;
    }
    poly
}

/// Residuals of an ARMA recursion over `z`, zero before `start`
pub fn arma_residuals(z: &[f64], ar_lags: &[f64], ma_lags: &[f64], mean: f64, start: usize) -> Vec<f64> {
    let mut residuals = vec![0.0; z.len()];
    for t in start..z.len() {
        let ar: f64 = ar_lags
            .iter()
            .enumerate()
            .filter(|(i, _)| t > *i)
            .map(|(i, a)| a * (z[t - i - 1] - mean))
            .sum();
        let ma: f64 = ma_lags
            .iter()
            .enumerate()
            .filter(|(j, _)| t > *j)
            .map(|(j, b)| b * residuals[t - j - 1])
            .sum();
        residuals[t] = (z[t] - mean) - ar - ma;
    }
    residuals
}

/// Mean squared one-step residual of a SARIMA model on a standardised,
/// already differenced series
#[derive(Debug, Clone)]
pub struct CssProblem {
    z: Vec<f64>,
    layout: ParamLayout,
    deadline: Option<(Instant, Duration)>,
}

impl CssProblem {
    pub fn new(z: Vec<f64>, layout: ParamLayout) -> Self {
        Self {
            z,
            layout,
            deadline: None,
        }
    }

    /// Fail every evaluation once `limit` has passed since `started`
    ///
    /// A limit too far in the future to represent never expires.
    pub fn with_deadline(mut self, started: Instant, limit: Duration) -> Self {
        self.deadline = started.checked_add(limit).map(|deadline| (deadline, limit));
        self
    }

    pub fn layout(&self) -> ParamLayout {
        self.layout
    }

    /// Observations contributing to the objective
    pub fn effective_len(&self) -> usize {
        self.z.len().saturating_sub(self.layout.conditioning())
    }

    /// Residuals for the given parameters
    pub fn residuals(&self, param: &[f64]) -> Vec<f64> {
        let decoded = self.layout.decode(param);
        arma_residuals(
            &self.z,
            &decoded.ar_lags(self.layout.period),
            &decoded.ma_lags(self.layout.period),
            decoded.mean,
            self.layout.conditioning(),
        )
    }

    /// Objective without the deadline check
    pub fn objective(&self, param: &[f64]) -> f64 {
        let n_eff = self.effective_len();
        if n_eff == 0 {
            return LARGE_COST;
        }
        let css: f64 = self.residuals(param).iter().map(|e| e * e).sum();
        let cost = css / n_eff as f64;
        if cost.is_finite() {
            cost
        } else {
            LARGE_COST
        }
    }

    /// Central finite-difference gradient of the objective
    pub fn numeric_gradient(&self, param: &[f64]) -> Vec<f64> {
        let mut grad = vec![0.0; param.len()];
        for i in 0..param.len() {
            let step = 1e-6 * (1.0 + param[i].abs());
            let mut plus = param.to_vec();
            let mut minus = param.to_vec();
            plus[i] += step;
            minus[i] -= step;
            grad[i] = (self.objective(&plus) - self.objective(&minus)) / (2.0 * step);
        }
        grad
    }

    fn check_deadline(&self) -> Result<(), ArgminError> {
        match self.deadline {
            Some((deadline, limit)) if Instant::now() >= deadline => {
                Err(DeadlineExceeded { limit }.into())
            }
            _ => Ok(()),
        }
    }

    /// Whether the deadline has passed
    pub fn expired(&self) -> bool {
        self.check_deadline().is_err()
    }
}

impl CostFunction for CssProblem {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, ArgminError> {
        self.check_deadline()?;
        Ok(self.objective(param))
    }
}

impl Gradient for CssProblem {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, param: &Self::Param) -> Result<Self::Gradient, ArgminError> {
        self.check_deadline()?;
        Ok(self.numeric_gradient(param))
    }
}

/// Stopping rules shared by all solvers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSettings {
    pub max_iters: u64,
    pub tolerance_grad: f64,
    pub tolerance_cost: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iters: 500,
            tolerance_grad: 1e-6,
            tolerance_cost: 1e-12,
        }
    }
}

/// Where a solver stopped
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutcome {
    pub param: Vec<f64>,
    pub cost: f64,
    pub iterations: u64,
    pub termination: String,
}

/// Minimise `problem` from `init` with the solver for `method`
pub fn run_solver(
    problem: CssProblem,
    method: OptimizationMethod,
    init: Vec<f64>,
    settings: SolverSettings,
) -> Result<SolverOutcome, ArgminError> {
    let max_iters = settings.max_iters;
    match method {
        OptimizationMethod::Lbfgs => {
            let linesearch = MoreThuenteLineSearch::new().with_c(1e-4, 0.9)?;
            let solver = LBFGS::new(linesearch, LBFGS_HISTORY)
                .with_tolerance_grad(settings.tolerance_grad)?
                .with_tolerance_cost(settings.tolerance_cost)?;
            let result = Executor::new(problem, solver)
                .configure(|state| state.param(init).max_iters(max_iters))
                .run()?;
            outcome(&result.state)
        }
        OptimizationMethod::Bfgs => {
            let dim = init.len();
            let inv_hessian: Vec<Vec<f64>> = (0..dim)
                .map(|i| (0..dim).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
                .collect();
            let linesearch = MoreThuenteLineSearch::new().with_c(1e-4, 0.9)?;
            let solver = BFGS::new(linesearch)
                .with_tolerance_grad(settings.tolerance_grad)?
                .with_tolerance_cost(settings.tolerance_cost)?;
            let result = Executor::new(problem, solver)
                .configure(|state| {
                    state
                        .param(init)
                        .inv_hessian(inv_hessian)
                        .max_iters(max_iters)
                })
                .run()?;
            outcome(&result.state)
        }
        OptimizationMethod::NelderMead => {
            let simplex = initial_simplex(&init);
            let solver = NelderMead::new(simplex).with_sd_tolerance(settings.tolerance_cost.sqrt())?;
            let result = Executor::new(problem, solver)
                .configure(|state| state.max_iters(max_iters))
                .run()?;
            outcome(&result.state)
        }
        OptimizationMethod::ConjugateGradient => {
            let linesearch = MoreThuenteLineSearch::new().with_c(1e-4, 0.1)?;
            let solver = NonlinearConjugateGradient::new(linesearch, PolakRibiere::new())
                .restart_iters(10)
                .restart_orthogonality(0.1);
            let result = Executor::new(problem, solver)
                .configure(|state| state.param(init).max_iters(max_iters))
                .run()?;
            outcome(&result.state)
        }
    }
}

/// `init` plus one vertex per coordinate, shifted by `SIMPLEX_STEP`
fn initial_simplex(init: &[f64]) -> Vec<Vec<f64>> {
    let mut simplex = Vec::with_capacity(init.len() + 1);
    simplex.push(init.to_vec());
    for i in 0..init.len() {
        let mut vertex = init.to_vec();
        vertex[i] += SIMPLEX_STEP;
        simplex.push(vertex);
    }
    simplex
}

fn outcome<S>(state: &S) -> Result<SolverOutcome, ArgminError>
where
    S: State<Param = Vec<f64>, Float = f64>,
{
    let param = state
        .get_best_param()
        .or_else(|| state.get_param())
        .cloned()
        .ok_or_else(|| ArgminError::msg("solver returned no parameters"))?;
    Ok(SolverOutcome {
        param,
        cost: state.get_best_cost(),
        iterations: state.get_iter(),
        termination: format!("{:?}", state.get_termination_status()),
    })
}
