//! Augmented Dickey-Fuller stationarity testing

use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use ferry_math::{ols, MathError, OlsFit};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::debug;

/// p-value below which a series counts as stationary
pub const DEFAULT_SIGNIFICANCE: f64 = 0.05;

// MacKinnon (1994) response surface, one variable with a constant
const TAU_MAX: f64 = 2.74;
const TAU_MIN: f64 = -18.83;
const TAU_STAR: f64 = -1.61;
const TAU_SMALL_P: [f64; 3] = [2.1659, 1.4412, 0.038269];
const TAU_LARGE_P: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

// MacKinnon (2010) critical value surfaces, polynomials in 1/nobs
const CRIT_1: [f64; 4] = [-3.43035, -6.5393, -16.786, -79.433];
const CRIT_5: [f64; 4] = [-2.86154, -2.8903, -4.234, -40.040];
const CRIT_10: [f64; 4] = [-2.56677, -1.5384, -2.809, 0.0];

/// Test statistic critical values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriticalValues {
    pub one_percent: f64,
    pub five_percent: f64,
    pub ten_percent: f64,
}

impl CriticalValues {
    fn for_nobs(nobs: usize) -> Self {
        let inv = 1.0 / nobs as f64;
        Self {
            one_percent: polyval(&CRIT_1, inv),
            five_percent: polyval(&CRIT_5, inv),
            ten_percent: polyval(&CRIT_10, inv),
        }
    }
}

/// Outcome of one unit-root test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationarityTest {
    /// ADF t-statistic on the lagged level
    pub statistic: f64,
    pub p_value: f64,
    pub is_stationary: bool,
    /// Number of lagged differences kept after AIC selection
    pub used_lag: usize,
    /// Observations in the final regression
    pub nobs: usize,
    pub critical_values: CriticalValues,
    pub significance: f64,
}

/// Tests on a series and on its first difference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationarityReport {
    pub original: StationarityTest,
    /// `None` when the differenced series could not be tested
    pub differenced: Option<StationarityTest>,
}

impl StationarityReport {
    /// Differencing order suggested by the tests (0, 1, or `None` if even
    /// the differenced series looks non-stationary)
    pub fn suggested_differencing(&self) -> Option<usize> {
        if self.original.is_stationary {
            Some(0)
        } else if self.differenced.as_ref().is_some_and(|t| t.is_stationary) {
            Some(1)
        } else {
            None
        }
    }
}

/// Unit-root testing and differencing
#[derive(Debug, Clone)]
pub struct StationarityAnalyzer {
    significance: f64,
    max_lags: Option<usize>,
}

impl Default for StationarityAnalyzer {
    fn default() -> Self {
        Self {
            significance: DEFAULT_SIGNIFICANCE,
            max_lags: None,
        }
    }
}

impl StationarityAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the significance level used for `is_stationary`
    pub fn with_significance(mut self, significance: f64) -> Result<Self> {
        if !(significance > 0.0 && significance < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "significance must be in (0, 1), got {}",
                significance
            )));
        }
        self.significance = significance;
        Ok(self)
    }

    /// Cap the number of lagged differences considered
    pub fn with_max_lags(mut self, max_lags: usize) -> Self {
        self.max_lags = Some(max_lags);
        self
    }

    pub fn significance(&self) -> f64 {
        self.significance
    }

    /// Run the augmented Dickey-Fuller test on a series
    pub fn test_stationarity(&self, series: &TimeSeries) -> Result<StationarityTest> {
        self.test_values(series.values())
    }

    /// Run the augmented Dickey-Fuller test on raw values
    pub fn test_values(&self, values: &[f64]) -> Result<StationarityTest> {
        let n = values.len();
        if n < 4 {
            return Err(ForecastError::InsufficientData { needed: 4, got: n });
        }
        let spread = ferry_math::std_dev(values).unwrap_or(0.0);
        if spread == 0.0 {
            return Err(ForecastError::InvalidParameter(
                "cannot test a constant series for a unit root".to_string(),
            ));
        }

        let cap = n / 2 - 2;
        let default_lag = (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize;
        let max_lag = self.max_lags.unwrap_or(default_lag).min(cap);

        let diffs = ferry_math::difference(values, 1);
        let used_lag = self.select_lag(values, &diffs, max_lag)?;
        let fit = adf_regression(values, &diffs, used_lag, used_lag)?;

        let statistic = fit.t_statistic(1).ok_or_else(|| {
            ForecastError::MathError(MathError::CalculationError(
                "unit-root regression fits perfectly; statistic undefined".to_string(),
            ))
        })?;
        let p_value = mackinnon_p_value(statistic)?;

        debug!(statistic, p_value, used_lag, nobs = fit.nobs, "ADF test");

        Ok(StationarityTest {
            statistic,
            p_value,
            is_stationary: p_value < self.significance,
            used_lag,
            nobs: fit.nobs,
            critical_values: CriticalValues::for_nobs(fit.nobs),
            significance: self.significance,
        })
    }

    /// First differences, dated by the later period of each pair
    pub fn difference(&self, series: &TimeSeries) -> Result<TimeSeries> {
        if series.is_empty() {
            return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
        }
        let periods = series.periods()[1..].to_vec();
        let values = ferry_math::difference(series.values(), 1);
        TimeSeries::new(series.resolution(), periods, values)
    }

    /// Test the series and its first difference
    pub fn report(&self, series: &TimeSeries) -> Result<StationarityReport> {
        let original = self.test_stationarity(series)?;
        let differenced = match self
            .difference(series)
            .and_then(|d| self.test_stationarity(&d))
        {
            Ok(test) => Some(test),
            Err(e) => {
                debug!(error = %e, "differenced series could not be tested");
                None
            }
        };
        Ok(StationarityReport {
            original,
            differenced,
        })
    }

    /// Lag with the lowest AIC over a common sample
    fn select_lag(&self, values: &[f64], diffs: &[f64], max_lag: usize) -> Result<usize> {
        let mut best: Option<(usize, f64)> = None;
        for lag in 0..=max_lag {
            let aic = match adf_regression(values, diffs, lag, max_lag) {
                Ok(fit) => fit.aic(),
                Err(e) => {
                    debug!(lag, error = %e, "skipping lag");
                    continue;
                }
            };
            if best.map_or(true, |(_, b)| aic < b) {
                best = Some((lag, aic));
            }
        }
        best.map(|(lag, _)| lag).ok_or_else(|| {
            ForecastError::MathError(MathError::CalculationError(
                "no lag order produced a valid regression".to_string(),
            ))
        })
    }
}

/// Regress `dy_t` on a constant, `y_{t-1}` and `lag` lagged differences,
/// starting at the row that `skip` lags leave available
fn adf_regression(values: &[f64], diffs: &[f64], lag: usize, skip: usize) -> Result<OlsFit> {
    let rows: Vec<usize> = (skip..diffs.len()).collect();
    let design: Vec<Vec<f64>> = rows
        .iter()
        .map(|&t| {
            let mut row = Vec::with_capacity(lag + 2);
            row.push(1.0);
            row.push(values[t]);
            row.extend((1..=lag).map(|i| diffs[t - i]));
            row
        })
        .collect();
    let target: Vec<f64> = rows.iter().map(|&t| diffs[t]).collect();
    Ok(ols(&design, &target)?)
}

/// Approximate p-value of an ADF statistic
fn mackinnon_p_value(statistic: f64) -> Result<f64> {
    if statistic > TAU_MAX {
        return Ok(1.0);
    }
    if statistic < TAU_MIN {
        return Ok(0.0);
    }
    let z = if statistic <= TAU_STAR {
        polyval(&TAU_SMALL_P, statistic)
    } else {
        polyval(&TAU_LARGE_P, statistic)
    };
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| ForecastError::MathError(MathError::CalculationError(e.to_string())))?;
    Ok(normal.cdf(z))
}

/// `c[0] + c[1] x + c[2] x^2 + ...`
fn polyval(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}
