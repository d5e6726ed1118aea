//! Metrics for evaluating forecast accuracy

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

/// Accuracy of a forecast against observed values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastScore {
    pub mean_absolute_error: f64,
    /// MAE divided by the mean of the compared actuals
    pub ratio_to_mean: f64,
    pub rmse: f64,
    /// Mean absolute percentage error over non-zero actuals, in percent
    pub mape: Option<f64>,
    /// Number of aligned points compared
    pub points: usize,
}

/// Scores forecasts against actuals
///
/// Inputs of different lengths are truncated to the shorter one, so a
/// 12-step forecast can be scored against the 3 months observed so far.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForecastEvaluator;

impl ForecastEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, forecast: &[f64], actual: &[f64]) -> Result<ForecastScore> {
        if actual.is_empty() {
            return Err(ForecastError::LengthMismatch(
                "no actual values to score against".to_string(),
            ));
        }
        if forecast.is_empty() {
            return Err(ForecastError::LengthMismatch(
                "no forecast values to score".to_string(),
            ));
        }

        let k = forecast.len().min(actual.len());
        let (forecast, actual) = (&forecast[..k], &actual[..k]);

        let mae = mean_absolute_error(actual, forecast);
        let mean = actual.iter().sum::<f64>() / k as f64;
        let ratio_to_mean = if mae == 0.0 {
            0.0
        } else if mean == 0.0 {
            f64::INFINITY
        } else {
            mae / mean
        };

        Ok(ForecastScore {
            mean_absolute_error: mae,
            ratio_to_mean,
            rmse: root_mean_squared_error(actual, forecast),
            mape: mean_absolute_percentage_error(actual, forecast),
            points: k,
        })
    }
}

/// Score `forecast` against `actual` with the default evaluator
pub fn score(forecast: &[f64], actual: &[f64]) -> Result<ForecastScore> {
    ForecastEvaluator::new().score(forecast, actual)
}

/// Mean absolute error of aligned slices (NaN when empty or misaligned)
pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / actual.len() as f64
}

/// Root mean squared error of aligned slices (NaN when empty or misaligned)
pub fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }
    let mse = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64;
    mse.sqrt()
}

/// MAPE in percent, skipping zero actuals; `None` if every actual is zero
pub fn mean_absolute_percentage_error(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    let terms: Vec<f64> = actual
        .iter()
        .zip(predicted)
        .filter(|(a, _)| **a != 0.0)
        .map(|(a, p)| ((a - p) / a).abs())
        .collect();
    if terms.is_empty() {
        return None;
    }
    Some(terms.iter().sum::<f64>() / terms.len() as f64 * 100.0)
}
