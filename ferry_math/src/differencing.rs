//! Differencing and integration through lag polynomials
//!
//! A lag polynomial is stored as its coefficient vector, index `k` holding
//! the coefficient of `B^k`. The combined SARIMA differencing operator
//! `(1 - B)^d (1 - B^s)^D` is built once and used both to difference the
//! observed series and to integrate forecasts back to the original scale.

/// Lag-`lag` difference: `x[t] - x[t - lag]`, `lag` values shorter
pub fn difference(series: &[f64], lag: usize) -> Vec<f64> {
    if lag == 0 {
        return series.to_vec();
    }
    if series.len() <= lag {
        return Vec::new();
    }
    series
        .iter()
        .skip(lag)
        .zip(series.iter())
        .map(|(current, previous)| current - previous)
        .collect()
}

/// Apply the seasonal difference at `period` `order` times
pub fn seasonal_difference(series: &[f64], order: usize, period: usize) -> Vec<f64> {
    (0..order).fold(series.to_vec(), |acc, _| difference(&acc, period))
}

/// Multiply two lag polynomials
pub fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        if *x == 0.0 {
            continue;
        }
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// Coefficients of `(1 - B)^d (1 - B^period)^seasonal_d`
pub fn differencing_polynomial(d: usize, seasonal_d: usize, period: usize) -> Vec<f64> {
    let mut poly = vec![1.0];
    for _ in 0..d {
        poly = poly_mul(&poly, &[1.0, -1.0]);
    }
    if period > 0 {
        let mut seasonal = vec![0.0; period + 1];
        seasonal[0] = 1.0;
        seasonal[period] = -1.0;
        for _ in 0..seasonal_d {
            poly = poly_mul(&poly, &seasonal);
        }
    }
    poly
}

/// Filter `series` through `poly`: `w[t] = sum_k poly[k] * y[t - k]`
///
/// The output starts at the first index with a full lag window, so it is
/// `poly.len() - 1` values shorter than the input.
pub fn apply_polynomial(series: &[f64], poly: &[f64]) -> Vec<f64> {
    let degree = poly.len().saturating_sub(1);
    if poly.is_empty() || series.len() <= degree {
        return Vec::new();
    }
    (degree..series.len())
        .map(|t| {
            poly.iter()
                .enumerate()
                .map(|(k, c)| c * series[t - k])
                .sum()
        })
        .collect()
}

/// Invert `apply_polynomial` for values following `history`
///
/// `differenced` are new values on the filtered scale; the result holds the
/// matching values on the original scale, each one feeding the next.
/// `poly[0]` must be non-zero (it is 1 for every differencing operator).
pub fn integrate(differenced: &[f64], history: &[f64], poly: &[f64]) -> Vec<f64> {
    let Some(&lead) = poly.first() else {
        return differenced.to_vec();
    };
    let mut extended = history.to_vec();
    let mut out = Vec::with_capacity(differenced.len());
    for &w in differenced {
        let t = extended.len();
        let lagged: f64 = poly
            .iter()
            .enumerate()
            .skip(1)
            .map(|(k, c)| if t >= k { c * extended[t - k] } else { 0.0 })
            .sum();
        let value = (w - lagged) / lead;
        extended.push(value);
        out.push(value);
    }
    out
}
