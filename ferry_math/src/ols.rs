//! Ordinary least squares via the normal equations
//!
//! Designed for the small regressions used by unit-root testing: a handful
//! of regressors and at most a few hundred observations.

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Pivots smaller than this are treated as zero
const PIVOT_EPSILON: f64 = 1e-12;

/// Result of an ordinary least squares regression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OlsFit {
    /// Estimated coefficients, one per design column
    pub coefficients: Vec<f64>,
    /// Standard errors of the coefficients
    pub standard_errors: Vec<f64>,
    /// Residual sum of squares
    pub rss: f64,
    /// Number of observations
    pub nobs: usize,
}

impl OlsFit {
    /// t-statistic of the coefficient at `index`
    pub fn t_statistic(&self, index: usize) -> Option<f64> {
        let coef = self.coefficients.get(index)?;
        let se = self.standard_errors.get(index)?;
        if *se > 0.0 && se.is_finite() {
            Some(coef / se)
        } else {
            None
        }
    }

    /// Gaussian AIC (`n ln(rss/n) + 2k`) of the regression
    pub fn aic(&self) -> f64 {
        let n = self.nobs as f64;
        let k = self.coefficients.len() as f64;
        n * (self.rss / n).ln() + 2.0 * k
    }
}

/// Fit `y = X b + e` where `design` holds one row per observation
pub fn ols(design: &[Vec<f64>], y: &[f64]) -> Result<OlsFit> {
    let n = y.len();
    if design.len() != n {
        return Err(MathError::InvalidInput(format!(
            "design has {} rows but response has {} observations",
            design.len(),
            n
        )));
    }
    let k = design.first().map(Vec::len).unwrap_or(0);
    if k == 0 {
        return Err(MathError::InvalidInput("design has no columns".to_string()));
    }
    if design.iter().any(|row| row.len() != k) {
        return Err(MathError::InvalidInput(
            "design rows have inconsistent widths".to_string(),
        ));
    }
    if n <= k {
        return Err(MathError::InsufficientData(format!(
            "need more than {} observations for {} regressors, got {}",
            k, k, n
        )));
    }

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, &target) in design.iter().zip(y) {
        for i in 0..k {
            xty[i] += row[i] * target;
            for j in i..k {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..k {
        for j in 0..i {
            xtx[i][j] = xtx[j][i];
        }
    }

    let inverse = invert(&xtx)?;
    let coefficients: Vec<f64> = inverse
        .iter()
        .map(|row| row.iter().zip(&xty).map(|(a, b)| a * b).sum())
        .collect();

    let rss: f64 = design
        .iter()
        .zip(y)
        .map(|(row, &target)| {
            let fitted: f64 = row.iter().zip(&coefficients).map(|(x, b)| x * b).sum();
            (target - fitted).powi(2)
        })
        .sum();

    let sigma2 = rss / (n - k) as f64;
    let standard_errors = (0..k)
        .map(|i| (sigma2 * inverse[i][i]).max(0.0).sqrt())
        .collect();

    Ok(OlsFit {
        coefficients,
        standard_errors,
        rss,
        nobs: n,
    })
}

/// Gauss-Jordan inversion with partial pivoting
fn invert(matrix: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
    let k = matrix.len();
    let mut a: Vec<Vec<f64>> = matrix.to_vec();
    let mut inv: Vec<Vec<f64>> = (0..k)
        .map(|i| (0..k).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    // Scale-aware threshold so large-valued regressors are not flagged
    let scale = a
        .iter()
        .flat_map(|row| row.iter())
        .fold(0.0_f64, |acc, v| acc.max(v.abs()))
        .max(1.0);

    for col in 0..k {
        let pivot_row = (col..k)
            .max_by(|&r1, &r2| a[r1][col].abs().total_cmp(&a[r2][col].abs()))
            .unwrap_or(col);
        if a[pivot_row][col].abs() <= PIVOT_EPSILON * scale {
            return Err(MathError::SingularMatrix(format!(
                "column {} is linearly dependent",
                col
            )));
        }
        a.swap(col, pivot_row);
        inv.swap(col, pivot_row);

        let pivot = a[col][col];
        for j in 0..k {
            a[col][j] /= pivot;
            inv[col][j] /= pivot;
        }

        for row in 0..k {
            if row == col {
                continue;
            }
            let factor = a[row][col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..k {
                a[row][j] -= factor * a[col][j];
                inv[row][j] -= factor * inv[col][j];
            }
        }
    }

    Ok(inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_exact_linear_fit() {
        // y = 1 + 2x
        let design: Vec<Vec<f64>> = (0..6).map(|x| vec![1.0, x as f64]).collect();
        let y: Vec<f64> = (0..6).map(|x| 1.0 + 2.0 * x as f64).collect();

        let fit = ols(&design, &y).unwrap();
        assert_relative_eq!(fit.coefficients[0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(fit.coefficients[1], 2.0, epsilon = 1e-9);
        assert!(fit.rss < 1e-12);
        assert_eq!(fit.nobs, 6);
    }

    #[test]
    fn test_noisy_fit_has_positive_standard_errors() {
        let design: Vec<Vec<f64>> = (0..8).map(|x| vec![1.0, x as f64]).collect();
        let y = vec![0.9, 3.2, 4.8, 7.1, 9.0, 10.8, 13.2, 15.1];

        let fit = ols(&design, &y).unwrap();
        assert!(fit.standard_errors.iter().all(|se| *se > 0.0));
        assert!(fit.t_statistic(1).unwrap() > 10.0);
        assert!(fit.aic().is_finite());
    }

    #[test]
    fn test_collinear_design_is_singular() {
        let design: Vec<Vec<f64>> = (0..5).map(|x| vec![x as f64, 2.0 * x as f64]).collect();
        let y = vec![1.0, 2.0, 3.0, 4.0, 5.0];

        assert!(matches!(
            ols(&design, &y),
            Err(MathError::SingularMatrix(_))
        ));
    }

    #[test]
    fn test_too_few_observations() {
        let design = vec![vec![1.0, 0.0], vec![1.0, 1.0]];
        let y = vec![1.0, 2.0];
        assert!(matches!(
            ols(&design, &y),
            Err(MathError::InsufficientData(_))
        ));
    }
}
