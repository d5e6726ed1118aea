//! # Ferry Math
//!
//! Numeric building blocks shared by the ridership forecasting crates.
//! This crate provides summary statistics, ordinary least squares and the
//! lag-polynomial arithmetic used for (seasonal) differencing.

use thiserror::Error;

pub mod differencing;
pub mod ols;
pub mod stats;

pub use differencing::{
    apply_polynomial, difference, differencing_polynomial, integrate, poly_mul,
    seasonal_difference,
};
pub use ols::{ols, OlsFit};
pub use stats::{mean, sample_variance, std_dev, variance};

/// Errors that can occur in numeric calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Singular matrix: {0}")]
    SingularMatrix(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for numeric operations
pub type Result<T> = std::result::Result<T, MathError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_problem() {
        let err = MathError::SingularMatrix("column 2 is constant".to_string());
        assert_eq!(err.to_string(), "Singular matrix: column 2 is constant");
    }
}
