//! Error types for the ferry_forecast crate

use crate::fitter::FitFailure;
use crate::search::SearchError;
use ferry_math::MathError;
use thiserror::Error;

/// Custom error types for the ferry_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Error from IO operations, including a missing input file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from the CSV reader or writer
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error from reading or writing JSON configuration and reports
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Input file is structurally unusable
    #[error("Input error: {0}")]
    InputError(String),

    /// A required column is absent from the input header
    #[error("Missing column '{column}' in {source_name}")]
    MissingColumn { column: String, source_name: String },

    /// Nothing survived filtering or aggregation
    #[error("Empty result: {0}")]
    EmptyResult(String),

    /// Evaluator was given nothing to compare against
    #[error("Length mismatch: {0}")]
    LengthMismatch(String),

    /// Error from invalid parameters or configuration
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Not enough observations for the requested operation
    #[error("Insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Error from a numeric primitive
    #[error("Math error: {0}")]
    MathError(#[from] MathError),

    /// A single model fit failed
    #[error(transparent)]
    FitError(#[from] FitFailure),

    /// The parameter search produced no usable model
    #[error(transparent)]
    SearchError(#[from] SearchError),
}

impl ForecastError {
    /// Whether this error means "no data or no model came out", which the
    /// caller may answer by widening the input or the search space
    pub fn is_empty_result(&self) -> bool {
        matches!(self, ForecastError::EmptyResult(_) | ForecastError::SearchError(_))
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;
