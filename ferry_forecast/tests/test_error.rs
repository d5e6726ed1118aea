use ferry_forecast::error::ForecastError;
use ferry_forecast::fitter::{FitFailure, FitFailureCause};
use ferry_forecast::models::{OptimizationMethod, Order, ParameterCandidate, SeasonalOrder};
use ferry_forecast::search::{SearchError, SelectionCriterion};
use ferry_math::MathError;
use std::io;

fn candidate() -> ParameterCandidate {
    ParameterCandidate::new(
        Order::new(1, 1, 1),
        SeasonalOrder::new(0, 1, 1, 12),
        OptimizationMethod::ConjugateGradient,
    )
}

#[test]
fn test_error_conversion() {
    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
    assert!(matches!(ForecastError::from(io_error), ForecastError::IoError(_)));

    let json_error = serde_json::from_str::<u32>("not json").unwrap_err();
    assert!(matches!(ForecastError::from(json_error), ForecastError::JsonError(_)));

    let math_error = MathError::InsufficientData("need 3 points".to_string());
    assert!(matches!(ForecastError::from(math_error), ForecastError::MathError(_)));

    let failure = FitFailure::new(candidate(), FitFailureCause::Timeout { limit_secs: 30.0 });
    assert!(matches!(ForecastError::from(failure), ForecastError::FitError(_)));
}

#[test]
fn test_error_display() {
    let error = ForecastError::MissingColumn {
        column: "NOUSIJAT".to_string(),
        source_name: "2023.csv".to_string(),
    };
    assert_eq!(error.to_string(), "Missing column 'NOUSIJAT' in 2023.csv");

    let error = ForecastError::InsufficientData { needed: 4, got: 2 };
    assert_eq!(error.to_string(), "Insufficient data: need at least 4, got 2");

    let failure = FitFailure::new(candidate(), FitFailureCause::NotConverged { iterations: 500 });
    let error = ForecastError::from(failure);
    let text = error.to_string();
    assert!(text.contains("conjugate_gradient: (1, 1, 1), (0, 1, 1, 12)"));
    assert!(text.contains("500"));
}

#[test]
fn test_empty_result_classification() {
    assert!(ForecastError::EmptyResult("no rows".to_string()).is_empty_result());

    let search = SearchError::NoCandidateConverged {
        attempted: 3,
        failures: Vec::new(),
    };
    assert!(ForecastError::from(search).is_empty_result());

    let search = SearchError::NoImprovement {
        converged: 2,
        criterion: SelectionCriterion::ForecastError,
        best_value: 10.0,
        threshold: 5.0,
    };
    assert!(ForecastError::from(search).is_empty_result());

    let search = SearchError::NoFiniteValue {
        converged: 2,
        criterion: SelectionCriterion::Aic,
    };
    assert_eq!(search.to_string(), "2 candidates were fitted but none has a finite aic");
    assert!(ForecastError::from(search).is_empty_result());

    assert!(!ForecastError::LengthMismatch("empty".to_string()).is_empty_result());
    assert!(!ForecastError::InvalidParameter("bad".to_string()).is_empty_result());
}

#[test]
fn test_fit_failure_serializes_cause() {
    let failure = FitFailure::new(candidate(), FitFailureCause::Timeout { limit_secs: 1.5 });
    assert!(failure.is_timeout());
    let json = serde_json::to_value(&failure).unwrap();
    assert_eq!(json["candidate"]["method"], "conjugate_gradient");
}
