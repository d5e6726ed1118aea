use chrono::NaiveDate;
use ferry_forecast::data::{Resolution, TimeSeries};
use ferry_forecast::fitter::{FitConfig, FitFailureCause, ModelFitter};
use ferry_forecast::models::{OptimizationMethod, Order, ParameterCandidate, SeasonalOrder};
use ferry_forecast::utils::generate_seasonal_series;
use ferry_forecast::ForecastError;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::time::Duration;

fn monthly(values: Vec<f64>) -> TimeSeries {
    TimeSeries::from_values(Resolution::Monthly, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(), values)
        .unwrap()
}

fn candidate(order: Order, seasonal: SeasonalOrder, method: OptimizationMethod) -> ParameterCandidate {
    ParameterCandidate::new(order, seasonal, method)
}

#[rstest]
#[case(Order::new(0, 0, 0), OptimizationMethod::Bfgs)]
#[case(Order::new(1, 0, 0), OptimizationMethod::Lbfgs)]
#[case(Order::new(0, 1, 1), OptimizationMethod::NelderMead)]
#[case(Order::new(1, 1, 0), OptimizationMethod::ConjugateGradient)]
fn test_constant_year_scores_perfectly(#[case] order: Order, #[case] method: OptimizationMethod) {
    let fitter = ModelFitter::default();
    let result = fitter
        .fit_and_score(
            &[100.0; 12],
            &[100.0; 3],
            candidate(order, SeasonalOrder::none(), method),
            3,
        )
        .unwrap();

    assert_eq!(result.forecast, vec![100.0; 3]);
    assert_eq!(result.error(), Some(0.0));
    assert_eq!(result.error_ratio(), Some(0.0));
    assert!(result.aic().is_finite());
    assert!(result.bic().is_finite());
}

#[test]
fn test_unscored_fit_has_no_error() {
    let result = ModelFitter::default()
        .fit_and_forecast(
            &[100.0; 12],
            candidate(Order::new(0, 1, 0), SeasonalOrder::none(), OptimizationMethod::Bfgs),
            2,
        )
        .unwrap();

    assert_eq!(result.forecast, vec![100.0; 2]);
    assert!(result.score.is_none());
    assert_eq!(result.error(), None);
    assert!(result.aic().is_finite());
}

#[test]
fn test_forecasts_are_rounded_by_default() {
    let fitter = ModelFitter::default();
    let model = fitter
        .fit_values(
            &[10.0, 10.5, 10.0, 10.5, 10.0, 10.5],
            candidate(Order::new(0, 0, 0), SeasonalOrder::none(), OptimizationMethod::Bfgs),
        )
        .unwrap();
    assert_eq!(fitter.forecast(&model, 2), vec![10.0, 10.0]);

    let unrounded = ModelFitter::new(FitConfig::default().with_round_forecasts(false));
    assert_eq!(unrounded.forecast(&model, 1), vec![10.25]);
}

#[test]
fn test_insufficient_data_is_a_fit_failure() {
    let fitter = ModelFitter::default();
    let c = candidate(
        Order::new(2, 1, 2),
        SeasonalOrder::new(1, 1, 1, 12),
        OptimizationMethod::Lbfgs,
    );
    let failure = fitter.fit_values(&[5.0; 12], c).unwrap_err();

    assert_eq!(failure.candidate, c);
    assert!(matches!(failure.cause, FitFailureCause::InsufficientData { got: 12, .. }));
    assert!(failure.to_string().contains("lbfgs: (2, 1, 2), (1, 1, 1, 12)"));
}

#[test]
fn test_tiny_timeout_is_reported_as_timeout() {
    let values = generate_seasonal_series(
        NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(),
        120,
        5_000.0,
        0.3,
        200.0,
        3,
    )
    .unwrap();
    let fitter = ModelFitter::new(FitConfig::default().with_timeout(Some(Duration::from_nanos(1))));
    let failure = fitter
        .fit(
            &values,
            candidate(Order::new(2, 0, 2), SeasonalOrder::new(1, 0, 1, 12), OptimizationMethod::Lbfgs),
        )
        .unwrap_err();

    assert!(failure.is_timeout(), "unexpected cause {}", failure.cause);
}

#[test]
fn test_strict_convergence_rejects_exhausted_budget() {
    let values = generate_seasonal_series(
        NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(),
        96,
        5_000.0,
        0.3,
        200.0,
        8,
    )
    .unwrap();
    let config = FitConfig::default()
        .with_max_iters(1)
        .with_strict_convergence(true);
    let c = candidate(Order::new(2, 0, 1), SeasonalOrder::none(), OptimizationMethod::NelderMead);

    let failure = ModelFitter::new(config.clone()).fit(&values, c).unwrap_err();
    assert!(matches!(failure.cause, FitFailureCause::NotConverged { .. }));

    let relaxed = ModelFitter::new(config.with_strict_convergence(false));
    let model = relaxed.fit(&values, c).unwrap();
    assert!(!model.converged);
}

#[test]
fn test_validate_uses_trailing_share_as_test() {
    let series = monthly(vec![100.0; 20]);
    let fitter = ModelFitter::default();
    let result = fitter
        .validate(
            &series,
            candidate(Order::new(0, 1, 0), SeasonalOrder::none(), OptimizationMethod::Bfgs),
        )
        .unwrap();

    assert_eq!(result.score.map(|s| s.points), Some(4));
    assert_eq!(result.forecast.len(), 4);
    assert_eq!(result.error(), Some(0.0));
}

#[test]
fn test_validate_propagates_fit_failure() {
    let series = monthly(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    let err = ModelFitter::default()
        .validate(
            &series,
            candidate(Order::new(3, 2, 3), SeasonalOrder::none(), OptimizationMethod::Bfgs),
        )
        .unwrap_err();
    assert!(matches!(err, ForecastError::FitError(_)));
}

#[test]
fn test_config_validation() {
    assert!(FitConfig::default().validate().is_ok());
    assert!(FitConfig::default().with_train_ratio(1.0).validate().is_err());
    assert!(FitConfig::default().with_max_iters(0).validate().is_err());

    let mut config = FitConfig::default();
    config.fit_timeout_secs = Some(-1.0);
    assert!(config.validate().is_err());
}

#[test]
fn test_huge_timeout_is_rejected_and_never_panics() {
    let mut config = FitConfig::default();
    config.fit_timeout_secs = Some(1e20);
    assert!(matches!(config.validate(), Err(ForecastError::InvalidParameter(_))));
    assert_eq!(config.timeout(), None);

    // an unvalidated config still fits, just without a time limit
    let model = ModelFitter::new(config)
        .fit_values(
            &[10.0, 12.0, 11.0, 13.0, 12.0, 14.0, 13.0, 15.0],
            candidate(Order::new(1, 0, 0), SeasonalOrder::none(), OptimizationMethod::Lbfgs),
        )
        .unwrap();
    assert_eq!(model.training_len(), 8);

    let week = FitConfig::default().with_timeout(Some(Duration::from_secs(7 * 24 * 3600)));
    assert!(week.validate().is_ok());
}
