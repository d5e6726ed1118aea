use approx::assert_relative_eq;
use chrono::NaiveDate;
use ferry_forecast::models::{OptimizationMethod, Order, ParameterCandidate, Sarima, SeasonalOrder};
use ferry_forecast::utils::generate_seasonal_series;
use ferry_forecast::FitFailureCause;
use rstest::rstest;

fn seasonal_values(months: usize) -> Vec<f64> {
    generate_seasonal_series(
        NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
        months,
        20_000.0,
        0.4,
        300.0,
        42,
    )
    .unwrap()
    .values()
    .to_vec()
}

#[rstest]
#[case(OptimizationMethod::Bfgs)]
#[case(OptimizationMethod::Lbfgs)]
#[case(OptimizationMethod::NelderMead)]
#[case(OptimizationMethod::ConjugateGradient)]
fn test_constant_series_forecasts_constant(#[case] method: OptimizationMethod) {
    let candidate = ParameterCandidate::new(Order::new(1, 0, 0), SeasonalOrder::none(), method);
    let trained = Sarima::new(candidate).estimate(&[100.0; 12]).unwrap();

    let forecast = trained.forecast_values(3);
    assert_eq!(forecast.len(), 3);
    for value in &forecast {
        assert_relative_eq!(*value, 100.0, epsilon = 1e-9);
    }
    assert!(trained.aic.is_finite());
    assert!(trained.bic.is_finite());
}

#[test]
fn test_seasonal_model_tracks_the_season() {
    let values = seasonal_values(72);
    let (train, test) = values.split_at(60);

    let candidate = ParameterCandidate::new(
        Order::new(0, 0, 0),
        SeasonalOrder::new(0, 1, 1, 12),
        OptimizationMethod::NelderMead,
    );
    let trained = Sarima::new(candidate).estimate(train).unwrap();
    let forecast = trained.forecast_values(12);

    let mae: f64 = forecast
        .iter()
        .zip(test)
        .map(|(f, a)| (f - a).abs())
        .sum::<f64>()
        / 12.0;
    // seasonal swing is 8000 passengers, noise 300
    assert!(mae < 1_000.0, "mae {}", mae);
    assert_eq!(trained.coefficients.seasonal_ma.len(), 1);
    assert!(trained.coefficients.seasonal_ma[0].abs() <= 1.0);
}

#[test]
fn test_coefficients_stay_inside_unit_interval() {
    let values = seasonal_values(48);
    let candidate = ParameterCandidate::new(
        Order::new(2, 0, 1),
        SeasonalOrder::none(),
        OptimizationMethod::Lbfgs,
    );
    if let Ok(trained) = Sarima::new(candidate).estimate(&values) {
        let c = &trained.coefficients;
        for v in c.ar.iter().chain(&c.ma) {
            assert!(v.abs() <= 1.0);
        }
        assert_eq!(trained.residuals().len(), values.len());
    }
}

#[test]
fn test_short_series_reports_what_it_needs() {
    let candidate = ParameterCandidate::new(
        Order::new(3, 1, 3),
        SeasonalOrder::new(1, 1, 1, 12),
        OptimizationMethod::Bfgs,
    );
    let sarima = Sarima::new(candidate);
    let err = sarima.estimate(&[1.0; 20]).unwrap_err();
    assert_eq!(
        err,
        FitFailureCause::InsufficientData {
            needed: sarima.min_observations(),
            got: 20,
        }
    );
}

#[test]
fn test_method_serde_names() {
    let json = serde_json::to_string(&OptimizationMethod::NelderMead).unwrap();
    assert_eq!(json, "\"nelder_mead\"");
    let method: OptimizationMethod = serde_json::from_str("\"conjugate_gradient\"").unwrap();
    assert_eq!(method, OptimizationMethod::ConjugateGradient);
}
