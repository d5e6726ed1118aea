use chrono::NaiveDate;
use ferry_forecast::fitter::ModelFitter;
use ferry_forecast::models::OptimizationMethod;
use ferry_forecast::search::{
    IntRange, ParameterSearch, SearchConfig, SearchSpace, SelectionCriterion,
};
use ferry_forecast::stationarity::StationarityAnalyzer;
use ferry_forecast::utils::generate_seasonal_series;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Ferry Forecast: Monthly SARIMA Search");
    println!("=====================================\n");

    // Six years of synthetic monthly ridership with a summer peak
    let series = generate_seasonal_series(
        NaiveDate::from_ymd_opt(2018, 1, 1).unwrap(),
        72,
        40_000.0,
        0.45,
        600.0,
        7,
    )?;
    let (train, actuals) = series.split_at_ratio(5.0 / 6.0)?;
    println!(
        "Training on {} months, scoring on {} months\n",
        train.len(),
        actuals.len()
    );

    let report = StationarityAnalyzer::new().report(&train)?;
    println!(
        "ADF statistic {:.3}, p-value {:.3} (stationary: {})",
        report.original.statistic, report.original.p_value, report.original.is_stationary
    );
    if let Some(diff) = &report.differenced {
        println!(
            "After one difference: statistic {:.3}, p-value {:.3}\n",
            diff.statistic, diff.p_value
        );
    }

    let space = SearchSpace::default()
        .with_orders(IntRange::new(0, 1), IntRange::new(0, 1), IntRange::new(0, 1))
        .with_seasonal_orders(IntRange::single(0), IntRange::new(0, 1), IntRange::new(0, 1))
        .with_methods(vec![OptimizationMethod::Lbfgs, OptimizationMethod::NelderMead]);
    println!("Searching {} candidates...", space.total());

    let search = ParameterSearch::new(space.clone(), ModelFitter::default())
        .with_config(SearchConfig::default().with_horizon(actuals.len()));
    let result = search.search_series(&train, &actuals)?;

    println!("\nImprovements in discovery order:");
    for step in &result.improvements {
        println!(
            "  #{:<3} {}  error {:.1} ({:.2}%)",
            step.index + 1,
            step.candidate,
            step.value,
            step.error_ratio.unwrap_or(f64::NAN) * 100.0
        );
    }
    println!("\n{} candidates failed to fit", result.failures.len());

    println!("\nTop five:");
    for fit in result.ranked.iter().take(5) {
        let error = fit.error().unwrap_or(f64::NAN);
        println!("  {}  error {:.1}  aic {:.1}", fit.candidate, error, fit.aic());
    }

    println!("\nBest forecast vs actuals:");
    for ((period, actual), forecast) in actuals
        .periods()
        .iter()
        .zip(actuals.values())
        .zip(&result.best.forecast)
    {
        println!("  {}: {:>8.0} {:>8.0}", period.format("%Y-%m"), actual, forecast);
    }

    // Same space ranked by AIC on the full series, no hold-out needed
    let by_aic = ParameterSearch::new(space, ModelFitter::default())
        .with_config(
            SearchConfig::default()
                .with_horizon(12)
                .with_criterion(SelectionCriterion::Aic),
        )
        .search(series.values(), &[])?;
    println!(
        "
Lowest AIC: {} (aic {:.1})",
        by_aic.best.candidate,
        by_aic.best.aic()
    );

    Ok(())
}
