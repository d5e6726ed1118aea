//! Argument parsing and subcommand dispatch

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ferry_forecast::config::PipelineConfig;
use ferry_forecast::data::TimeSeries;
use ferry_forecast::models::{OptimizationMethod, Order, ParameterCandidate, SeasonalOrder};
use ferry_forecast::pipeline::ForecastPipeline;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "ferry-ridership", version)]
#[command(about = "Seasonal ARIMA forecasting of ferry ridership", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search orders and optimisers, then forecast with the winner
    Search {
        /// Pipeline configuration (JSON); defaults are used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Cleaned CSV files used for fitting
        #[arg(long, required = true, num_args = 1..)]
        train: Vec<PathBuf>,

        /// Cleaned CSV files holding the months each candidate is scored on
        /// (optional when the configured criterion is `aic`)
        #[arg(long, num_args = 1..)]
        actual: Vec<PathBuf>,

        /// Write the winner's forecast as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fit one candidate on the data and forecast past its end
    Forecast {
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long, required = true, num_args = 1..)]
        data: Vec<PathBuf>,

        /// Non-seasonal order as p,d,q
        #[arg(long, value_parser = parse_order)]
        order: Order,

        /// Seasonal order as P,D,Q,s
        #[arg(long, value_parser = parse_seasonal, default_value = "0,0,0,12")]
        seasonal: SeasonalOrder,

        /// Optimiser (bfgs, lbfgs, nelder_mead, conjugate_gradient)
        #[arg(short, long, default_value = "bfgs")]
        method: OptimizationMethod,

        /// Files with observed values for the forecast months
        #[arg(long, num_args = 1..)]
        actual: Vec<PathBuf>,

        /// Periods to forecast (defaults to the configured horizon)
        #[arg(long)]
        horizon: Option<usize>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Augmented Dickey-Fuller test on the series and its first difference
    Stationarity {
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long, required = true, num_args = 1..)]
        data: Vec<PathBuf>,
    },
}

fn parse_counts<const N: usize>(raw: &str) -> std::result::Result<[usize; N], String> {
    let parts = raw
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<usize>()
                .map_err(|e| format!("'{}' is not a non-negative integer: {}", part.trim(), e))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    parts
        .try_into()
        .map_err(|parts: Vec<usize>| format!("expected {} comma separated values, got {}", N, parts.len()))
}

fn parse_order(raw: &str) -> std::result::Result<Order, String> {
    let [p, d, q] = parse_counts::<3>(raw)?;
    Ok(Order::new(p, d, q))
}

fn parse_seasonal(raw: &str) -> std::result::Result<SeasonalOrder, String> {
    let [p, d, q, period] = parse_counts::<4>(raw)?;
    Ok(SeasonalOrder::new(p, d, q, period))
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("failed to load configuration {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn load(pipeline: &ForecastPipeline, paths: &[PathBuf], what: &str) -> Result<TimeSeries> {
    let (series, summary) = pipeline
        .load_series(paths)
        .with_context(|| format!("failed to build the {} series", what))?;
    info!(
        what,
        periods = series.len(),
        rows_read = summary.rows_read,
        rows_excluded = summary.rows_excluded,
        "series loaded"
    );
    Ok(series)
}

/// Run a parsed command and return its report as pretty JSON
pub fn run(cli: Cli) -> Result<String> {
    match cli.command {
        Command::Search {
            config,
            train,
            actual,
            output,
        } => {
            let pipeline = ForecastPipeline::new(load_config(config.as_deref())?)?;
            let criterion = pipeline.config().search.criterion;
            if actual.is_empty() && criterion.needs_actuals() {
                bail!("--actual is required when selecting by {}", criterion);
            }
            let train = load(&pipeline, &train, "training")?;
            let actuals = if actual.is_empty() {
                TimeSeries::empty(train.resolution())
            } else {
                load(&pipeline, &actual, "actuals")?
            };
            let full = train
                .concat(&actuals)
                .context("actuals must directly follow the training months")?;

            let run = pipeline.run(&train, &actuals, &full)?;
            if let Some(path) = output {
                run.forecast
                    .to_csv_file(&path)
                    .with_context(|| format!("failed to write {}", path.display()))?;
            }
            Ok(serde_json::to_string_pretty(&run)?)
        }
        Command::Forecast {
            config,
            data,
            order,
            seasonal,
            method,
            actual,
            horizon,
            output,
        } => {
            let pipeline = ForecastPipeline::new(load_config(config.as_deref())?)?;
            let series = load(&pipeline, &data, "history")?;
            let actuals = if actual.is_empty() {
                None
            } else {
                Some(load(&pipeline, &actual, "actuals")?)
            };
            let horizon = horizon.unwrap_or(pipeline.config().search.horizon);
            if horizon == 0 {
                bail!("horizon must be positive");
            }

            let candidate = ParameterCandidate::new(order, seasonal, method);
            let report = pipeline.forecast(
                &series,
                candidate,
                horizon,
                actuals.as_ref().map(|a| a.values()),
            )?;
            if let Some(path) = output {
                report
                    .to_csv_file(&path)
                    .with_context(|| format!("failed to write {}", path.display()))?;
            }
            Ok(serde_json::to_string_pretty(&report)?)
        }
        Command::Stationarity { config, data } => {
            let pipeline = ForecastPipeline::new(load_config(config.as_deref())?)?;
            let series = load(&pipeline, &data, "history")?;
            let report = pipeline.stationarity(&series)?;
            info!(
                stationary = report.original.is_stationary,
                suggested_d = ?report.suggested_differencing(),
                "stationarity tested"
            );
            Ok(serde_json::to_string_pretty(&report)?)
        }
    }
}
