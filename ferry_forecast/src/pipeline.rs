//! End-to-end flow: load, test, search, forecast

use crate::builder::{BuildSummary, SeriesBuilder};
use crate::config::PipelineConfig;
use crate::data::{DataLoader, Table, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::fitter::{FitResult, ModelFitter};
use crate::metrics::{ForecastEvaluator, ForecastScore};
use crate::models::{ParameterCandidate, SarimaCoefficients};
use crate::search::{ParameterSearch, SearchObserver, SearchReport, TracingObserver};
use crate::stationarity::{StationarityAnalyzer, StationarityReport};
use chrono::NaiveDate;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// One forecast value and the period it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeriodForecast {
    pub period: NaiveDate,
    pub value: f64,
}

/// Final output: the chosen model and its forecast
#[derive(Debug, Clone, Serialize)]
pub struct ForecastReport {
    pub candidate: ParameterCandidate,
    pub forecast: Vec<PeriodForecast>,
    /// Accuracy against actuals, when any were supplied
    pub score: Option<ForecastScore>,
    pub aic: f64,
    pub bic: f64,
    pub coefficients: SarimaCoefficients,
    /// Observations the model was fitted on
    pub training_len: usize,
}

impl ForecastReport {
    pub fn values(&self) -> Vec<f64> {
        self.forecast.iter().map(|f| f.value).collect()
    }

    pub fn periods(&self) -> Vec<NaiveDate> {
        self.forecast.iter().map(|f| f.period).collect()
    }

    /// Write the forecast as CSV to a file
    pub fn to_csv_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        write_forecast_csv(self, file)
    }
}

/// Write `period,forecast` rows
pub fn write_forecast_csv<W: Write>(report: &ForecastReport, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["period", "forecast"])?;
    for point in &report.forecast {
        csv_writer.write_record([point.period.to_string(), point.value.to_string()])?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Search result together with the forecast of the winner
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub search: SearchReport,
    pub forecast: ForecastReport,
}

/// Ties the builder, analyzer, search and fitter to one configuration
#[derive(Clone)]
pub struct ForecastPipeline {
    config: PipelineConfig,
    observer: Arc<dyn SearchObserver>,
}

impl std::fmt::Debug for ForecastPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecastPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ForecastPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            observer: Arc::new(TracingObserver),
        })
    }

    pub fn with_observer<O: SearchObserver + 'static>(mut self, observer: O) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn builder(&self) -> SeriesBuilder {
        SeriesBuilder::new(self.config.columns.clone(), self.config.resolution)
    }

    pub fn fitter(&self) -> ModelFitter {
        ModelFitter::new(self.config.fit.clone())
    }

    pub fn analyzer(&self) -> Result<StationarityAnalyzer> {
        StationarityAnalyzer::new().with_significance(self.config.significance)
    }

    /// Load and aggregate CSV files into one series
    ///
    /// Files that cannot be read are logged and skipped.
    pub fn load_series<P: AsRef<Path>>(&self, paths: &[P]) -> Result<(TimeSeries, BuildSummary)> {
        let tables: Vec<Table> = paths
            .iter()
            .filter_map(|path| match DataLoader::from_csv(path) {
                Ok(table) => Some(table),
                Err(e) => {
                    warn!(path = %path.as_ref().display(), error = %e, "skipping unreadable file");
                    None
                }
            })
            .collect();
        if tables.is_empty() {
            return Err(ForecastError::EmptyResult(
                "none of the input files could be read".to_string(),
            ));
        }
        self.builder().build_tables(&tables)
    }

    pub fn stationarity(&self, series: &TimeSeries) -> Result<StationarityReport> {
        self.analyzer()?.report(series)
    }

    fn parameter_search(&self) -> ParameterSearch {
        ParameterSearch::new(self.config.space.clone(), self.fitter())
            .with_config(self.config.search.clone())
            .with_observer(SharedObserver(Arc::clone(&self.observer)))
    }

    /// Search the configured space, scoring against `actuals`
    pub fn search(&self, train: &TimeSeries, actuals: &TimeSeries) -> Result<SearchReport> {
        self.parameter_search().search_series(train, actuals)
    }

    /// Fit on the train split of `series` and score on the rest
    pub fn validate(&self, series: &TimeSeries, candidate: ParameterCandidate) -> Result<FitResult> {
        self.fitter().validate(series, candidate)
    }

    /// Fit on the whole series and forecast `horizon` periods past its end
    pub fn forecast(
        &self,
        series: &TimeSeries,
        candidate: ParameterCandidate,
        horizon: usize,
        actuals: Option<&[f64]>,
    ) -> Result<ForecastReport> {
        if horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "forecast horizon must be positive".to_string(),
            ));
        }
        let fitter = self.fitter();
        let model = fitter.fit(series, candidate)?;
        let values = fitter.forecast(&model, horizon);
        let periods = series.future_periods(horizon)?;

        let score = match actuals {
            Some(actuals) if !actuals.is_empty() => {
                Some(ForecastEvaluator::new().score(&values, actuals)?)
            }
            _ => None,
        };

        info!(%candidate, horizon, aic = model.aic, "forecast produced");

        Ok(ForecastReport {
            candidate,
            forecast: periods
                .into_iter()
                .zip(values)
                .map(|(period, value)| PeriodForecast { period, value })
                .collect(),
            score,
            aic: model.aic,
            bic: model.bic,
            training_len: model.training_len(),
            coefficients: model.coefficients,
        })
    }

    /// Search on `train` against `actuals`, then forecast from `full` with
    /// the winning candidate
    pub fn run(
        &self,
        train: &TimeSeries,
        actuals: &TimeSeries,
        full: &TimeSeries,
    ) -> Result<PipelineRun> {
        let search = self.search(train, actuals)?;
        let forecast = self.forecast(
            full,
            search.best.candidate,
            self.config.search.horizon,
            None,
        )?;
        Ok(PipelineRun { search, forecast })
    }
}

/// Lets the pipeline hand its shared observer to each search
struct SharedObserver(Arc<dyn SearchObserver>);

impl SearchObserver for SharedObserver {
    fn on_start(&self, total: usize) {
        self.0.on_start(total)
    }

    fn on_candidate(&self, progress: &crate::search::SearchProgress<'_>) {
        self.0.on_candidate(progress)
    }

    fn on_finish(&self, report: &SearchReport) {
        self.0.on_finish(report)
    }
}
