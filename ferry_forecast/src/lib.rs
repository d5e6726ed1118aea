//! # Ferry Forecast
//!
//! Monthly ridership forecasting for a ferry line with seasonal ARIMA models.
//!
//! ## Features
//!
//! - Loading cleaned ridership CSV files and aggregating hourly rows into
//!   gap-free daily or monthly series
//! - Augmented Dickey-Fuller stationarity testing
//! - SARIMA estimation by conditional sum of squares with four optimisers
//! - Exhaustive search over orders and optimisers, scored on held-out months
//!
//! ## Quick Start
//!
//! ```no_run
//! use ferry_forecast::config::PipelineConfig;
//! use ferry_forecast::pipeline::ForecastPipeline;
//!
//! # fn main() -> ferry_forecast::error::Result<()> {
//! let pipeline = ForecastPipeline::new(PipelineConfig::default())?;
//!
//! let (train, _) = pipeline.load_series(&["data/2022.csv", "data/2023.csv"])?;
//! let (actuals, _) = pipeline.load_series(&["data/2024.csv"])?;
//!
//! let report = pipeline.search(&train, &actuals)?;
//! println!("best: {} (error {:?})", report.best.candidate, report.best.error());
//!
//! let full = train.concat(&actuals)?;
//! let forecast = pipeline.forecast(&full, report.best.candidate, 12, None)?;
//! for point in &forecast.forecast {
//!     println!("{}: {}", point.period, point.value);
//! }
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod data;
pub mod error;
pub mod fitter;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod search;
pub mod stationarity;
pub mod utils;

// Re-export commonly used types
pub use crate::builder::{BuildSummary, SeriesBuilder};
pub use crate::config::{ColumnConfig, PipelineConfig};
pub use crate::data::{DataLoader, RawRecord, Resolution, Table, TimeSeries};
pub use crate::error::ForecastError;
pub use crate::fitter::{FitConfig, FitFailure, FitFailureCause, FitResult, ModelFitter};
pub use crate::metrics::{ForecastEvaluator, ForecastScore};
pub use crate::models::{FittedSarima, OptimizationMethod, Order, ParameterCandidate, SeasonalOrder};
pub use crate::pipeline::{ForecastPipeline, ForecastReport};
pub use crate::search::{
    IntRange, ParameterSearch, SearchConfig, SearchError, SearchObserver, SearchReport,
    SearchSpace, SelectionCriterion, TracingObserver,
};
pub use crate::stationarity::{StationarityAnalyzer, StationarityTest, DEFAULT_SIGNIFICANCE};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
