//! Pipeline configuration loaded from JSON

use crate::data::Resolution;
use crate::error::{ForecastError, Result};
use crate::fitter::FitConfig;
use crate::search::{SearchConfig, SearchSpace};
use crate::stationarity::DEFAULT_SIGNIFICANCE;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Column names of the cleaned ridership files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    /// Timestamp column
    pub period: String,
    /// Passenger count column
    pub value: String,
    /// Direction code column
    pub direction: String,
    /// Direction codes whose rows are dropped (matched case-insensitively)
    pub excluded_directions: Vec<String>,
    /// Drop rows with a negative count instead of summing them
    pub skip_negative_counts: bool,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            period: "PÄIVÄMÄÄRÄ".to_string(),
            value: "NOUSIJAT".to_string(),
            direction: "SUUNTA".to_string(),
            excluded_directions: vec!["k1".to_string(), "k2".to_string()],
            skip_negative_counts: false,
        }
    }
}

/// Everything the pipeline needs apart from the data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub columns: ColumnConfig,
    pub resolution: Resolution,
    pub space: SearchSpace,
    pub fit: FitConfig,
    pub search: SearchConfig,
    /// p-value below which a series counts as stationary
    pub significance: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            columns: ColumnConfig::default(),
            resolution: Resolution::Monthly,
            space: SearchSpace::default(),
            fit: FitConfig::default(),
            search: SearchConfig::default(),
            significance: DEFAULT_SIGNIFICANCE,
        }
    }
}

impl PipelineConfig {
    /// Read a configuration file; keys it leaves out keep their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, column) in [
            ("period", &self.columns.period),
            ("value", &self.columns.value),
            ("direction", &self.columns.direction),
        ] {
            if column.trim().is_empty() {
                return Err(ForecastError::InvalidParameter(format!(
                    "{} column name is empty",
                    name
                )));
            }
        }
        if !(self.significance > 0.0 && self.significance < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "significance must be in (0, 1), got {}",
                self.significance
            )));
        }
        self.space.validate()?;
        self.fit.validate()?;
        self.search.validate()
    }
}
