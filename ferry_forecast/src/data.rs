//! Ridership data handling: tabular input and calendar time series

use crate::error::{ForecastError, Result};
use crate::utils::date_parser;
use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Calendar resolution of an aggregated series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Daily,
    Monthly,
}

impl Resolution {
    /// Truncate a date to the start of its period
    pub fn truncate(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Resolution::Daily => date,
            Resolution::Monthly => date.with_day(1).unwrap_or(date),
        }
    }

    /// The period immediately after `period`
    pub fn next(&self, period: NaiveDate) -> NaiveDate {
        self.advance(period, 1)
    }

    /// The period `steps` periods after `period`
    pub fn advance(&self, period: NaiveDate, steps: usize) -> NaiveDate {
        match self {
            Resolution::Daily => period + Days::new(steps as u64),
            Resolution::Monthly => period + Months::new(steps as u32),
        }
    }

    /// Whether `period` is already aligned to this resolution
    pub fn is_aligned(&self, period: NaiveDate) -> bool {
        self.truncate(period) == period
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Daily => write!(f, "daily"),
            Resolution::Monthly => write!(f, "monthly"),
        }
    }
}

/// A gap-free calendar series: one value per period, periods strictly
/// increasing on the grid of `resolution`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    resolution: Resolution,
    periods: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Create a series, checking that the periods form a contiguous grid
    pub fn new(resolution: Resolution, periods: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if periods.len() != values.len() {
            return Err(ForecastError::InvalidParameter(format!(
                "periods length ({}) doesn't match values length ({})",
                periods.len(),
                values.len()
            )));
        }

        if let Some(period) = periods.iter().find(|p| !resolution.is_aligned(**p)) {
            return Err(ForecastError::InvalidParameter(format!(
                "period {} is not aligned to {} resolution",
                period, resolution
            )));
        }

        if let Some(pair) = periods.windows(2).find(|w| resolution.next(w[0]) != w[1]) {
            return Err(ForecastError::InvalidParameter(format!(
                "periods {} and {} are not consecutive {} periods",
                pair[0], pair[1], resolution
            )));
        }

        Ok(Self {
            resolution,
            periods,
            values,
        })
    }

    /// Create a series of consecutive periods starting at `start`
    pub fn from_values(resolution: Resolution, start: NaiveDate, values: Vec<f64>) -> Result<Self> {
        let start = resolution.truncate(start);
        let periods = (0..values.len())
            .map(|i| resolution.advance(start, i))
            .collect();
        Self::new(resolution, periods, values)
    }

    /// An empty series
    pub fn empty(resolution: Resolution) -> Self {
        Self {
            resolution,
            periods: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn periods(&self) -> &[NaiveDate] {
        &self.periods
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// First period, if any
    pub fn start(&self) -> Option<NaiveDate> {
        self.periods.first().copied()
    }

    /// Last period, if any
    pub fn end(&self) -> Option<NaiveDate> {
        self.periods.last().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(period, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.periods.iter().copied().zip(self.values.iter().copied())
    }

    /// Get a slice of the series from start to end index
    pub fn slice(&self, start: usize, end: Option<usize>) -> Result<Self> {
        let end = end.unwrap_or(self.len());
        if start > end || end > self.len() {
            return Err(ForecastError::InvalidParameter(format!(
                "slice {}..{} out of bounds for series of length {}",
                start,
                end,
                self.len()
            )));
        }

        Ok(Self {
            resolution: self.resolution,
            periods: self.periods[start..end].to_vec(),
            values: self.values[start..end].to_vec(),
        })
    }

    /// The first `n` periods (all of them if the series is shorter)
    pub fn head(&self, n: usize) -> Self {
        let end = n.min(self.len());
        Self {
            resolution: self.resolution,
            periods: self.periods[..end].to_vec(),
            values: self.values[..end].to_vec(),
        }
    }

    /// Split into a leading train part and trailing test part at `train_ratio`
    pub fn split_at_ratio(&self, train_ratio: f64) -> Result<(Self, Self)> {
        if !(train_ratio > 0.0 && train_ratio < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "train ratio must be in (0, 1), got {}",
                train_ratio
            )));
        }
        let boundary = (self.len() as f64 * train_ratio).floor() as usize;
        Ok((self.slice(0, Some(boundary))?, self.slice(boundary, None)?))
    }

    /// Append `other`, which must start right after this series ends
    pub fn concat(&self, other: &Self) -> Result<Self> {
        if self.resolution != other.resolution {
            return Err(ForecastError::InvalidParameter(format!(
                "cannot join {} series with {} series",
                self.resolution, other.resolution
            )));
        }

        let mut periods = self.periods.clone();
        periods.extend_from_slice(&other.periods);
        let mut values = self.values.clone();
        values.extend_from_slice(&other.values);

        Self::new(self.resolution, periods, values)
    }

    /// Mean of the values
    pub fn mean(&self) -> Result<f64> {
        ferry_math::mean(&self.values)
            .ok_or_else(|| ForecastError::EmptyResult("series has no values".to_string()))
    }

    /// Population standard deviation of the values
    pub fn std_dev(&self) -> Result<f64> {
        ferry_math::std_dev(&self.values)
            .ok_or_else(|| ForecastError::EmptyResult("series has no values".to_string()))
    }

    /// The `horizon` periods following the end of the series
    pub fn future_periods(&self, horizon: usize) -> Result<Vec<NaiveDate>> {
        let end = self
            .end()
            .ok_or_else(|| ForecastError::EmptyResult("series has no periods".to_string()))?;
        Ok((1..=horizon)
            .map(|step| self.resolution.advance(end, step))
            .collect())
    }
}

/// One raw observation from a cleaned ridership file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Observation time (hourly in the source data)
    pub timestamp: NaiveDateTime,
    /// Direction code, e.g. `s1`
    pub direction: String,
    /// Boarding passengers; the cleaner writes `-1` for missing values
    pub passengers: i64,
}

impl RawRecord {
    pub fn new(timestamp: NaiveDateTime, direction: impl Into<String>, passengers: i64) -> Self {
        Self {
            timestamp,
            direction: direction.into(),
            passengers,
        }
    }
}

/// Headers plus raw string rows of one tabular input
#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<csv::StringRecord>,
    source: Option<PathBuf>,
}

impl Table {
    /// Create a table from headers and rows (rows may be ragged)
    pub fn new<H, R, S>(headers: H, rows: R) -> Self
    where
        H: IntoIterator<Item = S>,
        R: IntoIterator<Item = Vec<S>>,
        S: AsRef<str>,
    {
        Self {
            headers: headers
                .into_iter()
                .map(|h| h.as_ref().to_string())
                .collect(),
            rows: rows
                .into_iter()
                .map(|row| csv::StringRecord::from(row.iter().map(|c| c.as_ref()).collect::<Vec<_>>()))
                .collect(),
            source: None,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[csv::StringRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Where the table was read from, if it came from a file
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Index of a column by header name (ignoring a UTF-8 byte order mark)
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
    }

    /// Index of a required column
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| ForecastError::MissingColumn {
                column: name.to_string(),
                source_name: self.source_name(),
            })
    }

    fn source_name(&self) -> String {
        self.source
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<memory>".to_string())
    }
}

/// A table loaded for one calendar year
#[derive(Debug, Clone)]
pub struct YearTable {
    pub year: i32,
    pub table: Table,
}

/// Data loader for cleaned ridership files
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a cleaned ridership CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Table> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut table = Self::from_reader(file)?;
        table.source = Some(path.to_path_buf());
        debug!(path = %path.display(), rows = table.len(), "loaded ridership table");
        Ok(table)
    }

    /// Read CSV from any reader; rows that cannot be decoded are skipped
    pub fn from_reader<R: Read>(reader: R) -> Result<Table> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(ForecastError::InputError(
                "input has no header row".to_string(),
            ));
        }

        let mut rows = Vec::new();
        let mut skipped = 0usize;
        for record in csv_reader.records() {
            match record {
                Ok(record) => rows.push(record),
                Err(e) => {
                    skipped += 1;
                    debug!(error = %e, "skipping undecodable row");
                }
            }
        }
        if skipped > 0 {
            debug!(skipped, "rows skipped while reading");
        }

        Ok(Table {
            headers,
            rows,
            source: None,
        })
    }

    /// Load one file per year from `dir`, naming files with `pattern`
    /// where `{year}` is replaced by the year
    ///
    /// A year whose file is missing or unreadable is logged and skipped;
    /// the call only fails when no year could be loaded.
    pub fn load_years<P, I>(dir: P, pattern: &str, years: I) -> Result<Vec<YearTable>>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = i32>,
    {
        let dir = dir.as_ref();
        let mut tables = Vec::new();
        let mut missing = Vec::new();

        for year in years {
            let path = dir.join(pattern.replace("{year}", &year.to_string()));
            match Self::from_csv(&path) {
                Ok(table) => tables.push(YearTable { year, table }),
                Err(e) => {
                    warn!(year, path = %path.display(), error = %e, "found no parsed data for year");
                    missing.push(year);
                }
            }
        }

        if tables.is_empty() {
            return Err(ForecastError::EmptyResult(format!(
                "no data files could be loaded from {} (years tried: {:?})",
                dir.display(),
                missing
            )));
        }

        Ok(tables)
    }
}

/// Parse a timestamp cell
pub(crate) fn parse_period(raw: &str) -> Option<NaiveDateTime> {
    date_parser::parse_timestamp(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_monthly_advance_crosses_year() {
        assert_eq!(Resolution::Monthly.advance(ymd(2023, 11, 1), 3), ymd(2024, 2, 1));
        assert_eq!(Resolution::Monthly.truncate(ymd(2024, 2, 29)), ymd(2024, 2, 1));
        assert_eq!(Resolution::Daily.next(ymd(2024, 2, 28)), ymd(2024, 2, 29));
    }

    #[test]
    fn test_new_rejects_gaps() {
        let periods = vec![ymd(2024, 1, 1), ymd(2024, 3, 1)];
        assert!(TimeSeries::new(Resolution::Monthly, periods, vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn test_new_rejects_unaligned_month() {
        let periods = vec![ymd(2024, 1, 15)];
        assert!(TimeSeries::new(Resolution::Monthly, periods, vec![1.0]).is_err());
    }

    #[test]
    fn test_concat_requires_adjacent_series() {
        let a = TimeSeries::from_values(Resolution::Monthly, ymd(2023, 1, 1), vec![1.0; 12]).unwrap();
        let b = TimeSeries::from_values(Resolution::Monthly, ymd(2024, 1, 1), vec![2.0; 12]).unwrap();
        let joined = a.concat(&b).unwrap();
        assert_eq!(joined.len(), 24);
        assert!(b.concat(&a).is_err());
    }

    #[test]
    fn test_future_periods() {
        let s = TimeSeries::from_values(Resolution::Monthly, ymd(2024, 1, 1), vec![1.0; 12]).unwrap();
        let future = s.future_periods(2).unwrap();
        assert_eq!(future, vec![ymd(2025, 1, 1), ymd(2025, 2, 1)]);
    }

    #[test]
    fn test_column_lookup_ignores_bom() {
        let table = Table::new(vec!["\u{feff}PÄIVÄMÄÄRÄ", "SUUNTA"], Vec::<Vec<&str>>::new());
        assert_eq!(table.column_index("PÄIVÄMÄÄRÄ"), Some(0));
        assert!(table.require_column("NOUSIJAT").is_err());
    }
}
