//! Turning cleaned ridership rows into calendar series

use crate::config::ColumnConfig;
use crate::data::{parse_period, RawRecord, Resolution, Table, TimeSeries};
use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Counters collected while building a series
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSummary {
    /// Rows seen in the input tables
    pub rows_read: usize,
    /// Rows dropped because of their direction code
    pub rows_excluded: usize,
    /// Rows dropped because a field could not be parsed or was missing
    pub rows_skipped: usize,
    /// Periods in the resulting grid
    pub periods: usize,
    /// Periods with no rows, filled with zero
    pub zero_filled: usize,
}

impl BuildSummary {
    fn absorb(&mut self, other: &BuildSummary) {
        self.rows_read += other.rows_read;
        self.rows_excluded += other.rows_excluded;
        self.rows_skipped += other.rows_skipped;
    }
}

/// Aggregates raw rows into a gap-free series at a fixed resolution
#[derive(Debug, Clone)]
pub struct SeriesBuilder {
    columns: ColumnConfig,
    resolution: Resolution,
}

impl SeriesBuilder {
    pub fn new(columns: ColumnConfig, resolution: Resolution) -> Self {
        Self {
            columns,
            resolution,
        }
    }

    /// Builder with the default ridership columns at monthly resolution
    pub fn monthly() -> Self {
        Self::new(ColumnConfig::default(), Resolution::Monthly)
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_excluded_directions<I, S>(mut self, directions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.excluded_directions = directions.into_iter().map(Into::into).collect();
        self
    }

    pub fn columns(&self) -> &ColumnConfig {
        &self.columns
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Build a series from one table
    pub fn build(&self, table: &Table) -> Result<TimeSeries> {
        self.build_with_summary(table).map(|(series, _)| series)
    }

    /// Build a series from one table, also returning the row counters
    pub fn build_with_summary(&self, table: &Table) -> Result<(TimeSeries, BuildSummary)> {
        self.build_tables(std::slice::from_ref(table))
    }

    /// Build one series out of the rows of several tables
    pub fn build_tables(&self, tables: &[Table]) -> Result<(TimeSeries, BuildSummary)> {
        let mut summary = BuildSummary::default();
        let mut records = Vec::new();
        for table in tables {
            let (mut table_records, table_summary) = self.records(table)?;
            summary.absorb(&table_summary);
            records.append(&mut table_records);
        }

        let series = self.aggregate(&records)?;
        summary.periods = series.len();
        summary.zero_filled = series.len() - self.occupied_periods(&records);

        debug!(
            rows_read = summary.rows_read,
            rows_excluded = summary.rows_excluded,
            rows_skipped = summary.rows_skipped,
            periods = summary.periods,
            zero_filled = summary.zero_filled,
            "built {} series",
            self.resolution
        );

        Ok((series, summary))
    }

    /// Parse the rows of a table into records, dropping excluded directions
    /// and rows with unusable fields
    pub fn records(&self, table: &Table) -> Result<(Vec<RawRecord>, BuildSummary)> {
        let period_idx = table.require_column(&self.columns.period)?;
        let value_idx = table.require_column(&self.columns.value)?;
        let direction_idx = table.require_column(&self.columns.direction)?;

        let mut summary = BuildSummary::default();
        let mut records = Vec::with_capacity(table.len());

        for row in table.rows() {
            summary.rows_read += 1;

            let Some(direction) = row.get(direction_idx).map(str::trim) else {
                summary.rows_skipped += 1;
                continue;
            };
            if self.is_excluded(direction) {
                summary.rows_excluded += 1;
                continue;
            }

            let timestamp = row.get(period_idx).and_then(parse_period);
            let passengers = row.get(value_idx).and_then(parse_count);
            match (timestamp, passengers) {
                (Some(_), Some(passengers))
                    if passengers < 0 && self.columns.skip_negative_counts =>
                {
                    summary.rows_skipped += 1;
                    debug!(row = ?row, "skipping row with a negative count");
                }
                (Some(timestamp), Some(passengers)) => {
                    records.push(RawRecord::new(timestamp, direction, passengers));
                }
                _ => {
                    summary.rows_skipped += 1;
                    debug!(row = ?row, "skipping row with unparsable period or count");
                }
            }
        }

        Ok((records, summary))
    }

    /// Sum records per period and resample onto a contiguous grid
    pub fn aggregate(&self, records: &[RawRecord]) -> Result<TimeSeries> {
        let totals = self.group(records);

        let (Some(&first), Some(&last)) = (totals.keys().next(), totals.keys().next_back()) else {
            return Err(ForecastError::EmptyResult(
                "no rows passed direction filtering and parsing".to_string(),
            ));
        };

        let mut periods = Vec::new();
        let mut values = Vec::new();
        let mut period = first;
        while period <= last {
            periods.push(period);
            values.push(totals.get(&period).copied().unwrap_or(0.0));
            period = self.resolution.next(period);
        }

        TimeSeries::new(self.resolution, periods, values)
    }

    fn group(&self, records: &[RawRecord]) -> BTreeMap<NaiveDate, f64> {
        let mut totals = BTreeMap::new();
        for record in records.iter().filter(|r| !self.is_excluded(&r.direction)) {
            let period = self.resolution.truncate(record.timestamp.date());
            *totals.entry(period).or_insert(0.0) += record.passengers as f64;
        }
        totals
    }

    fn occupied_periods(&self, records: &[RawRecord]) -> usize {
        self.group(records).len()
    }

    fn is_excluded(&self, direction: &str) -> bool {
        self.columns
            .excluded_directions
            .iter()
            .any(|code| code.eq_ignore_ascii_case(direction))
    }
}

/// Parse a passenger count written as an integer, possibly as `7.0`
fn parse_count(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(count) = raw.parse::<i64>() {
        return Some(count);
    }
    let value = raw.parse::<f64>().ok()?;
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}
