//! Utility functions for the ferry_forecast crate

use crate::data::{Resolution, TimeSeries};
use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Date and timestamp parsing for the cleaned ridership files
pub mod date_parser {
    use chrono::{DateTime, NaiveDate, NaiveDateTime};

    const DATETIME_FORMATS: [&str; 5] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%d.%m.%Y %H:%M",
    ];

    const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d.%m.%Y", "%Y/%m/%d"];

    /// Parse a timestamp, accepting plain dates as midnight
    pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.naive_utc());
        }

        for format in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(dt);
            }
        }

        parse_date(raw).and_then(|date| date.and_hms_opt(0, 0, 0))
    }

    /// Parse a calendar date
    pub fn parse_date(raw: &str) -> Option<NaiveDate> {
        let raw = raw.trim();
        DATE_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
    }
}

/// Generate a monthly ridership-like series with a summer peak
///
/// Values follow `base * (1 + amplitude * seasonal(month)) + noise`, where the
/// seasonal shape peaks in July. The generator is seeded so tests and
/// examples are reproducible.
pub fn generate_seasonal_series(
    start: NaiveDate,
    months: usize,
    base: f64,
    amplitude: f64,
    noise_sd: f64,
    seed: u64,
) -> Result<TimeSeries> {
    let noise = Normal::new(0.0, noise_sd.max(0.0)).map_err(|e| {
        ForecastError::InvalidParameter(format!("noise standard deviation: {}", e))
    })?;
    let mut rng = StdRng::seed_from_u64(seed);

    let start = Resolution::Monthly.truncate(start);
    let values = (0..months)
        .map(|i| {
            let period = Resolution::Monthly.advance(start, i);
            let month = chrono::Datelike::month0(&period) as f64;
            let seasonal = (2.0 * std::f64::consts::PI * (month - 3.5) / 12.0).sin();
            let value = base * (1.0 + amplitude * seasonal) + noise.sample(&mut rng);
            value.max(0.0).round()
        })
        .collect();

    TimeSeries::from_values(Resolution::Monthly, start, values)
}

#[cfg(test)]
mod tests {
    use super::date_parser::{parse_date, parse_timestamp};
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_formats() {
        let ts = parse_timestamp("2024-03-05 14:00:00").unwrap();
        assert_eq!((ts.month(), ts.day(), ts.hour()), (3, 5, 14));

        let ts = parse_timestamp("2024-03-05").unwrap();
        assert_eq!(ts.hour(), 0);

        let date = parse_date("05.03.2024").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2024, 3, 5));

        assert!(parse_timestamp("not a date").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_generated_series_peaks_in_summer() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let series = generate_seasonal_series(start, 24, 1000.0, 0.5, 0.0, 7).unwrap();
        assert_eq!(series.len(), 24);

        let values = series.values();
        let july = values[6];
        let january = values[0];
        assert!(july > january);
        assert_eq!(values[6], values[18]);
    }
}
