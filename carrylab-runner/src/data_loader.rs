//! Strict CSV loader for perp series.
//!
//! Expected header: `timestamp,open,high,low,close,volume` plus optional
//! `funding` and `open_interest` columns. Timestamps are RFC 3339 or integer
//! epoch seconds / milliseconds. Rows are taken as-is: no gap filling, no
//! resampling, no reordering. Any frame violation is an error.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use carrylab_core::{PriceSeries, SeriesError};

/// Epoch values at or above this are read as milliseconds.
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: unparseable timestamp '{value}'")]
    Timestamp { row: usize, value: String },

    #[error("row {row}: missing value in column '{column}'")]
    MissingValue { row: usize, column: &'static str },

    #[error("series has no rows")]
    Empty,

    #[error("invalid series: {0}")]
    Series(#[from] SeriesError),
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    #[serde(default)]
    funding: Option<f64>,
    #[serde(default)]
    open_interest: Option<f64>,
}

/// Read a series from any CSV source.
pub fn load_series_csv<R: Read>(reader: R) -> Result<PriceSeries, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let has_funding = headers.iter().any(|h| h == "funding");
    let has_oi = headers.iter().any(|h| h == "open_interest");

    let mut timestamps = Vec::new();
    let mut open = Vec::new();
    let mut high = Vec::new();
    let mut low = Vec::new();
    let mut close = Vec::new();
    let mut volume = Vec::new();
    let mut funding = Vec::new();
    let mut open_interest = Vec::new();

    for (row, record) in rdr.deserialize::<CsvRow>().enumerate() {
        let r = record?;
        timestamps.push(parse_timestamp(&r.timestamp).ok_or_else(|| LoadError::Timestamp {
            row,
            value: r.timestamp.clone(),
        })?);
        open.push(r.open);
        high.push(r.high);
        low.push(r.low);
        close.push(r.close);
        volume.push(r.volume);
        if has_funding {
            funding.push(r.funding.ok_or(LoadError::MissingValue {
                row,
                column: "funding",
            })?);
        }
        if has_oi {
            open_interest.push(r.open_interest.ok_or(LoadError::MissingValue {
                row,
                column: "open_interest",
            })?);
        }
    }

    if timestamps.is_empty() {
        return Err(LoadError::Empty);
    }

    let mut series = PriceSeries::new(timestamps, open, high, low, close, volume)?;
    if has_funding {
        series = series.with_funding(funding)?;
    }
    if has_oi {
        series = series.with_open_interest(open_interest)?;
    }
    Ok(series)
}

pub fn load_series_csv_path(path: &Path) -> Result<PriceSeries, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_series_csv(std::io::BufReader::new(file))
}

/// RFC 3339, or an integer epoch in seconds or milliseconds.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    let epoch: i64 = value.parse().ok()?;
    if epoch.abs() >= MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(epoch)
    } else {
        DateTime::from_timestamp(epoch, 0)
    }
}
