//! Price series: parallel per-bar arrays with frame-level invariants.
//!
//! A `PriceSeries` is validated once at construction and immutable afterwards.
//! Optional series (funding, open interest) cover the whole frame or are absent;
//! there is no per-bar nullability.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("{field} has {actual} values, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{field}[{index}] is not finite ({value})")]
    NonFinite {
        field: &'static str,
        index: usize,
        value: f64,
    },

    #[error("bar {index}: high {high} < low {low}")]
    HighBelowLow { index: usize, high: f64, low: f64 },

    #[error("bar {index}: timestamp {ts} is not after the previous bar")]
    NonIncreasingTimestamp { index: usize, ts: DateTime<Utc> },

    #[error("need at least {required} bars, got {actual}")]
    TooShort { required: usize, actual: usize },
}

/// UTC-aligned OHLCV series with optional funding and open interest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    timestamps: Vec<DateTime<Utc>>,
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
    volume: Vec<f64>,
    funding: Option<Vec<f64>>,
    open_interest: Option<Vec<f64>>,
}

impl PriceSeries {
    pub fn new(
        timestamps: Vec<DateTime<Utc>>,
        open: Vec<f64>,
        high: Vec<f64>,
        low: Vec<f64>,
        close: Vec<f64>,
        volume: Vec<f64>,
    ) -> Result<Self, SeriesError> {
        let n = timestamps.len();
        for (field, values) in [
            ("open", &open),
            ("high", &high),
            ("low", &low),
            ("close", &close),
            ("volume", &volume),
        ] {
            check_column(field, values, n)?;
        }

        for i in 0..n {
            if high[i] < low[i] {
                return Err(SeriesError::HighBelowLow {
                    index: i,
                    high: high[i],
                    low: low[i],
                });
            }
            if i > 0 && timestamps[i] <= timestamps[i - 1] {
                return Err(SeriesError::NonIncreasingTimestamp {
                    index: i,
                    ts: timestamps[i],
                });
            }
        }

        Ok(Self {
            timestamps,
            open,
            high,
            low,
            close,
            volume,
            funding: None,
            open_interest: None,
        })
    }

    /// Build a series from closes only: open = high = low = close, zero volume.
    pub fn from_closes(
        timestamps: Vec<DateTime<Utc>>,
        close: Vec<f64>,
    ) -> Result<Self, SeriesError> {
        let n = close.len();
        Self::new(
            timestamps,
            close.clone(),
            close.clone(),
            close.clone(),
            close,
            vec![0.0; n],
        )
    }

    /// Attach a per-bar funding rate series covering the whole frame.
    pub fn with_funding(mut self, funding: Vec<f64>) -> Result<Self, SeriesError> {
        check_column("funding", &funding, self.len())?;
        self.funding = Some(funding);
        Ok(self)
    }

    /// Attach an open-interest series covering the whole frame.
    pub fn with_open_interest(mut self, open_interest: Vec<f64>) -> Result<Self, SeriesError> {
        check_column("open_interest", &open_interest, self.len())?;
        self.open_interest = Some(open_interest);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn open(&self) -> &[f64] {
        &self.open
    }

    pub fn high(&self) -> &[f64] {
        &self.high
    }

    pub fn low(&self) -> &[f64] {
        &self.low
    }

    pub fn close(&self) -> &[f64] {
        &self.close
    }

    pub fn volume(&self) -> &[f64] {
        &self.volume
    }

    pub fn funding(&self) -> Option<&[f64]> {
        self.funding.as_deref()
    }

    pub fn open_interest(&self) -> Option<&[f64]> {
        self.open_interest.as_deref()
    }

    /// Median inter-bar spacing in seconds.
    ///
    /// The median is robust to the occasional gap in exchange data.
    pub fn timeframe_seconds_inferred(&self) -> Result<f64, SeriesError> {
        if self.len() < 3 {
            return Err(SeriesError::TooShort {
                required: 3,
                actual: self.len(),
            });
        }
        Ok(median_spacing_seconds(&self.timestamps))
    }
}

/// Median of consecutive timestamp deltas, in seconds. Upper median for even counts.
pub fn median_spacing_seconds(timestamps: &[DateTime<Utc>]) -> f64 {
    let mut deltas: Vec<f64> = timestamps
        .windows(2)
        .map(|w| (w[1] - w[0]).num_milliseconds() as f64 / 1000.0)
        .collect();
    if deltas.is_empty() {
        return 0.0;
    }
    deltas.sort_by(f64::total_cmp);
    deltas[deltas.len() / 2]
}

fn check_column(field: &'static str, values: &[f64], expected: usize) -> Result<(), SeriesError> {
    if values.len() != expected {
        return Err(SeriesError::LengthMismatch {
            field,
            expected,
            actual: values.len(),
        });
    }
    if let Some((index, &value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(SeriesError::NonFinite {
            field,
            index,
            value,
        });
    }
    Ok(())
}
