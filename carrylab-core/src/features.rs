//! Feature pipeline: trend signal and price-aligned volatility features.

use serde::{Deserialize, Serialize};

use crate::indicators::{
    ema, log_returns, realized_volatility, sma, volatility_percentile, IndicatorError,
};

/// Moving average used by the trend signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendMethod {
    #[default]
    Sma,
    Ema,
}

/// Close relative to its moving average, with a dead-zone band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Down,
    Flat,
    Up,
}

impl Trend {
    pub fn as_i8(self) -> i8 {
        match self {
            Trend::Down => -1,
            Trend::Flat => 0,
            Trend::Up => 1,
        }
    }

    pub fn is_up(self) -> bool {
        self == Trend::Up
    }
}

/// Per-bar trend: `Up` if `close > ma * (1 + band)`, `Down` if
/// `close < ma * (1 - band)`, otherwise (or while the MA warms up) `Flat`.
pub fn trend_signal(
    close: &[f64],
    method: TrendMethod,
    window_or_span: usize,
    band: f64,
) -> Result<Vec<Trend>, IndicatorError> {
    if !(band.is_finite() && band >= 0.0) {
        return Err(IndicatorError::InvalidParameter {
            name: "trend_signal",
            param: "band",
            reason: format!("must be finite and >= 0, got {band}"),
        });
    }
    let ma = match method {
        TrendMethod::Sma => sma(close, window_or_span)?,
        TrendMethod::Ema => ema(close, window_or_span)?,
    };
    Ok(close
        .iter()
        .zip(&ma)
        .map(|(&c, &m)| {
            if m.is_nan() {
                Trend::Flat
            } else if c > m * (1.0 + band) {
                Trend::Up
            } else if c < m * (1.0 - band) {
                Trend::Down
            } else {
                Trend::Flat
            }
        })
        .collect())
}

/// Volatility features aligned to the close series.
///
/// `log_returns` is one shorter than the closes; `realized_vol` and
/// `vol_percentile` are padded with NaN at the front so index `i` refers to
/// bar `i`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolatilityFeatures {
    pub log_returns: Vec<f64>,
    pub realized_vol: Vec<f64>,
    pub vol_percentile: Vec<f64>,
}

impl VolatilityFeatures {
    /// `None` while either feature lacks history.
    pub fn at(&self, i: usize) -> Option<(f64, f64)> {
        let rv = *self.realized_vol.get(i)?;
        let vp = *self.vol_percentile.get(i)?;
        if rv.is_nan() || vp.is_nan() {
            None
        } else {
            Some((rv, vp))
        }
    }
}

pub fn volatility_features_from_close(
    close: &[f64],
    rv_window: usize,
    vol_percentile_window: usize,
    annualization_factor: f64,
    demean: bool,
) -> Result<VolatilityFeatures, IndicatorError> {
    let rets = log_returns(close)?;
    let rv = realized_volatility(&rets, rv_window, annualization_factor, demean)?;

    let mut realized_vol = vec![f64::NAN; close.len()];
    for (i, &v) in rv.iter().enumerate() {
        realized_vol[i + 1] = v;
    }

    // Rank only over bars that have a realized vol, then map back.
    let mut vol_percentile = vec![f64::NAN; close.len()];
    if let Some(first) = realized_vol.iter().position(|v| !v.is_nan()) {
        let ranks = volatility_percentile(&realized_vol[first..], vol_percentile_window)?;
        for (k, &p) in ranks.iter().enumerate() {
            vol_percentile[first + k] = p;
        }
    }

    Ok(VolatilityFeatures {
        log_returns: rets,
        realized_vol,
        vol_percentile,
    })
}
