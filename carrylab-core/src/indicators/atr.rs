//! Average True Range.
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|), with
//! TR[0] = high[0] - low[0]. ATR smooths TR with Wilder's recursion
//! `atr[t] = (atr[t-1]*(w-1) + tr[t]) / w`, seeded at index w-1 with the mean
//! of the first w true ranges, or with a plain SMA.

use serde::{Deserialize, Serialize};

use super::{require_finite, require_same_len, require_window, sma, IndicatorError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtrSmoothing {
    #[default]
    Wilder,
    Sma,
}

pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Result<Vec<f64>, IndicatorError> {
    require_same_len("true_range", high.len(), low.len())?;
    require_same_len("true_range", high.len(), close.len())?;
    require_finite("true_range", high)?;
    require_finite("true_range", low)?;
    require_finite("true_range", close)?;

    let mut tr = Vec::with_capacity(high.len());
    for i in 0..high.len() {
        let (h, l) = (high[i], low[i]);
        if h < l {
            return Err(IndicatorError::HighBelowLow {
                name: "true_range",
                index: i,
            });
        }
        if i == 0 {
            tr.push(h - l);
        } else {
            let pc = close[i - 1];
            tr.push((h - l).max((h - pc).abs()).max((l - pc).abs()));
        }
    }
    Ok(tr)
}

pub fn atr(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    window: usize,
    smoothing: AtrSmoothing,
) -> Result<Vec<f64>, IndicatorError> {
    require_window("atr", window)?;
    let tr = true_range(high, low, close)?;
    match smoothing {
        AtrSmoothing::Sma => sma(&tr, window),
        AtrSmoothing::Wilder => Ok(wilder_smooth(&tr, window)),
    }
}

fn wilder_smooth(tr: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; tr.len()];
    if tr.len() < window {
        return out;
    }
    let w = window as f64;
    let mut prev = tr[..window].iter().sum::<f64>() / w;
    out[window - 1] = prev;
    for i in window..tr.len() {
        prev = (prev * (w - 1.0) + tr[i]) / w;
        out[i] = prev;
    }
    out
}
