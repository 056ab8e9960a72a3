//! Simple Moving Average.

use super::{require_finite, require_window, IndicatorError};

/// Arithmetic mean of the trailing `window` values.
///
/// The first `window - 1` outputs are NaN. Each window is summed directly so
/// results do not depend on how much history precedes them.
pub fn sma(values: &[f64], window: usize) -> Result<Vec<f64>, IndicatorError> {
    require_window("sma", window)?;
    require_finite("sma", values)?;

    let mut out = vec![f64::NAN; values.len()];
    if values.len() < window {
        return Ok(out);
    }
    for (i, w) in values.windows(window).enumerate() {
        out[i + window - 1] = w.iter().sum::<f64>() / window as f64;
    }
    Ok(out)
}
