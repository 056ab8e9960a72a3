//! Rolling realized volatility and rolling percentile rank.

use super::{require_finite, require_window, IndicatorError};

/// Rolling RMS of `returns` over `window`, scaled by `sqrt(annualization_factor)`.
///
/// With `demean`, the window mean is removed first (variance floored at 0).
/// The first `window - 1` outputs are NaN.
pub fn realized_volatility(
    returns: &[f64],
    window: usize,
    annualization_factor: f64,
    demean: bool,
) -> Result<Vec<f64>, IndicatorError> {
    require_window("realized_volatility", window)?;
    if !(annualization_factor.is_finite() && annualization_factor > 0.0) {
        return Err(IndicatorError::InvalidParameter {
            name: "realized_volatility",
            param: "annualization_factor",
            reason: format!("must be finite and > 0, got {annualization_factor}"),
        });
    }
    require_finite("realized_volatility", returns)?;

    let mut out = vec![f64::NAN; returns.len()];
    if returns.len() < window {
        return Ok(out);
    }
    let w = window as f64;
    let scale = annualization_factor.sqrt();
    for (i, win) in returns.windows(window).enumerate() {
        let sum_sq: f64 = win.iter().map(|r| r * r).sum();
        let var = if demean {
            let mean = win.iter().sum::<f64>() / w;
            (sum_sq / w - mean * mean).max(0.0)
        } else {
            sum_sq / w
        };
        out[i + window - 1] = var.sqrt() * scale;
    }
    Ok(out)
}

/// Fraction of the trailing `window` values (current included) that are
/// `<= ` the current value. Always in (0, 1]; NaN until the window fills.
pub fn volatility_percentile(series: &[f64], window: usize) -> Result<Vec<f64>, IndicatorError> {
    require_window("volatility_percentile", window)?;
    require_finite("volatility_percentile", series)?;

    let mut out = vec![f64::NAN; series.len()];
    if series.len() < window {
        return Ok(out);
    }
    for (i, win) in series.windows(window).enumerate() {
        let current = win[window - 1];
        let at_or_below = win.iter().filter(|&&q| q <= current).count();
        out[i + window - 1] = at_or_below as f64 / window as f64;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn realized_vol_window_3() {
        let rv = realized_volatility(&[0.0, 0.1, -0.1, 0.2], 3, 1.0, false).unwrap();
        assert!(rv[0].is_nan() && rv[1].is_nan());
        assert_approx(rv[2], (0.02f64 / 3.0).sqrt(), DEFAULT_EPSILON);
        assert_approx(rv[3], (0.06f64 / 3.0).sqrt(), DEFAULT_EPSILON);
    }

    #[test]
    fn realized_vol_annualizes_and_demeans() {
        let rets = [0.01, 0.01, 0.01];
        let plain = realized_volatility(&rets, 3, 4.0, false).unwrap();
        assert_approx(plain[2], 0.02, DEFAULT_EPSILON);
        // Constant returns have zero variance about their mean.
        let demeaned = realized_volatility(&rets, 3, 4.0, true).unwrap();
        assert_approx(demeaned[2], 0.0, 1e-9);
    }

    #[test]
    fn realized_vol_rejects_bad_annualization() {
        assert!(matches!(
            realized_volatility(&[0.1], 1, 0.0, false),
            Err(IndicatorError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn percentile_rank() {
        let p = volatility_percentile(&[1.0, 3.0, 2.0, 4.0], 3).unwrap();
        assert!(p[0].is_nan() && p[1].is_nan());
        assert_approx(p[2], 2.0 / 3.0, DEFAULT_EPSILON);
        assert_approx(p[3], 1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn percentile_counts_ties() {
        let p = volatility_percentile(&[2.0, 2.0, 2.0], 3).unwrap();
        assert_approx(p[2], 1.0, DEFAULT_EPSILON);
    }
}
