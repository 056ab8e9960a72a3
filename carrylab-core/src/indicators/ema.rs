//! Exponential Moving Average.
//!
//! alpha = 2 / (span + 1), seeded with the first observation, so there is no
//! warm-up gap.

use super::{require_finite, require_window, IndicatorError};

pub fn ema(values: &[f64], span: usize) -> Result<Vec<f64>, IndicatorError> {
    require_window("ema", span)?;
    require_finite("ema", values)?;

    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev = match values.first() {
        Some(&v) => v,
        None => return Ok(out),
    };
    out.push(prev);
    for &v in &values[1..] {
        prev += alpha * (v - prev);
        out.push(prev);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn ema_span_2_seeds_with_first() {
        let r = ema(&[1.0, 2.0, 3.0], 2).unwrap();
        assert_approx(r[0], 1.0, DEFAULT_EPSILON);
        assert_approx(r[1], 1.6666666666666665, DEFAULT_EPSILON);
        assert_approx(r[2], 2.5555555555555554, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_span_1_tracks_input() {
        let r = ema(&[3.0, 7.0, 5.0], 1).unwrap();
        assert_eq!(r, vec![3.0, 7.0, 5.0]);
    }

    #[test]
    fn ema_empty() {
        assert!(ema(&[], 10).unwrap().is_empty());
    }
}
