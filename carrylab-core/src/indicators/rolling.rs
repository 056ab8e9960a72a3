//! Rolling window helpers used by the compression detector.

use std::collections::VecDeque;

use super::{require_finite, require_window, IndicatorError};

/// Rolling mean over the last `window` valid values.
///
/// NaN inputs are gaps: a gap resets the window and outputs NaN, so a value is
/// only produced after `window` consecutive valid inputs.
pub fn rolling_mean_skip_gaps(values: &[f64], window: usize) -> Result<Vec<f64>, IndicatorError> {
    require_window("rolling_mean", window)?;
    let mut out = vec![f64::NAN; values.len()];
    let mut buf: VecDeque<f64> = VecDeque::with_capacity(window);
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            buf.clear();
            continue;
        }
        if !v.is_finite() {
            return Err(IndicatorError::NonFinite {
                name: "rolling_mean",
                index: i,
                value: v,
            });
        }
        buf.push_back(v);
        if buf.len() > window {
            buf.pop_front();
        }
        if buf.len() == window {
            out[i] = buf.iter().sum::<f64>() / window as f64;
        }
    }
    Ok(out)
}

/// Rolling maximum via a monotonic deque. NaN until `window` values are seen.
pub fn rolling_max(values: &[f64], window: usize) -> Result<Vec<f64>, IndicatorError> {
    rolling_extreme("rolling_max", values, window, |incoming, back| incoming >= back)
}

/// Rolling minimum via a monotonic deque. NaN until `window` values are seen.
pub fn rolling_min(values: &[f64], window: usize) -> Result<Vec<f64>, IndicatorError> {
    rolling_extreme("rolling_min", values, window, |incoming, back| incoming <= back)
}

fn rolling_extreme(
    name: &'static str,
    values: &[f64],
    window: usize,
    dominates: impl Fn(f64, f64) -> bool,
) -> Result<Vec<f64>, IndicatorError> {
    require_window(name, window)?;
    require_finite(name, values)?;

    let mut out = vec![f64::NAN; values.len()];
    // Indices whose values are strictly monotonic from front (the extreme) to back.
    let mut dq: VecDeque<usize> = VecDeque::new();
    for (i, &v) in values.iter().enumerate() {
        while let Some(&back) = dq.back() {
            if dominates(v, values[back]) {
                dq.pop_back();
            } else {
                break;
            }
        }
        dq.push_back(i);
        if let Some(&front) = dq.front() {
            if front + window <= i {
                dq.pop_front();
            }
        }
        if i + 1 >= window {
            if let Some(&front) = dq.front() {
                out[i] = values[front];
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_mean_resets_on_gap() {
        let r = rolling_mean_skip_gaps(&[1.0, 3.0, f64::NAN, 5.0, 7.0, 9.0], 2).unwrap();
        assert!(r[0].is_nan());
        assert_eq!(r[1], 2.0);
        assert!(r[2].is_nan());
        assert!(r[3].is_nan());
        assert_eq!(r[4], 6.0);
        assert_eq!(r[5], 8.0);
    }

    #[test]
    fn rolling_max_min() {
        let v = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0];
        let hi = rolling_max(&v, 3).unwrap();
        let lo = rolling_min(&v, 3).unwrap();
        assert!(hi[0].is_nan() && hi[1].is_nan());
        assert_eq!(&hi[2..], &[4.0, 4.0, 5.0, 9.0, 9.0]);
        assert_eq!(&lo[2..], &[1.0, 1.0, 1.0, 1.0, 2.0]);
    }

    #[test]
    fn rolling_window_one_is_identity() {
        let v = [2.0, 7.0, 1.0];
        assert_eq!(rolling_max(&v, 1).unwrap(), v.to_vec());
        assert_eq!(rolling_min(&v, 1).unwrap(), v.to_vec());
    }
}
