//! Stateless numeric primitives.
//!
//! Every function validates its inputs and returns a series aligned to its
//! input. Positions without enough history hold `f64::NAN`, the "no value yet"
//! sentinel; callers treat NaN as "feature unavailable", never as a number.
//! Inputs themselves must be finite.

pub mod atr;
pub mod drawdown;
pub mod ema;
pub mod returns;
pub mod rolling;
pub mod sma;
pub mod volatility;

pub use atr::{atr, true_range, AtrSmoothing};
pub use drawdown::drawdown;
pub use ema::ema;
pub use returns::log_returns;
pub use rolling::{rolling_max, rolling_mean_skip_gaps, rolling_min};
pub use sma::sma;
pub use volatility::{realized_volatility, volatility_percentile};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndicatorError {
    #[error("{name}: window must be > 0")]
    ZeroWindow { name: &'static str },

    #[error("{name}: input[{index}] is not finite ({value})")]
    NonFinite {
        name: &'static str,
        index: usize,
        value: f64,
    },

    #[error("{name}: price[{index}] must be > 0, got {value}")]
    NonPositivePrice {
        name: &'static str,
        index: usize,
        value: f64,
    },

    #[error("{name}: input lengths differ ({expected} vs {actual})")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{name}: high < low at index {index}")]
    HighBelowLow { name: &'static str, index: usize },

    #[error("{name}: invalid {param}: {reason}")]
    InvalidParameter {
        name: &'static str,
        param: &'static str,
        reason: String,
    },
}

pub(crate) fn require_window(name: &'static str, window: usize) -> Result<(), IndicatorError> {
    if window == 0 {
        Err(IndicatorError::ZeroWindow { name })
    } else {
        Ok(())
    }
}

pub(crate) fn require_finite(name: &'static str, values: &[f64]) -> Result<(), IndicatorError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(IndicatorError::NonFinite {
            name,
            index,
            value: values[index],
        }),
        None => Ok(()),
    }
}

pub(crate) fn require_same_len(
    name: &'static str,
    expected: usize,
    actual: usize,
) -> Result<(), IndicatorError> {
    if expected != actual {
        Err(IndicatorError::LengthMismatch {
            name,
            expected,
            actual,
        })
    } else {
        Ok(())
    }
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
