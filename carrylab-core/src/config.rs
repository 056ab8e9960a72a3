//! Configuration validation shared by every component config.
//!
//! Configs are plain structs with public fields and `Default` impls. Each one
//! exposes `validate()`, and the component that consumes it validates at
//! construction, so a bad value fails before the first bar is simulated.

use thiserror::Error;

/// A configuration bound violation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be > 0, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{field} must be >= 0, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} must be finite, got {value}")]
    NotFinite { field: &'static str, value: f64 },

    #[error("{field} must be in {range}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        range: &'static str,
    },

    #[error("{field} must be a positive integer, got 0")]
    ZeroWindow { field: &'static str },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub(crate) fn finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotFinite { field, value })
    }
}

pub(crate) fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

pub(crate) fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

pub(crate) fn window(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        Err(ConfigError::ZeroWindow { field })
    } else {
        Ok(())
    }
}

/// `value ∈ (0, 1]`
pub(crate) fn unit_open_closed(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            range: "(0, 1]",
        })
    }
}

/// `value ∈ [0, 1]`
pub(crate) fn unit_closed(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            range: "[0, 1]",
        })
    }
}

/// `value ∈ [0, 1)`
pub(crate) fn unit_closed_open(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            range: "[0, 1)",
        })
    }
}

/// `value ∈ (0, 1)`
pub(crate) fn unit_open(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            range: "(0, 1)",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_bounds() {
        assert!(unit_open_closed("x", 1.0).is_ok());
        assert!(unit_open_closed("x", 0.0).is_err());
        assert!(unit_closed("x", 0.0).is_ok());
        assert!(unit_closed("x", 1.01).is_err());
        assert!(unit_closed_open("x", 0.0).is_ok());
        assert!(unit_closed_open("x", 1.0).is_err());
        assert!(unit_open("x", 0.5).is_ok());
        assert!(unit_open("x", 1.0).is_err());
        assert!(unit_open_closed("x", f64::NAN).is_err());
    }

    #[test]
    fn positive_rejects_zero_and_nan() {
        assert_eq!(
            positive("leverage_cap", 0.0),
            Err(ConfigError::NotPositive {
                field: "leverage_cap",
                value: 0.0
            })
        );
        assert!(matches!(
            positive("leverage_cap", f64::INFINITY),
            Err(ConfigError::NotFinite { .. })
        ));
        assert!(non_negative("fee", 0.0).is_ok());
        assert!(non_negative("fee", -1.0).is_err());
        assert!(window("w", 0).is_err());
    }

    #[test]
    fn error_messages_name_the_field() {
        let err = unit_open_closed("risk_on_vol_pct_max", 1.5).unwrap_err();
        assert_eq!(
            err.to_string(),
            "risk_on_vol_pct_max must be in (0, 1], got 1.5"
        );
    }
}
