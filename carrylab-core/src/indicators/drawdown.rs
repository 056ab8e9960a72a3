use super::{require_finite, IndicatorError};

/// `value / running_peak - 1`. Always ≤ 0, exactly 0 at a new peak.
pub fn drawdown(values: &[f64]) -> Result<Vec<f64>, IndicatorError> {
    require_finite("drawdown", values)?;
    if let Some(index) = values.iter().position(|&v| v <= 0.0) {
        return Err(IndicatorError::NonPositivePrice {
            name: "drawdown",
            index,
            value: values[index],
        });
    }
    let mut peak = f64::NEG_INFINITY;
    Ok(values
        .iter()
        .map(|&v| {
            peak = peak.max(v);
            v / peak - 1.0
        })
        .collect())
}
