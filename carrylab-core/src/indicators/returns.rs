//! Log returns.

use super::IndicatorError;

/// `ln(p[t] / p[t-1])` for t = 1..n. One element shorter than `prices`.
pub fn log_returns(prices: &[f64]) -> Result<Vec<f64>, IndicatorError> {
    for (index, &p) in prices.iter().enumerate() {
        if !p.is_finite() {
            return Err(IndicatorError::NonFinite {
                name: "log_returns",
                index,
                value: p,
            });
        }
        if p <= 0.0 {
            return Err(IndicatorError::NonPositivePrice {
                name: "log_returns",
                index,
                value: p,
            });
        }
    }
    Ok(prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect())
}
