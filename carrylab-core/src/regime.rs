//! Hysteretic regime classifier.
//!
//! `next_regime` is the pure per-bar transition: hard risk-off override,
//! tentative label, funding modifier, then hysteresis keyed on the previous
//! label. `RegimeClassifier` wraps it with the confirm-bars delay for
//! transitions that are not into RISK_OFF.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::{self, ConfigError};
use crate::domain::{PriceSeries, Regime};
use crate::features::{trend_signal, volatility_features_from_close, Trend, TrendMethod, VolatilityFeatures};
use crate::indicators::IndicatorError;

#[derive(Debug, Error)]
pub enum RegimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Indicator(#[from] IndicatorError),

    #[error("vol_pct must be finite and in (0, 1], got {0}")]
    VolPercentileOutOfRange(f64),

    #[error("funding sign must be -1, 0 or 1, got {0}")]
    InvalidFundingSign(i8),

    #[error("{field} has {actual} values, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundingMode {
    Ignore,
    #[default]
    Sign,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    pub long_ma_window: usize,
    pub trend_method: TrendMethod,
    pub trend_span: usize,
    pub trend_band: f64,
    pub rv_window: usize,
    pub vol_percentile_window: usize,
    pub annualization_factor: f64,
    pub risk_on_vol_pct_max: f64,
    pub risk_off_vol_pct_min: f64,
    pub risk_on_exit_vol_pct: f64,
    pub risk_off_exit_vol_pct: f64,
    pub confirm_bars: usize,
    pub funding_mode: FundingMode,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            long_ma_window: 200,
            trend_method: TrendMethod::Sma,
            trend_span: 200,
            trend_band: 0.0,
            rv_window: 20,
            vol_percentile_window: 252,
            annualization_factor: 1.0,
            risk_on_vol_pct_max: 0.7,
            risk_off_vol_pct_min: 0.9,
            risk_on_exit_vol_pct: 0.8,
            risk_off_exit_vol_pct: 0.8,
            confirm_bars: 3,
            funding_mode: FundingMode::Sign,
        }
    }
}

impl RegimeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        config::window("long_ma_window", self.long_ma_window)?;
        config::window("trend_span", self.trend_span)?;
        config::window("rv_window", self.rv_window)?;
        config::window("vol_percentile_window", self.vol_percentile_window)?;
        config::window("confirm_bars", self.confirm_bars)?;
        config::positive("annualization_factor", self.annualization_factor)?;
        config::non_negative("trend_band", self.trend_band)?;
        config::unit_open_closed("risk_on_vol_pct_max", self.risk_on_vol_pct_max)?;
        config::unit_open_closed("risk_off_vol_pct_min", self.risk_off_vol_pct_min)?;
        config::unit_open_closed("risk_on_exit_vol_pct", self.risk_on_exit_vol_pct)?;
        config::unit_open_closed("risk_off_exit_vol_pct", self.risk_off_exit_vol_pct)?;
        Ok(())
    }

    /// MA length for the configured trend method.
    pub fn trend_window(&self) -> usize {
        match self.trend_method {
            TrendMethod::Sma => self.long_ma_window,
            TrendMethod::Ema => self.trend_span,
        }
    }
}

/// Pure transition for one bar.
pub fn next_regime(
    previous: Regime,
    trend: Trend,
    vol_pct: f64,
    config: &RegimeConfig,
    funding_sign: i8,
) -> Result<Regime, RegimeError> {
    if !(vol_pct.is_finite() && vol_pct > 0.0 && vol_pct <= 1.0) {
        return Err(RegimeError::VolPercentileOutOfRange(vol_pct));
    }
    if !(-1..=1).contains(&funding_sign) {
        return Err(RegimeError::InvalidFundingSign(funding_sign));
    }

    if vol_pct >= config.risk_off_vol_pct_min {
        return Ok(Regime::RiskOff);
    }

    // Positive funding (longs paying) vetoes a RISK_ON entry. Negative
    // funding never upgrades: it can only matter where entry already holds.
    let risk_on_entry = trend.is_up() && vol_pct <= config.risk_on_vol_pct_max;
    let funding_veto = config.funding_mode == FundingMode::Sign && funding_sign > 0;
    let tentative = if risk_on_entry && !funding_veto {
        Regime::RiskOn
    } else {
        Regime::Neutral
    };

    Ok(match previous {
        Regime::RiskOn => {
            if trend != Trend::Down && vol_pct <= config.risk_on_exit_vol_pct {
                Regime::RiskOn
            } else {
                Regime::Neutral
            }
        }
        Regime::RiskOff => {
            if vol_pct >= config.risk_off_exit_vol_pct {
                Regime::RiskOff
            } else {
                Regime::Neutral
            }
        }
        Regime::Neutral => tentative,
    })
}

/// Trend and volatility inputs to the classifier, aligned to the closes.
#[derive(Debug, Clone, PartialEq)]
pub struct RegimeFeatures {
    pub trend: Vec<Trend>,
    pub volatility: VolatilityFeatures,
}

impl RegimeFeatures {
    pub fn compute(close: &[f64], config: &RegimeConfig) -> Result<Self, IndicatorError> {
        let trend = trend_signal(
            close,
            config.trend_method,
            config.trend_window(),
            config.trend_band,
        )?;
        let volatility = volatility_features_from_close(
            close,
            config.rv_window,
            config.vol_percentile_window,
            config.annualization_factor,
            false,
        )?;
        Ok(Self { trend, volatility })
    }

    pub fn len(&self) -> usize {
        self.trend.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trend.is_empty()
    }
}

/// Sign of each funding rate: 1, 0 or -1.
pub fn funding_signs(funding: &[f64]) -> Vec<i8> {
    funding
        .iter()
        .map(|&f| {
            if f > 0.0 {
                1
            } else if f < 0.0 {
                -1
            } else {
                0
            }
        })
        .collect()
}

/// Stateful classifier: previous label plus pending-confirm bookkeeping.
#[derive(Debug, Clone)]
pub struct RegimeClassifier {
    config: RegimeConfig,
    current: Regime,
    pending: Option<Regime>,
    pending_count: usize,
}

impl RegimeClassifier {
    pub fn new(config: RegimeConfig, initial: Regime) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            current: initial,
            pending: None,
            pending_count: 0,
        })
    }

    pub fn current(&self) -> Regime {
        self.current
    }

    pub fn config(&self) -> &RegimeConfig {
        &self.config
    }

    /// Advance one bar. A flat trend or missing percentile repeats the
    /// previous label and clears any pending transition.
    pub fn step(
        &mut self,
        trend: Trend,
        vol_pct: Option<f64>,
        funding_sign: i8,
    ) -> Result<Regime, RegimeError> {
        let v = match vol_pct {
            Some(v) if trend != Trend::Flat => v,
            _ => {
                self.clear_pending();
                return Ok(self.current);
            }
        };

        let desired = next_regime(self.current, trend, v, &self.config, funding_sign)?;
        if desired == self.current {
            self.clear_pending();
            return Ok(self.current);
        }

        if desired == Regime::RiskOff {
            self.commit(desired);
            return Ok(self.current);
        }

        if self.pending == Some(desired) {
            self.pending_count += 1;
        } else {
            self.pending = Some(desired);
            self.pending_count = 1;
        }
        if self.pending_count >= self.config.confirm_bars {
            self.commit(desired);
        }
        Ok(self.current)
    }

    /// Label every bar of precomputed features.
    pub fn classify(
        &mut self,
        features: &RegimeFeatures,
        funding: Option<&[f64]>,
    ) -> Result<Vec<Regime>, RegimeError> {
        let n = features.len();
        let signs = match (self.config.funding_mode, funding) {
            (FundingMode::Sign, Some(f)) => {
                if f.len() != n {
                    return Err(RegimeError::LengthMismatch {
                        field: "funding",
                        expected: n,
                        actual: f.len(),
                    });
                }
                funding_signs(f)
            }
            _ => vec![0; n],
        };

        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let vp = features.volatility.vol_percentile[i];
            let vol_pct = if vp.is_nan() { None } else { Some(vp) };
            out.push(self.step(features.trend[i], vol_pct, signs[i])?);
        }
        Ok(out)
    }

    fn commit(&mut self, next: Regime) {
        debug!(from = %self.current, to = %next, "regime transition");
        self.current = next;
        self.clear_pending();
    }

    fn clear_pending(&mut self) {
        self.pending = None;
        self.pending_count = 0;
    }
}

/// Label a whole series starting from `initial`.
pub fn classify_regimes(
    series: &PriceSeries,
    config: &RegimeConfig,
    initial: Regime,
) -> Result<Vec<Regime>, RegimeError> {
    let mut classifier = RegimeClassifier::new(config.clone(), initial)?;
    let features = RegimeFeatures::compute(series.close(), config)?;
    classifier.classify(&features, series.funding())
}
