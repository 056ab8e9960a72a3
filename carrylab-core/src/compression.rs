//! Compression score and expansion trigger.
//!
//! The score is a weighted blend of three contraction measures, each clipped to
//! [0, 1]: ATR vs its trailing mean, bar range vs its trailing mean, and the
//! volatility percentile sitting below a low threshold. A component without
//! history drops out and the remaining weights are renormalized.
//!
//! The expansion trigger fires on a bullish breakout above the prior rolling
//! high after a confirmed compression streak.

use serde::{Deserialize, Serialize};

use crate::config::{self, ConfigError};
use crate::features::{volatility_features_from_close, Trend};
use crate::indicators::{
    atr, require_same_len, rolling_max, rolling_mean_skip_gaps, rolling_min, AtrSmoothing,
    IndicatorError,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub atr_window: usize,
    pub contraction_lookback: usize,
    pub vol_pct_window: usize,
    pub vol_pct_low_threshold: f64,
    pub weight_atr: f64,
    pub weight_range: f64,
    pub weight_vol: f64,
    pub range_window: usize,
    pub breakout_confirm: usize,
    pub vol_expand_threshold: f64,
    pub score_trigger: f64,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            atr_window: 14,
            contraction_lookback: 50,
            vol_pct_window: 252,
            vol_pct_low_threshold: 0.4,
            weight_atr: 0.4,
            weight_range: 0.4,
            weight_vol: 0.2,
            range_window: 50,
            breakout_confirm: 1,
            vol_expand_threshold: 0.7,
            score_trigger: 0.6,
        }
    }
}

impl CompressionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        config::window("atr_window", self.atr_window)?;
        config::window("contraction_lookback", self.contraction_lookback)?;
        config::window("vol_pct_window", self.vol_pct_window)?;
        config::window("range_window", self.range_window)?;
        config::window("breakout_confirm", self.breakout_confirm)?;
        config::unit_open_closed("vol_pct_low_threshold", self.vol_pct_low_threshold)?;
        config::unit_open_closed("vol_expand_threshold", self.vol_expand_threshold)?;
        config::unit_open_closed("score_trigger", self.score_trigger)?;
        config::non_negative("weight_atr", self.weight_atr)?;
        config::non_negative("weight_range", self.weight_range)?;
        config::non_negative("weight_vol", self.weight_vol)?;
        Ok(())
    }
}

/// Per-bar compression outputs. NaN where no component has history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompressionSeries {
    pub score: Vec<f64>,
    /// `rolling_max(high) - rolling_min(low)` over `range_window`.
    pub width: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct CompressionDetector {
    config: CompressionConfig,
}

impl CompressionDetector {
    pub fn new(config: CompressionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    pub fn compression_score(
        &self,
        high: &[f64],
        low: &[f64],
        close: &[f64],
    ) -> Result<CompressionSeries, IndicatorError> {
        require_same_len("compression_score", close.len(), high.len())?;
        require_same_len("compression_score", close.len(), low.len())?;
        let cfg = &self.config;
        if close.is_empty() {
            return Ok(CompressionSeries {
                score: Vec::new(),
                width: Vec::new(),
            });
        }

        let atr_series = atr(high, low, close, cfg.atr_window, AtrSmoothing::Wilder)?;
        let atr_mean = rolling_mean_skip_gaps(&atr_series, cfg.contraction_lookback)?;
        let range: Vec<f64> = high.iter().zip(low).map(|(h, l)| h - l).collect();
        let range_mean = rolling_mean_skip_gaps(&range, cfg.contraction_lookback)?;
        let vol = volatility_features_from_close(
            close,
            cfg.atr_window,
            cfg.vol_pct_window,
            1.0,
            false,
        )?;

        let w_sum = cfg.weight_atr + cfg.weight_range + cfg.weight_vol;
        let norm = |w: f64| if w_sum > 0.0 { w / w_sum } else { 0.0 };
        let (w_atr, w_rng, w_vol) = (
            norm(cfg.weight_atr),
            norm(cfg.weight_range),
            norm(cfg.weight_vol),
        );

        let mut score = vec![f64::NAN; close.len()];
        for i in 0..close.len() {
            let mut comp = 0.0;
            let mut weight = 0.0;

            let (a, am) = (atr_series[i], atr_mean[i]);
            if !a.is_nan() && !am.is_nan() && am > 0.0 {
                comp += w_atr * (1.0 - a / am).clamp(0.0, 1.0);
                weight += w_atr;
            }

            let rm = range_mean[i];
            if !rm.is_nan() && rm > 0.0 {
                comp += w_rng * (1.0 - range[i] / rm).clamp(0.0, 1.0);
                weight += w_rng;
            }

            let vp = vol.vol_percentile[i];
            if !vp.is_nan() {
                let thr = cfg.vol_pct_low_threshold;
                comp += w_vol * ((thr - vp) / thr).clamp(0.0, 1.0);
                weight += w_vol;
            }

            if weight > 0.0 {
                score[i] = comp / weight;
            }
        }

        let hi_roll = rolling_max(high, cfg.range_window)?;
        let lo_roll = rolling_min(low, cfg.range_window)?;
        let width = hi_roll.iter().zip(&lo_roll).map(|(h, l)| h - l).collect();

        Ok(CompressionSeries { score, width })
    }

    /// Bullish breakout after compression.
    ///
    /// A bar counts as compressed when its score is at least `score_trigger`.
    /// Once `breakout_confirm` consecutive compressed bars have been seen the
    /// compression latch is set; the first non-compressed bar is still checked
    /// for a breakout and then clears the latch. Bar `i` triggers when the latch
    /// is set, `close[i]` exceeds the rolling high as of bar `i - 1`,
    /// `vol_pct[i] >= vol_expand_threshold`, and the trend is up.
    pub fn expansion_trigger(
        &self,
        close: &[f64],
        high: &[f64],
        vol_pct: &[f64],
        trend: &[Trend],
        score: &[f64],
    ) -> Result<Vec<bool>, IndicatorError> {
        let n = close.len();
        require_same_len("expansion_trigger", n, high.len())?;
        require_same_len("expansion_trigger", n, vol_pct.len())?;
        require_same_len("expansion_trigger", n, trend.len())?;
        require_same_len("expansion_trigger", n, score.len())?;
        let cfg = &self.config;

        let hi_roll = rolling_max(high, cfg.range_window)?;
        let mut trigger = vec![false; n];
        let mut streak = 0usize;
        let mut was_compressed = false;
        for i in 0..n {
            let compressed = !score[i].is_nan() && score[i] >= cfg.score_trigger;
            streak = if compressed { streak + 1 } else { 0 };
            if streak >= cfg.breakout_confirm {
                was_compressed = true;
            }

            if i > 0 {
                let prev_hi = hi_roll[i - 1];
                let v = vol_pct[i];
                if was_compressed
                    && !prev_hi.is_nan()
                    && !v.is_nan()
                    && close[i] > prev_hi
                    && v >= cfg.vol_expand_threshold
                    && trend[i].is_up()
                {
                    trigger[i] = true;
                }
            }

            if !compressed {
                was_compressed = false;
            }
        }
        Ok(trigger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{trend_signal, TrendMethod};

    #[test]
    fn defaults_validate() {
        assert!(CompressionConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_config() {
        let cfg = CompressionConfig {
            score_trigger: 0.0,
            ..Default::default()
        };
        assert!(CompressionDetector::new(cfg).is_err());
        let cfg = CompressionConfig {
            weight_vol: -0.1,
            ..Default::default()
        };
        assert!(CompressionDetector::new(cfg).is_err());
        let cfg = CompressionConfig {
            range_window: 0,
            ..Default::default()
        };
        assert!(matches!(
            CompressionDetector::new(cfg),
            Err(ConfigError::ZeroWindow { field: "range_window" })
        ));
    }

    #[test]
    fn score_higher_in_tight_range() {
        // First half wide bars, second half tight bars.
        let close: Vec<f64> = (0..20).map(|i| 100.0 + i as f64 * 0.1).collect();
        let half = |i: usize| if i < 10 { 2.0 } else { 0.2 };
        let high: Vec<f64> = close.iter().enumerate().map(|(i, c)| c + half(i)).collect();
        let low: Vec<f64> = close.iter().enumerate().map(|(i, c)| c - half(i)).collect();

        let det = CompressionDetector::new(CompressionConfig {
            atr_window: 3,
            contraction_lookback: 5,
            vol_pct_window: 5,
            range_window: 5,
            ..Default::default()
        })
        .unwrap();
        let out = det.compression_score(&high, &low, &close).unwrap();
        assert_eq!(out.score.len(), close.len());
        assert_eq!(out.width.len(), close.len());

        let mean = |s: &[f64]| {
            let v: Vec<f64> = s.iter().copied().filter(|x| !x.is_nan()).collect();
            assert!(!v.is_empty());
            v.iter().sum::<f64>() / v.len() as f64
        };
        assert!(mean(&out.score[18..20]) > mean(&out.score[8..10]));
        assert!(out
            .score
            .iter()
            .filter(|s| !s.is_nan())
            .all(|&s| (0.0..=1.0).contains(&s)));
    }

    #[test]
    fn width_is_rolling_range() {
        let high = [11.0, 12.0, 13.0, 12.5];
        let low = [9.0, 10.0, 11.5, 11.0];
        let close = [10.0, 11.0, 12.0, 12.0];
        let det = CompressionDetector::new(CompressionConfig {
            range_window: 2,
            atr_window: 2,
            contraction_lookback: 2,
            vol_pct_window: 2,
            ..Default::default()
        })
        .unwrap();
        let out = det.compression_score(&high, &low, &close).unwrap();
        assert!(out.width[0].is_nan());
        assert_eq!(out.width[1], 3.0);
        assert_eq!(out.width[2], 3.0);
        assert_eq!(out.width[3], 2.0);
    }

    #[test]
    fn trigger_fires_after_compression_breakout() {
        let mut close: Vec<f64> = (0..10).map(|i| 100.0 + i as f64 * 0.2).collect();
        close.extend(std::iter::repeat(102.0).take(10));
        close.extend([105.0, 108.0]);
        let spread = |i: usize| {
            if i < 10 {
                2.0
            } else if i < 20 {
                0.2
            } else {
                1.0
            }
        };
        let high: Vec<f64> = close.iter().enumerate().map(|(i, c)| c + spread(i)).collect();
        let low: Vec<f64> = close.iter().enumerate().map(|(i, c)| c - spread(i)).collect();

        let det = CompressionDetector::new(CompressionConfig {
            atr_window: 3,
            contraction_lookback: 10,
            vol_pct_window: 5,
            range_window: 10,
            breakout_confirm: 2,
            score_trigger: 0.05,
            vol_expand_threshold: 0.2,
            vol_pct_low_threshold: 0.8,
            ..Default::default()
        })
        .unwrap();
        let score = det.compression_score(&high, &low, &close).unwrap().score;
        let vol = volatility_features_from_close(&close, 3, 5, 1.0, false).unwrap();
        let trend = trend_signal(&close, TrendMethod::Sma, 3, 0.0).unwrap();

        let trig = det
            .expansion_trigger(&close, &high, &vol.vol_percentile, &trend, &score)
            .unwrap();
        assert_eq!(trig.len(), close.len());
        assert!(trig[close.len() - 3..].iter().any(|&t| t));
        assert!(!trig[0]);
    }

    #[test]
    fn no_trigger_without_compression() {
        let close = [100.0, 101.0, 102.0, 103.0];
        let high = [100.5, 101.5, 102.5, 103.5];
        let det = CompressionDetector::new(CompressionConfig {
            range_window: 1,
            ..Default::default()
        })
        .unwrap();
        let trig = det
            .expansion_trigger(
                &close,
                &high,
                &[0.9; 4],
                &[Trend::Up; 4],
                &[f64::NAN; 4],
            )
            .unwrap();
        assert!(trig.iter().all(|&t| !t));
    }

    #[test]
    fn latch_clears_after_non_compressed_bar() {
        // Compressed on bar 1 only; bar 2 is a non-compressed bar without a
        // breakout, so the breakout on bar 3 must not fire.
        let close = [100.0, 100.0, 100.0, 110.0];
        let high = [100.0, 100.0, 100.0, 110.0];
        let det = CompressionDetector::new(CompressionConfig {
            range_window: 1,
            score_trigger: 0.5,
            ..Default::default()
        })
        .unwrap();
        let score = [0.0, 0.9, 0.0, 0.0];
        let trig = det
            .expansion_trigger(&close, &high, &[0.9; 4], &[Trend::Up; 4], &score)
            .unwrap();
        assert_eq!(trig, vec![false, false, false, false]);

        // Breakout directly on the first non-compressed bar fires.
        let score = [0.0, 0.9, 0.9, 0.0];
        let trig = det
            .expansion_trigger(&close, &high, &[0.9; 4], &[Trend::Up; 4], &score)
            .unwrap();
        assert!(trig[3]);
    }
}
