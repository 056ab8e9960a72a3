//! Series-level features computed once before the bar loop.
//!
//! None of these depend on portfolio state, so the regime branch (trend,
//! volatility, labels) and the compression score run in parallel.

use crate::compression::{CompressionDetector, CompressionSeries};
use crate::domain::{PriceSeries, Regime};
use crate::regime::{RegimeClassifier, RegimeFeatures};

use super::SimError;

/// Per-bar features aligned to the input series.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    pub regime_features: RegimeFeatures,
    pub regimes: Vec<Regime>,
    pub compression: CompressionSeries,
    pub expansion: Vec<bool>,
}

impl FeatureFrame {
    pub fn len(&self) -> usize {
        self.regimes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regimes.is_empty()
    }

    /// Realized vol at bar `i`, `None` during warmup.
    pub fn realized_vol(&self, i: usize) -> Option<f64> {
        let v = *self.regime_features.volatility.realized_vol.get(i)?;
        (!v.is_nan()).then_some(v)
    }

    /// Vol percentile at bar `i`, `None` during warmup.
    pub fn vol_percentile(&self, i: usize) -> Option<f64> {
        let v = *self.regime_features.volatility.vol_percentile.get(i)?;
        (!v.is_nan()).then_some(v)
    }
}

pub fn precompute_features(
    series: &PriceSeries,
    classifier: &RegimeClassifier,
    detector: &CompressionDetector,
) -> Result<FeatureFrame, SimError> {
    let close = series.close();

    let (regime_branch, compression) = rayon::join(
        || -> Result<(RegimeFeatures, Vec<Regime>), SimError> {
            let features = RegimeFeatures::compute(close, classifier.config())?;
            let regimes = classifier.clone().classify(&features, series.funding())?;
            Ok((features, regimes))
        },
        || detector.compression_score(series.high(), series.low(), close),
    );
    let (regime_features, regimes) = regime_branch?;
    let compression = compression?;

    let expansion = detector.expansion_trigger(
        close,
        series.high(),
        &regime_features.volatility.vol_percentile,
        &regime_features.trend,
        &compression.score,
    )?;

    Ok(FeatureFrame {
        regime_features,
        regimes,
        compression,
        expansion,
    })
}
