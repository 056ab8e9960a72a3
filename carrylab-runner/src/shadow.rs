//! Shadow replay: drive the control engine bar by bar against `SimVenue`
//! and log what it would have done. No real orders leave the process.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;
use tracing::info;

use carrylab_core::compression::CompressionDetector;
use carrylab_core::config::ConfigError;
use carrylab_core::control::{
    BarSignal, ControlConfig, ControlDecision, ControlEngine, ControlError, SkipReason,
    TargetExposure,
};
use carrylab_core::domain::{PriceSeries, Regime};
use carrylab_core::engine::{precompute_features, SimError};
use carrylab_core::guidance::GuidancePolicy;
use carrylab_core::regime::RegimeClassifier;
use carrylab_core::risk::RiskGovernor;
use carrylab_core::venue::{
    FillReport, OrderRequest, SimVenue, SimVenueConfig, VenueAdapter, VenueError,
};

use crate::config::BacktestConfig;

#[derive(Debug, Error)]
pub enum ShadowError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Features(#[from] SimError),

    #[error(transparent)]
    Venue(#[from] VenueError),

    #[error(transparent)]
    Control(#[from] ControlError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowRunnerConfig {
    pub symbol: String,
    pub target_directional_vol: f64,
    pub min_realized_vol: f64,
    /// Vol percentile at or above which the bar counts as a spike.
    pub vol_spike_threshold: f64,
    pub control: ControlConfig,
    pub venue: SimVenueConfig,
}

impl Default for ShadowRunnerConfig {
    fn default() -> Self {
        Self {
            symbol: "BTC-PERP".to_string(),
            target_directional_vol: 0.20,
            min_realized_vol: 1e-6,
            vol_spike_threshold: 0.90,
            control: ControlConfig::default(),
            venue: SimVenueConfig::default(),
        }
    }
}

impl ShadowRunnerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.is_empty() {
            return Err(ConfigError::Invalid {
                field: "symbol",
                reason: "must not be empty".to_string(),
            });
        }
        if !(self.target_directional_vol.is_finite() && self.target_directional_vol > 0.0) {
            return Err(ConfigError::NotPositive {
                field: "target_directional_vol",
                value: self.target_directional_vol,
            });
        }
        if !(self.min_realized_vol.is_finite() && self.min_realized_vol > 0.0) {
            return Err(ConfigError::NotPositive {
                field: "min_realized_vol",
                value: self.min_realized_vol,
            });
        }
        if !(self.vol_spike_threshold > 0.0 && self.vol_spike_threshold <= 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "vol_spike_threshold",
                value: self.vol_spike_threshold,
                range: "(0, 1]",
            });
        }
        self.control.validate()?;
        self.venue.validate()
    }
}

/// One shadow log line.
///
/// Orders and fills render as compact `side:qty` and `status:qty@price`
/// cells so the row stays flat for CSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShadowLogRow {
    pub timestamp: DateTime<Utc>,
    pub regime: Regime,
    #[serde(serialize_with = "order_cell")]
    pub intended_order: Option<OrderRequest>,
    #[serde(serialize_with = "fill_cell")]
    pub hypothetical_fill: Option<FillReport>,
    #[serde(serialize_with = "fixed6")]
    pub slippage_estimate_bps: f64,
    #[serde(serialize_with = "flag")]
    pub skipped: bool,
    pub reason: Option<SkipReason>,
    pub route_hint: &'static str,
}

impl ShadowLogRow {
    fn from_decision(ts: DateTime<Utc>, d: &ControlDecision) -> Self {
        Self {
            timestamp: ts,
            regime: d.regime,
            intended_order: d.intended_order.clone(),
            hypothetical_fill: d.hypothetical_fill.clone(),
            slippage_estimate_bps: d.slippage_estimate_bps,
            skipped: d.is_skipped(),
            reason: d.skipped,
            route_hint: d.route_hint,
        }
    }
}

// ── CSV cells ──

fn order_cell<S: Serializer>(order: &Option<OrderRequest>, s: S) -> Result<S::Ok, S::Error> {
    match order {
        Some(o) => s.collect_str(&format_args!("{}:{:.6}", o.side.as_str(), o.qty)),
        None => s.serialize_str(""),
    }
}

fn fill_cell<S: Serializer>(fill: &Option<FillReport>, s: S) -> Result<S::Ok, S::Error> {
    match fill {
        Some(f) => s.collect_str(&format_args!(
            "{}:{:.6}@{:.2}",
            f.status.as_str(),
            f.filled_qty,
            f.fill_price
        )),
        None => s.serialize_str(""),
    }
}

fn fixed6<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&format_args!("{v:.6}"))
}

fn flag<S: Serializer>(v: &bool, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u8(u8::from(*v))
}

/// Replay `series` through the control engine using the strategy tables of
/// `config` for features, regimes, guidance and risk.
///
/// The venue is marked at each close with that bar's funding (0 when the
/// series has none), and the close doubles as the oracle price.
pub fn run_shadow(
    series: &PriceSeries,
    config: &BacktestConfig,
) -> Result<Vec<ShadowLogRow>, ShadowError> {
    let cfg = &config.shadow;
    cfg.validate()?;

    let classifier = RegimeClassifier::new(config.regime.clone(), Regime::Neutral)?;
    let detector = CompressionDetector::new(config.compression.clone())?;
    let guidance = GuidancePolicy::new(config.guidance.clone())?;
    let risk = RiskGovernor::new(config.risk.clone())?;
    let features = precompute_features(series, &classifier, &detector)?;

    let venue = SimVenue::new(SimVenueConfig {
        symbol: cfg.symbol.clone(),
        ..cfg.venue.clone()
    })?;
    let mut control = ControlEngine::new(
        venue,
        risk,
        ControlConfig {
            symbol: cfg.symbol.clone(),
            ..cfg.control.clone()
        },
    )?;

    info!(bars = series.len(), symbol = %cfg.symbol, "shadow replay start");
    let close = series.close();
    let funding = series.funding();
    let mut rows = Vec::with_capacity(series.len());
    for (i, &ts) in series.timestamps().iter().enumerate() {
        let mark = close[i];
        let funding_rate = funding.map_or(0.0, |f| f[i]);
        control.venue_mut().set_market(mark, funding_rate)?;

        let equity = control.venue().get_margin_status()?.equity;
        let regime = features.regimes[i];
        let vol_pct = features.vol_percentile(i);
        let vol_scale = features.realized_vol(i).map_or(0.0, |rv| {
            (cfg.target_directional_vol / rv.max(cfg.min_realized_vol)).min(1.0)
        });
        let directional_requested = regime == Regime::RiskOn && features.expansion[i];
        let target_perp_qty = if directional_requested {
            equity * guidance.targets(regime).directional_frac * vol_scale / mark
        } else {
            0.0
        };

        let decision = control.on_bar(BarSignal {
            ts,
            target: TargetExposure {
                target_perp_qty,
                directional_requested,
            },
            regime,
            oracle_price: mark,
            vol_pct,
            vol_spike_active: vol_pct.is_some_and(|v| v >= cfg.vol_spike_threshold),
        })?;
        rows.push(ShadowLogRow::from_decision(ts, &decision));
    }

    let orders = rows.iter().filter(|r| !r.skipped).count();
    info!(bars = rows.len(), orders, "shadow replay complete");
    Ok(rows)
}
