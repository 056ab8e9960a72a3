//! Shadow control engine: per-bar target directional perp quantity to one
//! guarded order against a venue.
//!
//! Guards run in a fixed order and the first that fires skips the bar:
//! rebalance interval, invalid price, oracle divergence, volatility spike,
//! minimum quantity, estimated slippage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{self, ConfigError};
use crate::domain::{Regime, RiskMode};
use crate::risk::{RiskError, RiskGovernor};
use crate::venue::{FillReport, FillStatus, OrderRequest, OrderSide, VenueAdapter, VenueError};

#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Venue(#[from] VenueError),

    #[error(transparent)]
    Risk(#[from] RiskError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MevMode {
    #[default]
    Placeholder,
    #[serde(rename = "none")]
    Off,
}

impl MevMode {
    pub fn route_hint(self) -> &'static str {
        match self {
            MevMode::Placeholder => "mev_guard_placeholder",
            MevMode::Off => "direct",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub symbol: String,
    pub rebalance_interval_bars: usize,
    pub max_slippage_bps: f64,
    pub min_order_qty: f64,
    pub oracle_divergence_bps: f64,
    pub mev_mode: MevMode,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            symbol: "BTC-PERP".to_string(),
            rebalance_interval_bars: 1,
            max_slippage_bps: 30.0,
            min_order_qty: 0.0,
            oracle_divergence_bps: 50.0,
            mev_mode: MevMode::Placeholder,
        }
    }
}

impl ControlConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        config::window("rebalance_interval_bars", self.rebalance_interval_bars)?;
        config::non_negative("max_slippage_bps", self.max_slippage_bps)?;
        config::non_negative("min_order_qty", self.min_order_qty)?;
        config::non_negative("oracle_divergence_bps", self.oracle_divergence_bps)?;
        Ok(())
    }
}

/// What the strategy wants on the venue this bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetExposure {
    pub target_perp_qty: f64,
    pub directional_requested: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    RebalanceWait,
    InvalidPrice,
    OracleDivergence,
    VolSpikeActive,
    BelowMinQty,
    SlippageGuard,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::RebalanceWait => "rebalance_wait",
            SkipReason::InvalidPrice => "invalid_price",
            SkipReason::OracleDivergence => "oracle_divergence",
            SkipReason::VolSpikeActive => "vol_spike_active",
            SkipReason::BelowMinQty => "below_min_qty",
            SkipReason::SlippageGuard => "slippage_guard",
        }
    }
}

/// Per-bar input to [`ControlEngine::on_bar`].
#[derive(Debug, Clone, Copy)]
pub struct BarSignal {
    pub ts: DateTime<Utc>,
    pub target: TargetExposure,
    pub regime: Regime,
    pub oracle_price: f64,
    pub vol_pct: Option<f64>,
    pub vol_spike_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlDecision {
    pub intended_order: Option<OrderRequest>,
    pub hypothetical_fill: Option<FillReport>,
    pub slippage_estimate_bps: f64,
    pub regime: Regime,
    pub skipped: Option<SkipReason>,
    pub route_hint: &'static str,
}

impl ControlDecision {
    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }
}

pub struct ControlEngine<V: VenueAdapter> {
    venue: V,
    risk: RiskGovernor,
    config: ControlConfig,
    bar_index: usize,
    peak_equity: f64,
    pending_qty: f64,
    order_seq: u64,
}

impl<V: VenueAdapter> ControlEngine<V> {
    pub fn new(venue: V, risk: RiskGovernor, config: ControlConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            venue,
            risk,
            config,
            bar_index: 0,
            peak_equity: 0.0,
            pending_qty: 0.0,
            order_seq: 0,
        })
    }

    pub fn venue(&self) -> &V {
        &self.venue
    }

    pub fn venue_mut(&mut self) -> &mut V {
        &mut self.venue
    }

    pub fn peak_equity(&self) -> f64 {
        self.peak_equity
    }

    /// Unfilled quantity (signed) from the last partial fill.
    pub fn pending_qty(&self) -> f64 {
        self.pending_qty
    }

    /// Evaluate one bar and place at most one order.
    ///
    /// An unfilled remainder from a partial fill forces the next bar to
    /// rebalance even inside the interval wait. The order size itself is
    /// always `target - current position`, which already contains it.
    pub fn on_bar(&mut self, signal: BarSignal) -> Result<ControlDecision, ControlError> {
        let mark = self.venue.get_mark_price(&self.config.symbol)?;
        let margin = self.venue.get_margin_status()?;
        if self.peak_equity <= 0.0 || margin.equity > self.peak_equity {
            self.peak_equity = margin.equity;
        }

        self.bar_index += 1;
        let on_schedule = (self.bar_index - 1) % self.config.rebalance_interval_bars == 0;
        if !on_schedule && self.pending_qty == 0.0 {
            return Ok(self.skip(signal, SkipReason::RebalanceWait, 0.0));
        }

        let oracle = signal.oracle_price;
        if !(oracle.is_finite() && oracle > 0.0) || mark <= 0.0 {
            return Ok(self.skip(signal, SkipReason::InvalidPrice, 0.0));
        }

        let divergence_bps = (mark - oracle).abs() / oracle * 1e4;
        if divergence_bps > self.config.oracle_divergence_bps {
            return Ok(self.skip(signal, SkipReason::OracleDivergence, 0.0));
        }

        let decision = self.risk.decide(
            margin.equity,
            self.peak_equity,
            signal.vol_pct,
            signal.target.directional_requested,
        )?;
        if signal.vol_spike_active {
            return Ok(self.skip(signal, SkipReason::VolSpikeActive, 0.0));
        }

        let target_qty = match decision.mode {
            RiskMode::Flat => 0.0,
            RiskMode::CarryOnly if signal.target.directional_requested => 0.0,
            _ => signal.target.target_perp_qty,
        };

        let current_qty: f64 = self
            .venue
            .get_positions()?
            .iter()
            .filter(|p| p.symbol == self.config.symbol)
            .map(|p| p.signed_qty())
            .sum();

        let qty_delta = target_qty - current_qty;
        if qty_delta.abs() <= self.config.min_order_qty {
            self.pending_qty = 0.0;
            return Ok(self.skip(signal, SkipReason::BelowMinQty, 0.0));
        }

        let slippage_estimate_bps = if margin.equity > 0.0 {
            (qty_delta * mark).abs() / margin.equity * self.config.max_slippage_bps
        } else {
            0.0
        };
        if slippage_estimate_bps > self.config.max_slippage_bps {
            return Ok(self.skip(signal, SkipReason::SlippageGuard, slippage_estimate_bps));
        }

        self.order_seq += 1;
        let side = OrderSide::for_delta(qty_delta);
        let order = OrderRequest {
            client_order_id: format!("ctl-{}", self.order_seq),
            symbol: self.config.symbol.clone(),
            side,
            qty: qty_delta.abs(),
            reduce_only: false,
        };
        let fill = self.venue.place_order(&order, signal.ts)?;
        self.pending_qty = match fill.status {
            FillStatus::Partial => side.sign() * (fill.requested_qty - fill.filled_qty),
            _ => 0.0,
        };
        info!(
            order = %order.client_order_id,
            side = side.as_str(),
            qty = order.qty,
            filled = fill.filled_qty,
            status = fill.status.as_str(),
            "shadow order"
        );

        Ok(ControlDecision {
            intended_order: Some(order),
            hypothetical_fill: Some(fill),
            slippage_estimate_bps,
            regime: signal.regime,
            skipped: None,
            route_hint: self.config.mev_mode.route_hint(),
        })
    }

    fn skip(
        &self,
        signal: BarSignal,
        reason: SkipReason,
        slippage_estimate_bps: f64,
    ) -> ControlDecision {
        debug!(bar = self.bar_index, reason = reason.as_str(), "control skip");
        ControlDecision {
            intended_order: None,
            hypothetical_fill: None,
            slippage_estimate_bps,
            regime: signal.regime,
            skipped: Some(reason),
            route_hint: self.config.mev_mode.route_hint(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskConfig;
    use crate::venue::{SimVenue, SimVenueConfig};
    use chrono::TimeZone;

    fn engine(max_fill_ratio: f64, interval: usize) -> ControlEngine<SimVenue> {
        let venue = SimVenue::new(SimVenueConfig {
            initial_mark_price: 100.0,
            initial_equity: 10_000.0,
            max_fill_ratio,
            ..Default::default()
        })
        .unwrap();
        let risk = RiskGovernor::new(RiskConfig {
            leverage_cap: 1.5,
            venue_cap_frac: 1.0,
            max_drawdown: 0.2,
            vol_spike_vol_pct: 0.8,
            ..Default::default()
        })
        .unwrap();
        ControlEngine::new(
            venue,
            risk,
            ControlConfig {
                max_slippage_bps: 100.0,
                oracle_divergence_bps: 20.0,
                rebalance_interval_bars: interval,
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn signal(target: f64, oracle: f64) -> BarSignal {
        BarSignal {
            ts: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            target: TargetExposure {
                target_perp_qty: target,
                directional_requested: true,
            },
            regime: Regime::RiskOn,
            oracle_price: oracle,
            vol_pct: Some(0.5),
            vol_spike_active: false,
        }
    }

    #[test]
    fn oracle_divergence_skips() {
        let mut e = engine(0.5, 1);
        let d = e.on_bar(signal(1.0, 80.0)).unwrap();
        assert_eq!(d.skipped, Some(SkipReason::OracleDivergence));
        assert!(d.intended_order.is_none());
        assert_eq!(d.route_hint, "mev_guard_placeholder");
    }

    #[test]
    fn partial_fill_carries_remainder() {
        let mut e = engine(0.5, 1);
        let d1 = e.on_bar(signal(2.0, 100.0)).unwrap();
        assert!(!d1.is_skipped());
        let fill = d1.hypothetical_fill.unwrap();
        assert_eq!(fill.status, FillStatus::Partial);
        assert_eq!(fill.filled_qty, 1.0);
        assert_eq!(e.pending_qty(), 1.0);

        let d2 = e.on_bar(signal(2.0, 100.0)).unwrap();
        assert!(!d2.is_skipped());
        assert_eq!(d2.intended_order.unwrap().qty, 1.0);
    }

    #[test]
    fn remainder_overrides_rebalance_wait() {
        let mut e = engine(0.5, 3);
        assert!(!e.on_bar(signal(2.0, 100.0)).unwrap().is_skipped());
        assert!(!e.on_bar(signal(2.0, 100.0)).unwrap().is_skipped());
        // Bar 3 buys 0.25, remainder 0.25 is still pending.
        assert!(!e.on_bar(signal(2.0, 100.0)).unwrap().is_skipped());

        let mut full = engine(1.0, 3);
        assert!(!full.on_bar(signal(2.0, 100.0)).unwrap().is_skipped());
        let d = full.on_bar(signal(2.0, 100.0)).unwrap();
        assert_eq!(d.skipped, Some(SkipReason::RebalanceWait));
    }

    #[test]
    fn vol_spike_and_min_qty_guards() {
        let mut e = engine(1.0, 1);
        let mut s = signal(1.0, 100.0);
        s.vol_spike_active = true;
        assert_eq!(e.on_bar(s).unwrap().skipped, Some(SkipReason::VolSpikeActive));

        let d = e.on_bar(signal(0.0, 100.0)).unwrap();
        assert_eq!(d.skipped, Some(SkipReason::BelowMinQty));
    }

    #[test]
    fn slippage_guard_blocks_oversized_orders() {
        let mut e = engine(1.0, 1);
        // 200 units * 100 = 2x equity -> 200 bps estimate > 100 bps cap.
        let d = e.on_bar(signal(200.0, 100.0)).unwrap();
        assert_eq!(d.skipped, Some(SkipReason::SlippageGuard));
        assert!(d.slippage_estimate_bps > 100.0);
    }

    #[test]
    fn invalid_oracle_price() {
        let mut e = engine(1.0, 1);
        let d = e.on_bar(signal(1.0, 0.0)).unwrap();
        assert_eq!(d.skipped, Some(SkipReason::InvalidPrice));
    }
}
