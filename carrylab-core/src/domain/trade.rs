//! Executed leg adjustments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Instrument leg a trade touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Leg {
    Spot,
    Perp,
}

/// Strategy sleeve a position or trade belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sleeve {
    /// Long spot + short perp, delta-neutral.
    Carry,
    /// Single-sided perp overlay.
    Directional,
}

/// One executed leg adjustment.
///
/// `qty_delta` and `notional` are signed (buy > 0). `fee` and `slippage` are
/// non-negative costs; the matching PnL entries in `BarResult` carry the sign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub bar_index: usize,
    pub ts: DateTime<Utc>,
    pub sleeve: Sleeve,
    pub leg: Leg,
    pub qty_delta: f64,
    pub price: f64,
    pub notional: f64,
    pub fee: f64,
    pub slippage: f64,
}

impl TradeEvent {
    pub fn cost(&self) -> f64 {
        self.fee + self.slippage
    }
}
