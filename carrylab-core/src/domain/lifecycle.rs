//! Position lifecycle records: one per open-to-close window of a sleeve.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Regime, Sleeve};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn from_qty(qty: f64) -> Self {
        if qty < 0.0 {
            PositionSide::Short
        } else {
            PositionSide::Long
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Quantity went to zero.
    Closed,
    /// Quantity changed sign; a new lifecycle opened on the same bar.
    Flipped,
    /// Regime changed while the carry sleeve was open; carry re-opens as a new segment.
    RegimeChange,
    /// Still open after the last bar; marked at the final close.
    EndOfData,
}

/// Full PnL attribution for one position from its open bar to its close bar.
///
/// `qty` is the absolute quantity at open (spot quantity for carry) and stays
/// fixed through later resizes; `peak_qty` is the largest absolute quantity
/// held over the window. Price and funding PnL accrue on bars after the
/// open; costs include the opening and closing trades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLifecycle {
    pub kind: Sleeve,
    pub side: PositionSide,
    pub open_bar: usize,
    pub close_bar: usize,
    pub open_ts: DateTime<Utc>,
    pub close_ts: DateTime<Utc>,
    pub qty: f64,
    pub peak_qty: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub nav_entry: f64,
    pub nav_exit: f64,
    pub regime_at_open: Regime,
    pub pnl_price: f64,
    pub pnl_funding: f64,
    /// ≤ 0
    pub pnl_fees: f64,
    /// ≤ 0
    pub pnl_slippage: f64,
    pub bars_held: usize,
    pub close_reason: CloseReason,
}

impl TradeLifecycle {
    pub fn pnl_net(&self) -> f64 {
        self.pnl_price + self.pnl_funding + self.pnl_fees + self.pnl_slippage
    }
}
