use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Regime, RiskMode};

/// Per-bar snapshot after trading and leverage correction.
///
/// PnL fields are signed contributions to this bar's NAV change, so
/// `nav - previous nav == pnl_price + pnl_funding + pnl_fees + pnl_slippage`.
/// Fees and slippage are therefore ≤ 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarResult {
    pub bar_index: usize,
    pub ts: DateTime<Utc>,
    pub price: f64,
    pub nav: f64,
    pub regime: Regime,
    pub mode: RiskMode,
    pub expansion: bool,
    /// Spot notional of the carry sleeve (long leg).
    pub carry_notional: f64,
    /// Signed notional of the directional perp.
    pub directional_notional: f64,
    pub gross_exposure: f64,
    pub leverage: f64,
    pub pnl_price: f64,
    pub pnl_carry_price: f64,
    pub pnl_directional_price: f64,
    pub pnl_funding: f64,
    pub pnl_carry_funding: f64,
    pub pnl_directional_funding: f64,
    pub pnl_fees: f64,
    pub pnl_slippage: f64,
    pub kill_switch_active: bool,
}

impl BarResult {
    pub fn pnl_total(&self) -> f64 {
        self.pnl_price + self.pnl_funding + self.pnl_fees + self.pnl_slippage
    }
}
