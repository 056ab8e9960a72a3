//! Mutable portfolio state threaded through the simulator loop.
//!
//! NAV is cash plus the spot leg marked at the current price. Perp legs carry
//! no cash value: their price PnL and funding are realized into cash every bar.

use serde::{Deserialize, Serialize};

/// Operating mode decided by the risk governor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskMode {
    #[default]
    Normal,
    CarryOnly,
    Flat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioState {
    pub cash: f64,
    pub carry_spot_qty: f64,
    pub carry_perp_qty: f64,
    pub dir_perp_qty: f64,
    pub peak_nav: f64,
    pub mode: RiskMode,
}

impl PortfolioState {
    pub fn new(initial_nav: f64) -> Self {
        Self {
            cash: initial_nav,
            carry_spot_qty: 0.0,
            carry_perp_qty: 0.0,
            dir_perp_qty: 0.0,
            peak_nav: initial_nav,
            mode: RiskMode::Normal,
        }
    }

    pub fn nav(&self, price: f64) -> f64 {
        self.cash + self.carry_spot_qty * price
    }

    /// Net perp position across both sleeves (one perp instrument on the venue).
    pub fn net_perp_qty(&self) -> f64 {
        self.carry_perp_qty + self.dir_perp_qty
    }

    /// `|spot| + |net perp|`, in quote currency.
    pub fn gross_exposure(&self, price: f64) -> f64 {
        gross_notional(self.carry_spot_qty, self.net_perp_qty(), price)
    }

    pub fn leverage(&self, price: f64) -> f64 {
        let nav = self.nav(price);
        if nav > 0.0 {
            self.gross_exposure(price) / nav
        } else {
            0.0
        }
    }
}

pub fn gross_notional(spot_qty: f64, perp_qty: f64, price: f64) -> f64 {
    spot_qty.abs() * price + perp_qty.abs() * price
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_is_all_cash() {
        let s = PortfolioState::new(1_000.0);
        assert_eq!(s.nav(50.0), 1_000.0);
        assert_eq!(s.gross_exposure(50.0), 0.0);
        assert_eq!(s.leverage(50.0), 0.0);
        assert_eq!(s.mode, RiskMode::Normal);
    }

    #[test]
    fn carry_legs_net_out_of_nav_but_not_gross() {
        let mut s = PortfolioState::new(1_000.0);
        // Buy 5 spot at 100 paying cash, short 5 perp (no cash).
        s.cash -= 500.0;
        s.carry_spot_qty = 5.0;
        s.carry_perp_qty = -5.0;
        assert_eq!(s.nav(100.0), 1_000.0);
        assert_eq!(s.gross_exposure(100.0), 1_000.0);
        assert_eq!(s.leverage(100.0), 1.0);
    }

    #[test]
    fn directional_offsets_carry_perp_in_gross() {
        let mut s = PortfolioState::new(1_000.0);
        s.carry_perp_qty = -5.0;
        s.dir_perp_qty = 2.0;
        assert_eq!(s.net_perp_qty(), -3.0);
        assert_eq!(s.gross_exposure(100.0), 300.0);
    }
}
