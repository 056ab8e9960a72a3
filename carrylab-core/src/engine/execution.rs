//! Leg-by-leg trade execution against the portfolio state.
//!
//! Spot trades move cash by their notional; perp trades only pay costs.
//! Slippage is priced against the NAV as it stands before each leg.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::cost_model::{FeeModel, SlippageModel};
use super::targets::PositionTargets;
use super::SimError;
use crate::domain::{Leg, PortfolioState, Sleeve, TradeEvent};

/// Unwind passes allowed after the main rebalance.
pub const MAX_POST_TRADE_PASSES: usize = 3;
/// Absolute slack on `gross <= cap * nav` before another unwind pass.
pub const LEVERAGE_TOLERANCE: f64 = 1e-12;

/// Where a trade happens.
#[derive(Debug, Clone, Copy)]
pub struct BarContext {
    pub index: usize,
    pub ts: DateTime<Utc>,
    pub price: f64,
}

/// Non-negative costs paid by one sleeve this bar.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SleeveCosts {
    pub fees: f64,
    pub slippage: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BarCosts {
    pub carry: SleeveCosts,
    pub directional: SleeveCosts,
}

impl BarCosts {
    pub fn fees(&self) -> f64 {
        self.carry.fees + self.directional.fees
    }

    pub fn slippage(&self) -> f64 {
        self.carry.slippage + self.directional.slippage
    }

    pub fn sleeve(&self, sleeve: Sleeve) -> SleeveCosts {
        match sleeve {
            Sleeve::Carry => self.carry,
            Sleeve::Directional => self.directional,
        }
    }

    fn add(&mut self, sleeve: Sleeve, fee: f64, slippage: f64) {
        let c = match sleeve {
            Sleeve::Carry => &mut self.carry,
            Sleeve::Directional => &mut self.directional,
        };
        c.fees += fee;
        c.slippage += slippage;
    }
}

#[derive(Debug, Clone, Copy)]
enum Position {
    CarrySpot,
    CarryPerp,
    DirPerp,
}

impl Position {
    const EXECUTION_ORDER: [Position; 3] =
        [Position::CarrySpot, Position::CarryPerp, Position::DirPerp];

    fn sleeve(self) -> Sleeve {
        match self {
            Position::CarrySpot | Position::CarryPerp => Sleeve::Carry,
            Position::DirPerp => Sleeve::Directional,
        }
    }

    fn leg(self) -> Leg {
        match self {
            Position::CarrySpot => Leg::Spot,
            Position::CarryPerp | Position::DirPerp => Leg::Perp,
        }
    }

    fn qty_mut(self, state: &mut PortfolioState) -> &mut f64 {
        match self {
            Position::CarrySpot => &mut state.carry_spot_qty,
            Position::CarryPerp => &mut state.carry_perp_qty,
            Position::DirPerp => &mut state.dir_perp_qty,
        }
    }

    fn target(self, targets: &PositionTargets) -> f64 {
        match self {
            Position::CarrySpot => targets.carry_spot_qty,
            Position::CarryPerp => targets.carry_perp_qty,
            Position::DirPerp => targets.dir_perp_qty,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Executor<'a> {
    fees: &'a FeeModel,
    slippage: &'a SlippageModel,
}

impl<'a> Executor<'a> {
    pub fn new(fees: &'a FeeModel, slippage: &'a SlippageModel) -> Self {
        Self { fees, slippage }
    }

    /// Move the three legs to `targets` in order: spot, carry perp, directional perp.
    pub fn rebalance(
        &self,
        state: &mut PortfolioState,
        ctx: BarContext,
        targets: &PositionTargets,
        costs: &mut BarCosts,
        trades: &mut Vec<TradeEvent>,
    ) -> Result<(), SimError> {
        for pos in Position::EXECUTION_ORDER {
            self.trade_leg(state, ctx, pos, pos.target(targets), costs, trades)?;
        }
        Ok(())
    }

    /// Unwind all legs proportionally while gross / NAV exceeds `max_leverage`.
    ///
    /// Returns the number of unwind passes executed.
    pub fn enforce_leverage(
        &self,
        state: &mut PortfolioState,
        ctx: BarContext,
        max_leverage: f64,
        costs: &mut BarCosts,
        trades: &mut Vec<TradeEvent>,
    ) -> Result<usize, SimError> {
        for pass in 0..MAX_POST_TRADE_PASSES {
            let nav = state.nav(ctx.price);
            let gross = state.gross_exposure(ctx.price);
            if nav <= 0.0 || gross <= 0.0 || gross <= max_leverage * nav + LEVERAGE_TOLERANCE {
                return Ok(pass);
            }
            let s = max_leverage * nav / gross;
            debug!(
                bar = ctx.index,
                pass,
                leverage = gross / nav,
                scale = s,
                "post-trade leverage unwind"
            );
            let targets = PositionTargets {
                carry_spot_qty: state.carry_spot_qty,
                carry_perp_qty: state.carry_perp_qty,
                dir_perp_qty: state.dir_perp_qty,
            }
            .scaled(s);
            self.rebalance(state, ctx, &targets, costs, trades)?;
        }
        Ok(MAX_POST_TRADE_PASSES)
    }

    fn trade_leg(
        &self,
        state: &mut PortfolioState,
        ctx: BarContext,
        pos: Position,
        target_qty: f64,
        costs: &mut BarCosts,
        trades: &mut Vec<TradeEvent>,
    ) -> Result<(), SimError> {
        let current = *pos.qty_mut(state);
        let qty_delta = target_qty - current;
        if qty_delta == 0.0 {
            return Ok(());
        }

        let nav = state.nav(ctx.price);
        if !(nav.is_finite() && nav > 0.0) {
            return Err(SimError::NonPositiveNav {
                index: ctx.index,
                nav,
            });
        }

        let notional = qty_delta * ctx.price;
        let fee = self.fees.fee(notional);
        let slippage = self.slippage.cost(notional, nav);
        match pos.leg() {
            Leg::Spot => state.cash -= notional + fee + slippage,
            Leg::Perp => state.cash -= fee + slippage,
        }
        *pos.qty_mut(state) = target_qty;
        costs.add(pos.sleeve(), fee, slippage);

        trades.push(TradeEvent {
            bar_index: ctx.index,
            ts: ctx.ts,
            sleeve: pos.sleeve(),
            leg: pos.leg(),
            qty_delta,
            price: ctx.price,
            notional,
            fee,
            slippage,
        });
        Ok(())
    }
}
