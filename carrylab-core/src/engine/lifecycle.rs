//! Open-to-close segmentation of each sleeve's position.

use chrono::{DateTime, Utc};

use super::execution::SleeveCosts;
use crate::domain::{CloseReason, PositionSide, Regime, Sleeve, TradeLifecycle};

/// Post-trade snapshot of the bar being processed.
#[derive(Debug, Clone, Copy)]
pub struct BarMark {
    pub index: usize,
    pub ts: DateTime<Utc>,
    pub price: f64,
    pub nav: f64,
    pub regime: Regime,
}

#[derive(Debug, Clone)]
struct OpenPosition {
    kind: Sleeve,
    side: PositionSide,
    open: BarMark,
    qty: f64,
    peak_qty: f64,
    pnl_price: f64,
    pnl_funding: f64,
    fees: f64,
    slippage: f64,
}

impl OpenPosition {
    fn open(kind: Sleeve, qty: f64, at: BarMark, costs: SleeveCosts) -> Self {
        Self {
            kind,
            side: PositionSide::from_qty(qty),
            open: at,
            qty: qty.abs(),
            peak_qty: qty.abs(),
            pnl_price: 0.0,
            pnl_funding: 0.0,
            fees: costs.fees,
            slippage: costs.slippage,
        }
    }

    fn add_costs(&mut self, costs: SleeveCosts) {
        self.fees += costs.fees;
        self.slippage += costs.slippage;
    }

    fn close(self, at: BarMark, reason: CloseReason) -> TradeLifecycle {
        TradeLifecycle {
            kind: self.kind,
            side: self.side,
            open_bar: self.open.index,
            close_bar: at.index,
            open_ts: self.open.ts,
            close_ts: at.ts,
            qty: self.qty,
            peak_qty: self.peak_qty,
            entry_price: self.open.price,
            exit_price: at.price,
            nav_entry: self.open.nav,
            nav_exit: at.nav,
            regime_at_open: self.open.regime,
            pnl_price: self.pnl_price,
            pnl_funding: self.pnl_funding,
            pnl_fees: -self.fees,
            pnl_slippage: -self.slippage,
            bars_held: at.index - self.open.index,
            close_reason: reason,
        }
    }
}

/// Tracks the open carry and directional positions and collects closed ones.
///
/// Carry is keyed on the spot quantity, directional on the directional perp
/// quantity. Every fee, slippage and PnL amount a sleeve books is attributed
/// to exactly one lifecycle.
#[derive(Debug, Clone, Default)]
pub struct LifecycleTracker {
    carry: Option<OpenPosition>,
    directional: Option<OpenPosition>,
    closed: Vec<TradeLifecycle>,
}

impl LifecycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, sleeve: Sleeve) -> &mut Option<OpenPosition> {
        match sleeve {
            Sleeve::Carry => &mut self.carry,
            Sleeve::Directional => &mut self.directional,
        }
    }

    /// Book price and funding PnL earned by the position held into this bar.
    pub fn accrue(&mut self, sleeve: Sleeve, pnl_price: f64, pnl_funding: f64) {
        if let Some(p) = self.slot(sleeve) {
            p.pnl_price += pnl_price;
            p.pnl_funding += pnl_funding;
        }
    }

    /// Reconcile the sleeve after this bar's trades.
    ///
    /// `prev_qty` and `new_qty` are the pre-trade and post-trade quantities.
    /// On a flip, the bar's costs are split between the closing and opening
    /// positions in proportion to `|prev_qty|` and `|new_qty|`.
    pub fn on_bar(
        &mut self,
        sleeve: Sleeve,
        at: BarMark,
        prev_qty: f64,
        new_qty: f64,
        costs: SleeveCosts,
        regime_changed: bool,
    ) {
        let existing = self.slot(sleeve).take();
        let next = match existing {
            None if new_qty == 0.0 => None,
            None => Some(OpenPosition::open(sleeve, new_qty, at, costs)),
            Some(mut p) if new_qty == 0.0 => {
                p.add_costs(costs);
                self.closed.push(p.close(at, CloseReason::Closed));
                None
            }
            Some(mut p) if PositionSide::from_qty(new_qty) != p.side => {
                let total = prev_qty.abs() + new_qty.abs();
                let w = if total > 0.0 { prev_qty.abs() / total } else { 0.5 };
                p.add_costs(SleeveCosts {
                    fees: costs.fees * w,
                    slippage: costs.slippage * w,
                });
                self.closed.push(p.close(at, CloseReason::Flipped));
                let rest = SleeveCosts {
                    fees: costs.fees * (1.0 - w),
                    slippage: costs.slippage * (1.0 - w),
                };
                Some(OpenPosition::open(sleeve, new_qty, at, rest))
            }
            Some(p) if regime_changed && sleeve == Sleeve::Carry => {
                self.closed.push(p.close(at, CloseReason::RegimeChange));
                Some(OpenPosition::open(sleeve, new_qty, at, costs))
            }
            Some(mut p) => {
                p.add_costs(costs);
                p.peak_qty = p.peak_qty.max(new_qty.abs());
                Some(p)
            }
        };
        *self.slot(sleeve) = next;
    }

    /// Close anything still open at `at` and return every lifecycle in
    /// close order.
    pub fn finish(mut self, at: BarMark) -> Vec<TradeLifecycle> {
        for p in [self.carry.take(), self.directional.take()].into_iter().flatten() {
            self.closed.push(p.close(at, CloseReason::EndOfData));
        }
        self.closed
    }
}
