//! Sleeve targets: allocation fractions after risk constraints, then the
//! position quantities they imply.

use crate::domain::{gross_notional, RiskMode};
use crate::guidance::TargetAllocations;
use crate::risk::RiskDecision;

/// Inputs to the directional vol-targeting step.
#[derive(Debug, Clone, Copy)]
pub struct VolTarget {
    pub realized_vol: Option<f64>,
    pub target_dir_vol: f64,
    pub min_dir_vol: f64,
}

/// Apply mode, gating, vol targeting and the venue cap to raw guidance.
///
/// Steps, in order:
/// - `Flat` zeroes both sleeves; `CarryOnly` zeroes directional.
/// - Directional is zeroed unless the risk decision allows it and the bar
///   carries an expansion signal.
/// - Directional is scaled by `min(1, target / max(min, rv))`; no realized
///   vol means no directional exposure.
/// - If carry + directional exceeds the venue cap both are scaled down
///   proportionally.
pub fn apply_risk_constraints(
    raw: TargetAllocations,
    decision: &RiskDecision,
    expansion: bool,
    vol: VolTarget,
) -> TargetAllocations {
    let (mut carry, mut directional) = match decision.mode {
        RiskMode::Flat => (0.0, 0.0),
        RiskMode::CarryOnly => (raw.carry_frac, 0.0),
        RiskMode::Normal => (raw.carry_frac, raw.directional_frac),
    };

    if !decision.directional_allowed || !expansion {
        directional = 0.0;
    }

    directional = match vol.realized_vol {
        Some(rv) => directional * (vol.target_dir_vol / rv.max(vol.min_dir_vol)).min(1.0),
        None => 0.0,
    };

    let cap = decision.venue_cap_applied;
    let deployed = carry + directional;
    if deployed > cap && deployed > 0.0 {
        let s = cap / deployed;
        carry *= s;
        directional *= s;
    }

    TargetAllocations {
        carry_frac: carry,
        directional_frac: directional,
    }
}

/// Target quantities for the three legs.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PositionTargets {
    pub carry_spot_qty: f64,
    pub carry_perp_qty: f64,
    pub dir_perp_qty: f64,
}

impl PositionTargets {
    /// Delta-neutral carry (long spot, equal short perp) plus a long
    /// directional perp, sized off `nav`.
    pub fn from_allocations(alloc: TargetAllocations, nav: f64, price: f64) -> Self {
        let spot = alloc.carry_frac * nav / price;
        Self {
            carry_spot_qty: spot,
            carry_perp_qty: -spot,
            dir_perp_qty: alloc.directional_frac * nav / price,
        }
    }

    pub fn gross(&self, price: f64) -> f64 {
        gross_notional(
            self.carry_spot_qty,
            self.carry_perp_qty + self.dir_perp_qty,
            price,
        )
    }

    pub fn scaled(self, s: f64) -> Self {
        Self {
            carry_spot_qty: self.carry_spot_qty * s,
            carry_perp_qty: self.carry_perp_qty * s,
            dir_perp_qty: self.dir_perp_qty * s,
        }
    }

    /// Scale every leg so gross / nav stays within `max_leverage`.
    pub fn within_leverage(self, nav: f64, price: f64, max_leverage: f64) -> Self {
        let gross = self.gross(price);
        if nav > 0.0 && gross / nav > max_leverage {
            self.scaled(max_leverage * nav / gross)
        } else {
            self
        }
    }
}
