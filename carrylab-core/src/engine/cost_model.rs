//! Transaction cost model: linear taker fee and quadratic slippage.
//!
//! Both return non-negative costs in quote currency.

use serde::{Deserialize, Serialize};

use crate::config::{self, ConfigError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeModel {
    pub taker_fee_bps: f64,
}

impl Default for FeeModel {
    fn default() -> Self {
        Self { taker_fee_bps: 5.0 }
    }
}

impl FeeModel {
    pub fn validate(&self) -> Result<(), ConfigError> {
        config::non_negative("taker_fee_bps", self.taker_fee_bps)
    }

    /// `|notional| * fee_bps / 1e4`
    pub fn fee(&self, notional: f64) -> f64 {
        notional.abs() * (self.taker_fee_bps / 1e4)
    }
}

/// Slippage that grows with trade size relative to NAV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlippageModel {
    /// Slippage in bps for a trade whose notional equals NAV.
    pub slippage_bps_at_1x_nav: f64,
}

impl Default for SlippageModel {
    fn default() -> Self {
        Self {
            slippage_bps_at_1x_nav: 10.0,
        }
    }
}

impl SlippageModel {
    pub fn validate(&self) -> Result<(), ConfigError> {
        config::non_negative("slippage_bps_at_1x_nav", self.slippage_bps_at_1x_nav)
    }

    /// `|n| * bps / 1e4 * (|n| / nav)`. `nav` must be > 0; the simulator
    /// checks this before trading.
    pub fn cost(&self, trade_notional: f64, nav: f64) -> f64 {
        let n = trade_notional.abs();
        n * (self.slippage_bps_at_1x_nav / 1e4) * (n / nav)
    }
}
