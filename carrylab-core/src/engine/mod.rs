//! Portfolio simulator: feature precompute, then one forward pass over bars.
//!
//! Flow per run:
//! 1. `precompute_features` computes trend, volatility, regimes, compression
//!    and expansion for the whole series (no dependency on portfolio state).
//! 2. `Simulator::run` walks the bars once, threading a single owned
//!    `PortfolioState` through accounting, risk, targeting, execution,
//!    leverage correction and lifecycle tracking.
//! 3. The result is a `SimulationResult` of immutable records.

pub mod config;
pub mod cost_model;
pub mod execution;
pub mod lifecycle;
pub mod precompute;
pub mod simulator;
pub mod targets;

pub use config::{SimulatorConfig, StrategyConfig};
pub use cost_model::{FeeModel, SlippageModel};
pub use precompute::{precompute_features, FeatureFrame};
pub use simulator::Simulator;
pub use targets::{apply_risk_constraints, PositionTargets};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::{BarResult, TradeEvent, TradeLifecycle};
use crate::indicators::IndicatorError;
use crate::regime::RegimeError;
use crate::risk::RiskError;

/// Fatal failure of a simulation run. No partial result is returned.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Indicator(#[from] IndicatorError),

    #[error(transparent)]
    Regime(#[from] RegimeError),

    #[error(transparent)]
    Risk(#[from] RiskError),

    #[error("bar {index}: close must be finite and > 0, got {price}")]
    InvalidPrice { index: usize, price: f64 },

    #[error("bar {index}: nav must be finite and > 0, got {nav}")]
    NonPositiveNav { index: usize, nav: f64 },

    #[error("feature frame covers {actual} bars, series has {expected}")]
    FeatureLengthMismatch { expected: usize, actual: usize },
}

/// Everything a run emits, in bar order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub bars: Vec<BarResult>,
    pub trades: Vec<TradeEvent>,
    pub lifecycles: Vec<TradeLifecycle>,
}

impl SimulationResult {
    pub fn final_nav(&self) -> Option<f64> {
        self.bars.last().map(|b| b.nav)
    }
}
