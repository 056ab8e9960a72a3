//! Risk governor: drawdown kill switch and volatility-spike de-risking.
//!
//! `decide` is stateless per call. The caps it returns are passthroughs from
//! configuration; resizing positions is the simulator's job.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{self, ConfigError};
use crate::domain::RiskMode;

const DRAWDOWN_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskError {
    #[error("nav must be finite and > 0, got {0}")]
    InvalidNav(f64),

    #[error("peak_nav must be finite and > 0, got {0}")]
    InvalidPeakNav(f64),
}

/// Mode the kill switch forces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KillSwitchAction {
    #[default]
    CarryOnly,
    Flat,
}

impl KillSwitchAction {
    fn mode(self) -> RiskMode {
        match self {
            KillSwitchAction::CarryOnly => RiskMode::CarryOnly,
            KillSwitchAction::Flat => RiskMode::Flat,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Max gross exposure / NAV.
    pub leverage_cap: f64,
    /// Max fraction of NAV deployed on one venue across sleeves.
    pub venue_cap_frac: f64,
    /// Drawdown from peak NAV that trips the kill switch.
    pub max_drawdown: f64,
    pub kill_switch_action: KillSwitchAction,
    /// Volatility percentile at or above which directional is refused.
    pub vol_spike_vol_pct: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            leverage_cap: 1.5,
            venue_cap_frac: 0.30,
            max_drawdown: 0.20,
            kill_switch_action: KillSwitchAction::CarryOnly,
            vol_spike_vol_pct: 0.90,
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        config::positive("leverage_cap", self.leverage_cap)?;
        config::unit_closed("venue_cap_frac", self.venue_cap_frac)?;
        config::unit_open("max_drawdown", self.max_drawdown)?;
        config::unit_open_closed("vol_spike_vol_pct", self.vol_spike_vol_pct)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskDecision {
    pub kill_switch_active: bool,
    pub mode: RiskMode,
    pub venue_cap_applied: f64,
    pub leverage_cap_applied: f64,
    pub directional_allowed: bool,
}

#[derive(Debug, Clone)]
pub struct RiskGovernor {
    config: RiskConfig,
}

impl RiskGovernor {
    pub fn new(config: RiskConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn decide(
        &self,
        nav: f64,
        peak_nav: f64,
        vol_pct: Option<f64>,
        requested_directional: bool,
    ) -> Result<RiskDecision, RiskError> {
        if !(nav.is_finite() && nav > 0.0) {
            return Err(RiskError::InvalidNav(nav));
        }
        if !(peak_nav.is_finite() && peak_nav > 0.0) {
            return Err(RiskError::InvalidPeakNav(peak_nav));
        }

        let drawdown = 1.0 - nav / peak_nav;
        let kill_switch_active = drawdown >= self.config.max_drawdown - DRAWDOWN_EPSILON;
        let mode = if kill_switch_active {
            self.config.kill_switch_action.mode()
        } else {
            RiskMode::Normal
        };

        let vol_spike = vol_pct.is_some_and(|v| v >= self.config.vol_spike_vol_pct);
        let directional_allowed = requested_directional && mode == RiskMode::Normal && !vol_spike;

        Ok(RiskDecision {
            kill_switch_active,
            mode,
            venue_cap_applied: self.config.venue_cap_frac,
            leverage_cap_applied: self.config.leverage_cap,
            directional_allowed,
        })
    }
}
