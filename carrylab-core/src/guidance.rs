//! Guidance policy: regime → target (carry, directional) fractions of NAV.

use serde::{Deserialize, Serialize};

use crate::config::{self, ConfigError};
use crate::domain::Regime;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AllocationBand {
    pub min: f64,
    pub max: f64,
}

impl AllocationBand {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        config::unit_closed(field, self.min)?;
        config::unit_closed(field, self.max)?;
        if self.min > self.max {
            return Err(ConfigError::Invalid {
                field,
                reason: format!("min {} > max {}", self.min, self.max),
            });
        }
        Ok(())
    }

    /// `min + aggressiveness * (max - min)`
    pub fn pick(&self, aggressiveness: f64) -> f64 {
        self.min + aggressiveness * (self.max - self.min)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidancePolicyConfig {
    pub risk_off_carry: AllocationBand,
    pub risk_off_directional: AllocationBand,
    pub neutral_carry: AllocationBand,
    pub neutral_directional: AllocationBand,
    pub risk_on_carry: AllocationBand,
    pub risk_on_directional: AllocationBand,
    pub aggressiveness: f64,
}

impl Default for GuidancePolicyConfig {
    fn default() -> Self {
        Self {
            risk_off_carry: AllocationBand::new(0.8, 1.0),
            risk_off_directional: AllocationBand::new(0.0, 0.1),
            neutral_carry: AllocationBand::new(0.6, 0.8),
            neutral_directional: AllocationBand::new(0.1, 0.3),
            risk_on_carry: AllocationBand::new(0.4, 0.7),
            risk_on_directional: AllocationBand::new(0.3, 0.6),
            aggressiveness: 0.5,
        }
    }
}

impl GuidancePolicyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.risk_off_carry.validate("risk_off_carry")?;
        self.risk_off_directional.validate("risk_off_directional")?;
        self.neutral_carry.validate("neutral_carry")?;
        self.neutral_directional.validate("neutral_directional")?;
        self.risk_on_carry.validate("risk_on_carry")?;
        self.risk_on_directional.validate("risk_on_directional")?;
        config::unit_closed("aggressiveness", self.aggressiveness)
    }

    fn bands(&self, regime: Regime) -> (AllocationBand, AllocationBand) {
        match regime {
            Regime::RiskOff => (self.risk_off_carry, self.risk_off_directional),
            Regime::Neutral => (self.neutral_carry, self.neutral_directional),
            Regime::RiskOn => (self.risk_on_carry, self.risk_on_directional),
        }
    }
}

/// Desired NAV fractions per sleeve before risk constraints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetAllocations {
    pub carry_frac: f64,
    pub directional_frac: f64,
}

#[derive(Debug, Clone)]
pub struct GuidancePolicy {
    config: GuidancePolicyConfig,
}

impl GuidancePolicy {
    pub fn new(config: GuidancePolicyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn targets(&self, regime: Regime) -> TargetAllocations {
        let (carry, directional) = self.config.bands(regime);
        let a = self.config.aggressiveness;
        TargetAllocations {
            carry_frac: carry.pick(a).clamp(0.0, 1.0),
            directional_frac: directional.pick(a).clamp(0.0, 1.0),
        }
    }
}
