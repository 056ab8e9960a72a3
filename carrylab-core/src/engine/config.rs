use serde::{Deserialize, Serialize};

use super::cost_model::{FeeModel, SlippageModel};
use crate::compression::CompressionConfig;
use crate::config::{self, ConfigError};
use crate::guidance::GuidancePolicyConfig;
use crate::regime::RegimeConfig;
use crate::risk::RiskConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub initial_nav: f64,
    /// Funding is realized every this many bars.
    pub carry_funding_freq_hours: usize,
    /// Fraction of the leverage cap held back: effective cap is `cap * (1 - buffer)`.
    pub liquidation_buffer: f64,
    pub target_dir_vol: f64,
    pub min_dir_vol: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            initial_nav: 1_000_000.0,
            carry_funding_freq_hours: 8,
            liquidation_buffer: 0.10,
            target_dir_vol: 0.20,
            min_dir_vol: 1e-6,
        }
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        config::positive("initial_nav", self.initial_nav)?;
        config::window("carry_funding_freq_hours", self.carry_funding_freq_hours)?;
        config::unit_closed_open("liquidation_buffer", self.liquidation_buffer)?;
        config::positive("target_dir_vol", self.target_dir_vol)?;
        config::positive("min_dir_vol", self.min_dir_vol)?;
        Ok(())
    }
}

/// Every configuration a simulation needs, validated together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub regime: RegimeConfig,
    pub compression: CompressionConfig,
    pub guidance: GuidancePolicyConfig,
    pub risk: RiskConfig,
    pub simulator: SimulatorConfig,
    pub fees: FeeModel,
    pub slippage: SlippageModel,
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.regime.validate()?;
        self.compression.validate()?;
        self.guidance.validate()?;
        self.risk.validate()?;
        self.simulator.validate()?;
        self.fees.validate()?;
        self.slippage.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(StrategyConfig::default().validate().is_ok());
    }

    #[test]
    fn liquidation_buffer_must_be_below_one() {
        let cfg = SimulatorConfig {
            liquidation_buffer: 1.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = SimulatorConfig {
            liquidation_buffer: 0.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn nested_error_surfaces() {
        let mut cfg = StrategyConfig::default();
        cfg.fees.taker_fee_bps = -1.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Negative {
                field: "taker_fee_bps",
                ..
            })
        ));
    }
}
