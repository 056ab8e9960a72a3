//! Serializable backtest configuration, loaded from TOML.
//!
//! Every table is optional and falls back to its defaults:
//!
//! ```toml
//! [regime]
//! long_ma_window = 200
//! confirm_bars = 3
//!
//! [risk]
//! leverage_cap = 1.5
//! kill_switch_action = "carry_only"
//!
//! [shadow]
//! symbol = "BTC-PERP"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use carrylab_core::compression::CompressionConfig;
use carrylab_core::engine::{FeeModel, SimulatorConfig, SlippageModel, StrategyConfig};
use carrylab_core::guidance::GuidancePolicyConfig;
use carrylab_core::regime::RegimeConfig;
use carrylab_core::risk::RiskConfig;

use crate::shadow::ShadowRunnerConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(#[from] carrylab_core::ConfigError),
}

/// Everything needed to reproduce a run: strategy tables plus shadow replay settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub regime: RegimeConfig,
    pub compression: CompressionConfig,
    pub guidance: GuidancePolicyConfig,
    pub risk: RiskConfig,
    pub simulator: SimulatorConfig,
    pub fees: FeeModel,
    pub slippage: SlippageModel,
    pub shadow: ShadowRunnerConfig,
}

impl BacktestConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), carrylab_core::ConfigError> {
        self.strategy().validate()?;
        self.shadow.validate()
    }

    /// The strategy-facing subset handed to the simulator.
    pub fn strategy(&self) -> StrategyConfig {
        StrategyConfig {
            regime: self.regime.clone(),
            compression: self.compression.clone(),
            guidance: self.guidance.clone(),
            risk: self.risk.clone(),
            simulator: self.simulator.clone(),
            fees: self.fees.clone(),
            slippage: self.slippage.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carrylab_core::regime::FundingMode;
    use carrylab_core::risk::KillSwitchAction;

    #[test]
    fn empty_document_is_all_defaults() {
        let cfg = BacktestConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, BacktestConfig::default());
    }

    #[test]
    fn partial_tables_override_defaults() {
        let cfg = BacktestConfig::from_toml_str(
            r#"
            [regime]
            long_ma_window = 50
            funding_mode = "ignore"

            [risk]
            max_drawdown = 0.1
            kill_switch_action = "flat"

            [fees]
            taker_fee_bps = 2.5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.regime.long_ma_window, 50);
        assert_eq!(cfg.regime.funding_mode, FundingMode::Ignore);
        assert_eq!(cfg.regime.rv_window, RegimeConfig::default().rv_window);
        assert_eq!(cfg.risk.kill_switch_action, KillSwitchAction::Flat);
        assert_eq!(cfg.fees.taker_fee_bps, 2.5);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = BacktestConfig::from_toml_str("[risk]\nleverage_cap = -1.0\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = BacktestConfig::from_toml_str("[simulator]\nliquidation_buffer = 1.0\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = BacktestConfig::from_toml_str("[regime\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn toml_roundtrip() {
        let cfg = BacktestConfig::default();
        let text = toml::to_string(&cfg).unwrap();
        assert_eq!(BacktestConfig::from_toml_str(&text).unwrap(), cfg);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = BacktestConfig::load(Path::new("/nonexistent/carrylab.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
