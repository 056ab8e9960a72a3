//! Backtest runner: wires config, simulator, metrics and fingerprint together.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use carrylab_core::{PriceSeries, SimError, SimulationResult, Simulator};

use crate::config::BacktestConfig;
use crate::fingerprint::RunFingerprint;
use crate::metrics::{compute_metrics, Metrics};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] carrylab_core::ConfigError),
    #[error("simulation error: {0}")]
    Sim(#[from] SimError),
    #[error("fingerprint error: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub fingerprint: RunFingerprint,
    pub metrics: Metrics,
    pub config: BacktestConfig,
    pub bar_count: usize,
    pub result: SimulationResult,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Run one backtest over an in-memory series. No I/O.
pub fn run_backtest(
    series: &PriceSeries,
    config: &BacktestConfig,
) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let simulator = Simulator::new(config.strategy())?;
    let result = simulator.run(series)?;
    let metrics = compute_metrics(&result);
    let fingerprint = RunFingerprint::compute(config, series, &result)?;

    info!(
        bars = series.len(),
        total_return = metrics.total_return,
        sharpe = metrics.sharpe,
        max_drawdown = metrics.max_drawdown,
        fingerprint = %fingerprint,
        "backtest complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        fingerprint,
        metrics,
        config: config.clone(),
        bar_count: series.len(),
        result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::synthetic_series;

    #[test]
    fn run_is_deterministic() {
        let series = synthetic_series(300, 7).unwrap();
        let cfg = BacktestConfig::default();
        let a = run_backtest(&series, &cfg).unwrap();
        let b = run_backtest(&series, &cfg).unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.result, b.result);
        assert_eq!(a.bar_count, 300);
        assert_eq!(a.result.bars.len(), 300);
    }

    #[test]
    fn invalid_config_fails_before_simulation() {
        let mut cfg = BacktestConfig::default();
        cfg.simulator.initial_nav = 0.0;
        let err = run_backtest(&synthetic_series(10, 1).unwrap(), &cfg).unwrap_err();
        assert!(matches!(err, RunError::Config(_)));
    }

    #[test]
    fn different_seeds_give_different_datasets() {
        let cfg = BacktestConfig::default();
        let a = run_backtest(&synthetic_series(50, 1).unwrap(), &cfg).unwrap();
        let b = run_backtest(&synthetic_series(50, 2).unwrap(), &cfg).unwrap();
        assert_eq!(a.fingerprint.config_hash, b.fingerprint.config_hash);
        assert_ne!(a.fingerprint.dataset_hash, b.fingerprint.dataset_hash);
    }
}
