//! CarryLab Runner: orchestration around the simulation core.
//!
//! This crate builds on `carrylab-core` to provide:
//! - TOML configuration bundles
//! - Single-backtest runner with metrics and run fingerprints
//! - CSV series loader and a seeded synthetic series generator
//! - CSV/JSON export of bars, trades, lifecycles and full results
//! - Shadow-mode replay through the control engine and simulation venue

pub mod config;
pub mod data_loader;
pub mod export;
pub mod fingerprint;
pub mod metrics;
pub mod runner;
pub mod shadow;
pub mod synthetic;

pub use config::{BacktestConfig, ConfigError};
pub use data_loader::{load_series_csv, load_series_csv_path, LoadError};
pub use export::{
    export_bars_csv, export_json, export_lifecycles_csv, export_regimes_csv, export_shadow_csv,
    export_trades_csv, import_json, load_artifacts, save_artifacts,
};
pub use fingerprint::RunFingerprint;
pub use metrics::{compute_metrics, Metrics};
pub use runner::{run_backtest, BacktestResult, RunError, SCHEMA_VERSION};
pub use shadow::{run_shadow, ShadowError, ShadowLogRow, ShadowRunnerConfig};
pub use synthetic::synthetic_series;

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn metrics_is_send_sync() {
        assert_send::<Metrics>();
        assert_sync::<Metrics>();
    }

    #[test]
    fn backtest_result_is_send_sync() {
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<BacktestConfig>();
        assert_sync::<BacktestConfig>();
        assert_send::<ShadowRunnerConfig>();
        assert_sync::<ShadowRunnerConfig>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<RunError>();
        assert_sync::<RunError>();
        assert_send::<LoadError>();
        assert_sync::<LoadError>();
        assert_send::<ShadowError>();
        assert_sync::<ShadowError>();
    }
}
