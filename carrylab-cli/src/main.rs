//! CarryLab CLI: backtest, regime labelling and shadow replay commands.
//!
//! Commands:
//! - `run`: backtest a CSV (or synthetic) series and print metrics JSON
//! - `regimes`: per-bar regime labels and features as CSV
//! - `shadow`: shadow control log as CSV
//!
//! Log level comes from `RUST_LOG` (default `info`); logs go to stderr so
//! stdout stays machine-readable.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use carrylab_core::{PriceSeries, Simulator};
use carrylab_runner::{
    export_regimes_csv, export_shadow_csv, load_series_csv_path, run_backtest, run_shadow,
    save_artifacts, synthetic_series, BacktestConfig,
};

#[derive(Parser)]
#[command(
    name = "carrylab",
    about = "CarryLab CLI: funding carry with a regime-gated directional overlay"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest and print metrics as JSON.
    Run {
        /// Input series CSV.
        #[arg(long, conflicts_with = "synthetic")]
        csv: Option<PathBuf>,

        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Use a seeded synthetic series of this many hourly bars instead of a CSV.
        #[arg(long)]
        synthetic: Option<usize>,

        /// Seed for --synthetic.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Write result.json, bars.csv, trades.csv and lifecycles.csv here.
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Print per-bar regime labels and features as CSV.
    Regimes {
        #[arg(long)]
        csv: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Replay a series through the shadow control engine and print its log as CSV.
    Shadow {
        #[arg(long)]
        csv: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            csv,
            config,
            synthetic,
            seed,
            out_dir,
        } => run_cmd(csv, config, synthetic, seed, out_dir),
        Commands::Regimes { csv, config } => regimes_cmd(&csv, config.as_deref()),
        Commands::Shadow { csv, config } => shadow_cmd(&csv, config.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> Result<BacktestConfig> {
    match path {
        Some(p) => BacktestConfig::load(p)
            .with_context(|| format!("failed to load config {}", p.display())),
        None => Ok(BacktestConfig::default()),
    }
}

fn load_series(path: &Path) -> Result<PriceSeries> {
    load_series_csv_path(path).with_context(|| format!("failed to load series {}", path.display()))
}

fn run_cmd(
    csv: Option<PathBuf>,
    config_path: Option<PathBuf>,
    synthetic: Option<usize>,
    seed: u64,
    out_dir: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let series = match (csv, synthetic) {
        (Some(path), None) => load_series(&path)?,
        (None, Some(n)) => synthetic_series(n, seed).context("failed to build synthetic series")?,
        _ => bail!("exactly one of --csv or --synthetic is required"),
    };

    let result = run_backtest(&series, &config)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&result.metrics).context("failed to serialize metrics")?
    );

    if let Some(dir) = out_dir {
        let paths = save_artifacts(&result, &dir)?;
        tracing::info!(dir = %dir.display(), files = paths.len(), "artifacts saved");
    }
    Ok(())
}

fn regimes_cmd(csv: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let series = load_series(csv)?;
    let simulator = Simulator::new(config.strategy())?;
    let features = simulator.features(&series)?;
    print!("{}", export_regimes_csv(&series, &features)?);
    Ok(())
}

fn shadow_cmd(csv: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let series = load_series(csv)?;
    let rows = run_shadow(&series, &config)?;
    print!("{}", export_shadow_csv(&rows)?);
    Ok(())
}
