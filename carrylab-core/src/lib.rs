//! CarryLab Core: the guidance-navigation-control stack of a carry + directional
//! overlay strategy.
//!
//! This crate turns a validated price/funding series into a deterministic
//! trajectory of portfolio state:
//! - Indicator library (log returns, SMA, EMA, Wilder ATR, realized vol, percentile rank, drawdown)
//! - Feature pipeline (trend signal, aligned volatility features)
//! - Compression score and expansion trigger
//! - Hysteretic regime classifier
//! - Guidance allocation policy and risk governor
//! - Single-pass portfolio simulator with trade events and position lifecycles
//! - Venue capability trait, an in-memory simulation venue, and the shadow control engine
//!
//! Nothing in here performs I/O.

pub mod compression;
pub mod config;
pub mod control;
pub mod domain;
pub mod engine;
pub mod features;
pub mod guidance;
pub mod indicators;
pub mod regime;
pub mod risk;
pub mod venue;

pub use config::ConfigError;
pub use domain::{PriceSeries, Regime, SeriesError};
pub use engine::{SimError, SimulationResult, Simulator};
