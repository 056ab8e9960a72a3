//! Run fingerprints: BLAKE3 digests that identify a run by its inputs and output.
//!
//! Two runs with the same config and the same series produce the same
//! `config_hash` and `dataset_hash`; since the simulator is deterministic they
//! also share `result_hash`.

use std::fmt;

use serde::{Deserialize, Serialize};

use carrylab_core::{PriceSeries, SimulationResult};

use crate::config::BacktestConfig;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunFingerprint {
    pub config_hash: String,
    pub dataset_hash: String,
    pub result_hash: String,
}

impl RunFingerprint {
    pub fn compute(
        config: &BacktestConfig,
        series: &PriceSeries,
        result: &SimulationResult,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            config_hash: hash_json(config)?,
            dataset_hash: dataset_hash(series),
            result_hash: hash_json(result)?,
        })
    }
}

impl fmt::Display for RunFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            short(&self.config_hash),
            short(&self.dataset_hash),
            short(&self.result_hash)
        )
    }
}

fn short(hex: &str) -> &str {
    hex.get(..12).unwrap_or(hex)
}

/// BLAKE3 of the compact JSON encoding.
pub fn hash_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
}

/// BLAKE3 over every bar of the series, in order.
///
/// Floats are hashed by their little-endian bytes, so the digest does not
/// depend on any text formatting. Optional columns are tagged so a series
/// with funding never collides with one without.
pub fn dataset_hash(series: &PriceSeries) -> String {
    let mut hasher = blake3::Hasher::new();
    for (i, ts) in series.timestamps().iter().enumerate() {
        hasher.update(&ts.timestamp_millis().to_le_bytes());
        hasher.update(&series.open()[i].to_le_bytes());
        hasher.update(&series.high()[i].to_le_bytes());
        hasher.update(&series.low()[i].to_le_bytes());
        hasher.update(&series.close()[i].to_le_bytes());
        hasher.update(&series.volume()[i].to_le_bytes());
    }
    if let Some(funding) = series.funding() {
        hasher.update(b"funding");
        for f in funding {
            hasher.update(&f.to_le_bytes());
        }
    }
    if let Some(oi) = series.open_interest() {
        hasher.update(b"open_interest");
        for v in oi {
            hasher.update(&v.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}
