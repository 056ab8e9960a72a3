use serde::{Deserialize, Serialize};
use std::fmt;

/// Market regime label, one per bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    RiskOff,
    Neutral,
    RiskOn,
}

impl Regime {
    pub const ALL: [Regime; 3] = [Regime::RiskOff, Regime::Neutral, Regime::RiskOn];

    pub fn as_str(self) -> &'static str {
        match self {
            Regime::RiskOff => "RISK_OFF",
            Regime::Neutral => "NEUTRAL",
            Regime::RiskOn => "RISK_ON",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
