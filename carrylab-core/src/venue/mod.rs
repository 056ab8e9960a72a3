//! Venue capability interface and its value types.
//!
//! The control engine talks to a venue only through `VenueAdapter`.
//! `SimVenue` is the deterministic in-memory implementation.

pub mod sim;

pub use sim::{SimVenue, SimVenueConfig};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::PositionSide;

#[derive(Debug, Error)]
pub enum VenueError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unsupported symbol: {0}")]
    UnsupportedSymbol(String),

    #[error("order quantity must be finite and >= 0, got {0}")]
    InvalidQuantity(f64),

    #[error("invalid {field}: {value}")]
    InvalidMarket { field: &'static str, value: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Side that moves a position by `delta`.
    pub fn for_delta(delta: f64) -> Self {
        if delta > 0.0 {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        }
    }

    pub fn sign(self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStatus {
    Filled,
    Partial,
    Rejected,
}

impl FillStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FillStatus::Filled => "filled",
            FillStatus::Partial => "partial",
            FillStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenuePosition {
    pub symbol: String,
    pub venue: String,
    pub side: PositionSide,
    /// Absolute quantity.
    pub qty: f64,
    pub entry_price: f64,
}

impl VenuePosition {
    pub fn signed_qty(&self) -> f64 {
        match self.side {
            PositionSide::Long => self.qty,
            PositionSide::Short => -self.qty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginStatus {
    pub equity: f64,
    pub gross_exposure: f64,
    pub maintenance_margin_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub client_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub qty: f64,
    pub reduce_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillReport {
    pub order_id: String,
    pub client_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub requested_qty: f64,
    pub filled_qty: f64,
    pub fill_price: f64,
    pub mark_price: f64,
    pub slippage_bps: f64,
    pub status: FillStatus,
    pub reason: Option<String>,
    pub ts: DateTime<Utc>,
}

/// What a strategy may ask of an execution venue.
///
/// `place_order` takes the event timestamp so implementations never read a
/// wall clock.
pub trait VenueAdapter {
    fn get_positions(&self) -> Result<Vec<VenuePosition>, VenueError>;

    fn place_order(
        &mut self,
        request: &OrderRequest,
        ts: DateTime<Utc>,
    ) -> Result<FillReport, VenueError>;

    fn cancel_order(&mut self, order_id: &str) -> Result<bool, VenueError>;

    fn get_mark_price(&self, symbol: &str) -> Result<f64, VenueError>;

    fn get_funding_rate(&self, symbol: &str) -> Result<f64, VenueError>;

    fn get_margin_status(&self) -> Result<MarginStatus, VenueError>;
}
