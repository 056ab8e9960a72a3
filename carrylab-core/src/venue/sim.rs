//! Deterministic single-symbol venue stub.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    FillReport, FillStatus, MarginStatus, OrderRequest, OrderSide, VenueAdapter, VenueError,
    VenuePosition,
};
use crate::config::{self, ConfigError};
use crate::domain::PositionSide;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimVenueConfig {
    pub symbol: String,
    pub venue: String,
    /// Slippage in bps when the filled notional equals equity.
    pub slippage_bps_at_1x_notional: f64,
    /// Fraction of each order that fills, in (0, 1].
    pub max_fill_ratio: f64,
    pub initial_mark_price: f64,
    pub initial_funding_rate: f64,
    pub initial_equity: f64,
    pub maintenance_margin_ratio: f64,
}

impl Default for SimVenueConfig {
    fn default() -> Self {
        Self {
            symbol: "BTC-PERP".to_string(),
            venue: "sim".to_string(),
            slippage_bps_at_1x_notional: 10.0,
            max_fill_ratio: 1.0,
            initial_mark_price: 50_000.0,
            initial_funding_rate: 0.0,
            initial_equity: 1_000_000.0,
            maintenance_margin_ratio: 0.05,
        }
    }
}

impl SimVenueConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.is_empty() {
            return Err(ConfigError::Invalid {
                field: "symbol",
                reason: "must not be empty".to_string(),
            });
        }
        config::non_negative("slippage_bps_at_1x_notional", self.slippage_bps_at_1x_notional)?;
        config::unit_open_closed("max_fill_ratio", self.max_fill_ratio)?;
        config::positive("initial_mark_price", self.initial_mark_price)?;
        config::finite("initial_funding_rate", self.initial_funding_rate)?;
        config::positive("initial_equity", self.initial_equity)?;
        config::non_negative("maintenance_margin_ratio", self.maintenance_margin_ratio)?;
        Ok(())
    }
}

/// In-memory venue holding one net perp position marked at a settable price.
#[derive(Debug, Clone)]
pub struct SimVenue {
    config: SimVenueConfig,
    mark_price: f64,
    funding_rate: f64,
    equity: f64,
    position_qty: f64,
    order_seq: u64,
}

impl SimVenue {
    pub fn new(config: SimVenueConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            mark_price: config.initial_mark_price,
            funding_rate: config.initial_funding_rate,
            equity: config.initial_equity,
            position_qty: 0.0,
            order_seq: 0,
            config,
        })
    }

    pub fn config(&self) -> &SimVenueConfig {
        &self.config
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    pub fn set_market(&mut self, mark_price: f64, funding_rate: f64) -> Result<(), VenueError> {
        if !(mark_price.is_finite() && mark_price > 0.0) {
            return Err(VenueError::InvalidMarket {
                field: "mark_price",
                value: mark_price,
            });
        }
        if !funding_rate.is_finite() {
            return Err(VenueError::InvalidMarket {
                field: "funding_rate",
                value: funding_rate,
            });
        }
        self.mark_price = mark_price;
        self.funding_rate = funding_rate;
        Ok(())
    }

    fn check_symbol(&self, symbol: &str) -> Result<(), VenueError> {
        if symbol == self.config.symbol {
            Ok(())
        } else {
            Err(VenueError::UnsupportedSymbol(symbol.to_string()))
        }
    }
}

impl VenueAdapter for SimVenue {
    fn get_positions(&self) -> Result<Vec<VenuePosition>, VenueError> {
        if self.position_qty == 0.0 {
            return Ok(Vec::new());
        }
        Ok(vec![VenuePosition {
            symbol: self.config.symbol.clone(),
            venue: self.config.venue.clone(),
            side: PositionSide::from_qty(self.position_qty),
            qty: self.position_qty.abs(),
            entry_price: self.mark_price,
        }])
    }

    fn place_order(
        &mut self,
        request: &OrderRequest,
        ts: DateTime<Utc>,
    ) -> Result<FillReport, VenueError> {
        self.check_symbol(&request.symbol)?;
        if !request.qty.is_finite() || request.qty < 0.0 {
            return Err(VenueError::InvalidQuantity(request.qty));
        }

        self.order_seq += 1;
        let qty = request.qty;
        let filled_qty = qty * self.config.max_fill_ratio;
        let status = if filled_qty == qty {
            FillStatus::Filled
        } else {
            FillStatus::Partial
        };

        let notional = filled_qty * self.mark_price;
        let slippage_bps = self.config.slippage_bps_at_1x_notional * (notional / self.equity);
        let slip = slippage_bps / 1e4;
        let fill_price = match request.side {
            OrderSide::Buy => self.mark_price * (1.0 + slip),
            OrderSide::Sell => self.mark_price * (1.0 - slip),
        };
        self.position_qty += request.side.sign() * filled_qty;

        Ok(FillReport {
            order_id: format!("sim-{}", self.order_seq),
            client_order_id: request.client_order_id.clone(),
            symbol: request.symbol.clone(),
            side: request.side,
            requested_qty: qty,
            filled_qty,
            fill_price,
            mark_price: self.mark_price,
            slippage_bps,
            status,
            reason: None,
            ts,
        })
    }

    fn cancel_order(&mut self, _order_id: &str) -> Result<bool, VenueError> {
        Ok(true)
    }

    fn get_mark_price(&self, symbol: &str) -> Result<f64, VenueError> {
        self.check_symbol(symbol)?;
        Ok(self.mark_price)
    }

    fn get_funding_rate(&self, symbol: &str) -> Result<f64, VenueError> {
        self.check_symbol(symbol)?;
        Ok(self.funding_rate)
    }

    fn get_margin_status(&self) -> Result<MarginStatus, VenueError> {
        Ok(MarginStatus {
            equity: self.equity,
            gross_exposure: (self.position_qty * self.mark_price).abs(),
            maintenance_margin_ratio: self.config.maintenance_margin_ratio,
        })
    }
}
