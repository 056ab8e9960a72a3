//! Domain types: the input price series and the records a simulation emits.

pub mod bar;
pub mod lifecycle;
pub mod portfolio;
pub mod regime;
pub mod series;
pub mod trade;

pub use bar::BarResult;
pub use lifecycle::{CloseReason, PositionSide, TradeLifecycle};
pub use portfolio::{gross_notional, PortfolioState, RiskMode};
pub use regime::Regime;
pub use series::{PriceSeries, SeriesError};
pub use trade::{Leg, Sleeve, TradeEvent};
