//! Inventory domain module (event-sourced).
//!
//! One [`InventoryAggregate`] per (product, location) pair, with four
//! tracking disciplines dispatched over a closed [`TrackingSpec`]. Pure
//! deterministic domain logic: no IO, no clocks, no logging.

pub mod stock;
mod strategy;
pub mod tracking;
pub mod units;

pub use stock::{
    AvailableLot, DecreaseStock, IncreaseStock, InventoryAggregate, MovementKind, StockChange,
    StockCommand, StockDirection, StockEvent, StockKey, StockMovement,
};
pub use tracking::{BatchId, TrackingPayload, TrackingSpec};
pub use units::{ExpirationBatch, LotBatch, SerialUnit};
