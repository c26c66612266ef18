use chrono::{DateTime, Utc};

/// A domain-agnostic event.
///
/// Events are immutable facts about an accepted change (a stock movement, a
/// document transition). They are versioned for schema evolution.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "inventory.stock.lot_increased").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
