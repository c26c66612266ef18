//! Per-discipline stock records held by an inventory aggregate.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::tracking::BatchId;

/// One individually tracked unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialUnit {
    pub serial_number: String,
    pub is_sold: bool,
    pub received_at: DateTime<Utc>,
    pub sold_at: Option<DateTime<Utc>>,
}

/// Quantity held under one lot code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotBatch {
    pub quantity: i64,
    pub received_at: DateTime<Utc>,
}

/// Quantity sharing one expiration date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpirationBatch {
    pub id: BatchId,
    pub expiration_date: NaiveDate,
    pub quantity: i64,
    pub received_at: DateTime<Utc>,
}

impl ExpirationBatch {
    /// A batch is expired once its date lies strictly before `today`.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiration_date < today
    }
}
