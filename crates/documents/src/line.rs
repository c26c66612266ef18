use serde::{Deserialize, Serialize};

use stockledger_catalog::{ProductId, TrackingType};
use stockledger_core::{DomainError, DomainResult};
use stockledger_inventory::TrackingPayload;

/// A line as submitted by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInput {
    pub product_id: ProductId,
    pub quantity: i64,
    /// Price in smallest currency unit.
    pub unit_price: u64,
    #[serde(default)]
    pub tracking: TrackingPayload,
}

impl LineInput {
    pub fn new(product_id: ProductId, quantity: i64, unit_price: u64) -> Self {
        Self {
            product_id,
            quantity,
            unit_price,
            tracking: TrackingPayload::none(),
        }
    }

    pub fn with_tracking(mut self, tracking: TrackingPayload) -> Self {
        self.tracking = tracking;
        self
    }
}

/// A validated document line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: u64,
    pub line_total: u64,
    pub tracking: TrackingPayload,
    /// Payload the ledger actually applied at confirmation.
    ///
    /// Cancellation replays this, not `tracking`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_tracking: Option<TrackingPayload>,
    /// Product discipline at confirmation. Cancellation reverses under it even
    /// if the catalog entry changes later.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_tracking_type: Option<TrackingType>,
}

/// What the ledger applied for one line at confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedLine {
    pub tracking_type: TrackingType,
    pub tracking: TrackingPayload,
}

impl AppliedLine {
    pub fn new(tracking_type: TrackingType, tracking: TrackingPayload) -> Self {
        Self {
            tracking_type,
            tracking,
        }
    }
}

impl DocumentLine {
    pub fn from_input(line_no: u32, input: LineInput) -> DomainResult<Self> {
        if input.quantity <= 0 {
            return Err(DomainError::validation(format!(
                "line {line_no}: quantity must be positive"
            )));
        }

        let line_total = line_total(input.quantity, input.unit_price).ok_or_else(|| {
            DomainError::validation(format!("line {line_no}: line total overflows"))
        })?;

        Ok(Self {
            line_no,
            product_id: input.product_id,
            quantity: input.quantity,
            unit_price: input.unit_price,
            line_total,
            tracking: input.tracking,
            applied_tracking: None,
            applied_tracking_type: None,
        })
    }

    /// Payload to hand the ledger when reversing this line.
    pub fn reversal_tracking(&self) -> &TrackingPayload {
        self.applied_tracking.as_ref().unwrap_or(&self.tracking)
    }

    pub fn record_applied(&mut self, applied: &AppliedLine) {
        self.applied_tracking = Some(applied.tracking.clone());
        self.applied_tracking_type = Some(applied.tracking_type);
    }
}

fn line_total(quantity: i64, unit_price: u64) -> Option<u64> {
    u64::try_from(quantity).ok()?.checked_mul(unit_price)
}

/// Sum of line totals; `Validation` on overflow.
pub fn total_amount(lines: &[DocumentLine]) -> DomainResult<u64> {
    lines
        .iter()
        .try_fold(0u64, |acc, line| acc.checked_add(line.line_total))
        .ok_or_else(|| DomainError::validation("document total overflows"))
}
