//! Document kinds, statuses and the shared transition table.

use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult};
use stockledger_inventory::StockDirection;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentKind {
    /// Incoming goods from a supplier.
    PurchaseReceipt,
    /// Outgoing goods to a customer.
    Sale,
}

impl DocumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::PurchaseReceipt => "purchase_receipt",
            DocumentKind::Sale => "sale",
        }
    }

    /// Ledger direction applied on confirmation. Cancellation uses the inverse.
    pub fn confirm_direction(self) -> StockDirection {
        match self {
            DocumentKind::PurchaseReceipt => StockDirection::Increase,
            DocumentKind::Sale => StockDirection::Decrease,
        }
    }
}

impl core::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Draft,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl DocumentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Draft => "DRAFT",
            DocumentStatus::Confirmed => "CONFIRMED",
            DocumentStatus::Shipped => "SHIPPED",
            DocumentStatus::Delivered => "DELIVERED",
            DocumentStatus::Cancelled => "CANCELLED",
        }
    }
}

impl core::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    Confirm,
    Cancel,
    Ship,
    Deliver,
}

impl LifecycleAction {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleAction::Confirm => "confirm",
            LifecycleAction::Cancel => "cancel",
            LifecycleAction::Ship => "ship",
            LifecycleAction::Deliver => "deliver",
        }
    }

    /// Ledger direction this action drives for `kind`, if it touches stock.
    pub fn ledger_direction(self, kind: DocumentKind) -> Option<StockDirection> {
        match self {
            LifecycleAction::Confirm => Some(kind.confirm_direction()),
            LifecycleAction::Cancel => Some(kind.confirm_direction().inverse()),
            LifecycleAction::Ship | LifecycleAction::Deliver => None,
        }
    }
}

use DocumentKind::{PurchaseReceipt, Sale};
use DocumentStatus::{Cancelled, Confirmed, Delivered, Draft, Shipped};
use LifecycleAction::{Cancel, Confirm, Deliver, Ship};

/// (kind, action, from) -> to. Anything absent is an invalid transition.
const TRANSITIONS: &[(DocumentKind, LifecycleAction, DocumentStatus, DocumentStatus)] = &[
    (PurchaseReceipt, Confirm, Draft, Confirmed),
    (PurchaseReceipt, Cancel, Confirmed, Cancelled),
    (Sale, Confirm, Draft, Confirmed),
    (Sale, Cancel, Confirmed, Cancelled),
    (Sale, Ship, Confirmed, Shipped),
    (Sale, Deliver, Shipped, Delivered),
];

/// Target status of `action` on a `kind` document currently in `from`.
pub fn transition(
    kind: DocumentKind,
    action: LifecycleAction,
    from: DocumentStatus,
) -> DomainResult<DocumentStatus> {
    TRANSITIONS
        .iter()
        .find(|(k, a, f, _)| *k == kind && *a == action && *f == from)
        .map(|(_, _, _, to)| *to)
        .ok_or_else(|| DomainError::invalid_transition(from, action.as_str()))
}
