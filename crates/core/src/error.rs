//! Domain error model.
//!
//! Every business-rule rejection in the ledger and document lifecycle maps to
//! exactly one variant here. Each variant has a stable machine code (see
//! [`DomainError::code`]) and belongs to one [`ErrorKind`], which callers use
//! to pick a response class (4xx-equivalent vs internal fault).

use chrono::NaiveDate;
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Coarse classification of a [`DomainError`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or missing input relative to the declared tracking type.
    Validation,
    /// The document is not in the lifecycle state the operation requires.
    State,
    /// The ledger cannot satisfy the request with the stock it holds.
    Resource,
    /// A document or product does not exist.
    NotFound,
    /// Optimistic concurrency lost more races than allowed.
    Conflict,
    /// Internal consistency fault; should be unreachable.
    Internal,
}

/// Domain-level error.
///
/// Keep this focused on deterministic business failures. Storage faults live
/// in the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed generic validation (e.g. non-positive quantity).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The tracking payload lacks what the declared tracking type requires.
    #[error("tracking payload invalid: {0}")]
    TrackingPayloadInvalid(String),

    #[error("serial numbers are required for serialized products")]
    SerialNumbersRequired,

    #[error("lot code is required for lot-tracked products")]
    LotCodeRequired,

    #[error("serial number count ({actual}) must match quantity ({expected})")]
    SerialCountMismatch { expected: i64, actual: usize },

    #[error("product '{0}' is a variant parent and cannot be transacted")]
    VariantParentNotTransactable(String),

    #[error("cannot {action} a document with status {status}")]
    InvalidStatusTransition { status: String, action: String },

    #[error("document with status {0} is not editable")]
    DocumentNotEditable(String),

    #[error("insufficient stock (available: {available}, requested: {requested})")]
    InsufficientStock { available: i64, requested: i64 },

    #[error("serial number '{0}' is not available")]
    SerialNotAvailable(String),

    #[error("serial number '{0}' already exists at this location")]
    DuplicateSerial(String),

    #[error("expiration batch {batch} expired on {expired_on}")]
    ExpiredBatch { batch: u64, expired_on: NaiveDate },

    #[error("product '{0}' not found")]
    ProductNotFound(String),

    #[error("document '{0}' not found")]
    DocumentNotFound(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A write would have taken the aggregate's quantity below zero.
    ///
    /// Per-strategy checks should make this unreachable.
    #[error("stock cannot go negative (current: {current}, delta: {delta})")]
    NegativeStockInvariantViolated { current: i64, delta: i64 },

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn payload_invalid(msg: impl Into<String>) -> Self {
        Self::TrackingPayloadInvalid(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_transition(status: impl core::fmt::Display, action: impl Into<String>) -> Self {
        Self::InvalidStatusTransition {
            status: status.to_string(),
            action: action.into(),
        }
    }

    pub fn insufficient(available: i64, requested: i64) -> Self {
        Self::InsufficientStock {
            available,
            requested,
        }
    }

    /// Stable, machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "VALIDATION_FAILED",
            DomainError::TrackingPayloadInvalid(_) => "TRACKING_PAYLOAD_INVALID",
            DomainError::SerialNumbersRequired => "SERIAL_NUMBERS_REQUIRED",
            DomainError::LotCodeRequired => "LOT_CODE_REQUIRED",
            DomainError::SerialCountMismatch { .. } => "SERIAL_COUNT_MISMATCH",
            DomainError::VariantParentNotTransactable(_) => "VARIANT_PARENT_NOT_TRANSACTABLE",
            DomainError::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            DomainError::DocumentNotEditable(_) => "DOCUMENT_NOT_EDITABLE",
            DomainError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            DomainError::SerialNotAvailable(_) => "SERIAL_NOT_AVAILABLE",
            DomainError::DuplicateSerial(_) => "DUPLICATE_SERIAL",
            DomainError::ExpiredBatch { .. } => "EXPIRED_BATCH",
            DomainError::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            DomainError::DocumentNotFound(_) => "DOCUMENT_NOT_FOUND",
            DomainError::InvalidId(_) => "INVALID_ID",
            DomainError::NegativeStockInvariantViolated { .. } => "NEGATIVE_STOCK_INVARIANT_VIOLATED",
            DomainError::InvariantViolation(_) => "INVARIANT_VIOLATION",
            DomainError::Conflict(_) => "CONFLICT",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Validation(_)
            | DomainError::TrackingPayloadInvalid(_)
            | DomainError::SerialNumbersRequired
            | DomainError::LotCodeRequired
            | DomainError::SerialCountMismatch { .. }
            | DomainError::VariantParentNotTransactable(_)
            | DomainError::InvalidId(_) => ErrorKind::Validation,
            DomainError::InvalidStatusTransition { .. } | DomainError::DocumentNotEditable(_) => {
                ErrorKind::State
            }
            DomainError::InsufficientStock { .. }
            | DomainError::SerialNotAvailable(_)
            | DomainError::DuplicateSerial(_)
            | DomainError::ExpiredBatch { .. } => ErrorKind::Resource,
            DomainError::ProductNotFound(_) | DomainError::DocumentNotFound(_) => {
                ErrorKind::NotFound
            }
            DomainError::Conflict(_) => ErrorKind::Conflict,
            DomainError::NegativeStockInvariantViolated { .. }
            | DomainError::InvariantViolation(_) => ErrorKind::Internal,
        }
    }

    /// Input field a validation failure is scoped to, when there is one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            DomainError::SerialNumbersRequired
            | DomainError::SerialCountMismatch { .. }
            | DomainError::SerialNotAvailable(_)
            | DomainError::DuplicateSerial(_) => Some("serial_numbers"),
            DomainError::LotCodeRequired => Some("lot_code"),
            DomainError::VariantParentNotTransactable(_) | DomainError::ProductNotFound(_) => {
                Some("product_id")
            }
            DomainError::ExpiredBatch { .. } => Some("expiration_batch_id"),
            _ => None,
        }
    }

    /// True for faults that indicate a bug rather than a rejected request.
    pub fn is_internal(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }
}
