//! Document domain module (event-sourced).
//!
//! Purchase receipts and sales share one [`Document`] aggregate and one
//! transition table. The aggregate records lifecycle facts; moving stock on
//! confirm and cancel is the caller's job (see `stockledger-infra`).

pub mod document;
pub mod filter;
pub mod line;
pub mod numbering;
pub mod status;
pub mod validator;

pub use document::{
    AuditTrail, CancelDocument, ConfirmDocument, CounterpartyId, CreateDocument, DeleteDocument,
    DeliverDocument, Document, DocumentCancelled, DocumentCommand, DocumentConfirmed,
    DocumentCreated, DocumentDeleted, DocumentDelivered, DocumentEvent, DocumentHeader, DocumentId,
    DocumentPatch, DocumentShipped, DocumentUpdated, PaymentType, ShipDocument, Stamp,
    UpdateDocument,
};
pub use filter::DocumentFilter;
pub use line::{AppliedLine, DocumentLine, LineInput, total_amount};
pub use numbering::{DocumentNumbering, SequenceGenerator};
pub use status::{DocumentKind, DocumentStatus, LifecycleAction, transition};
pub use validator::{ValidationMode, build_line, ensure_transactable, validate_tracking};
