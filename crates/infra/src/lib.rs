//! Infrastructure layer: stores, config, and the services that drive the
//! inventory and document aggregates.
//!
//! - [`StockLedger`]: the single writer of stock, with optimistic retries.
//! - [`DocumentLifecycle`]: receipts and sales, turning confirm/cancel into
//!   ledger calls.
//! - In-memory stores, catalog and sequence for tests/dev.

pub mod catalog;
pub mod config;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod sequence;
pub mod store;


pub use catalog::InMemoryProductCatalog;
pub use config::LedgerConfig;
pub use error::{ServiceError, ServiceResult, StoreError};
pub use ledger::{INVARIANT_TARGET, STOCK_AGGREGATE_TYPE, StockLedger};
pub use lifecycle::{
    DOCUMENT_AGGREGATE_TYPE, DocumentEdit, DocumentLifecycle, NewDocument, RequestContext,
};
pub use sequence::InMemorySequence;
pub use store::{DocumentStore, InMemoryDocumentStore, InMemoryInventoryStore, InventoryStore};
