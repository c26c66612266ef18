//! Aggregate persistence boundary.
//!
//! Stores keep the latest state of each aggregate and guard every write with
//! an [`ExpectedVersion`](stockledger_core::ExpectedVersion) compare-and-swap.
//! The in-memory implementations are for tests/dev.

pub mod document;
pub mod inventory;

pub use document::{DocumentStore, InMemoryDocumentStore};
pub use inventory::{InMemoryInventoryStore, InventoryStore};
