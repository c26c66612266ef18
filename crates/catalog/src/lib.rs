//! Product catalog boundary.
//!
//! The stock core consumes products by id and only needs their tracking
//! discipline, variant-parent flag, and display name.

pub mod product;

pub use product::{ProductCatalog, ProductId, ProductInfo, TrackingType};
