use std::sync::Arc;

use serde::{Deserialize, Serialize};

use stockledger_core::{AggregateId, DomainResult};

/// Product identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn generate() -> Self {
        Self(AggregateId::new())
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// How stock of a product is tracked. Exactly one discipline per product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackingType {
    /// Plain quantity.
    Simple,
    /// Individually serialized units.
    Serialized,
    /// Lot/batch-coded units.
    LotTracked,
    /// Expiration-dated batches.
    Expirable,
}

impl TrackingType {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackingType::Simple => "SIMPLE",
            TrackingType::Serialized => "SERIALIZED",
            TrackingType::LotTracked => "LOT_TRACKED",
            TrackingType::Expirable => "EXPIRABLE",
        }
    }
}

impl core::fmt::Display for TrackingType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the stock core needs to know about a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub id: ProductId,
    pub name: String,
    pub tracking_type: TrackingType,
    /// Aggregation placeholder for variants; never bought or sold itself.
    pub is_variant_parent: bool,
}

impl ProductInfo {
    pub fn new(id: ProductId, name: impl Into<String>, tracking_type: TrackingType) -> Self {
        Self {
            id,
            name: name.into(),
            tracking_type,
            is_variant_parent: false,
        }
    }

    pub fn variant_parent(mut self) -> Self {
        self.is_variant_parent = true;
        self
    }
}

/// Product catalog as seen from the stock core.
///
/// Catalog management (SKUs, variant hierarchy) lives elsewhere; this is only
/// the lookup boundary.
pub trait ProductCatalog: Send + Sync {
    /// Fails with `ProductNotFound` when the id is unknown.
    fn get_product(&self, id: ProductId) -> DomainResult<ProductInfo>;

    /// Flag the product as referenced by a confirmed document.
    fn mark_used(&self, id: ProductId) -> DomainResult<()>;
}

impl<C> ProductCatalog for Arc<C>
where
    C: ProductCatalog + ?Sized,
{
    fn get_product(&self, id: ProductId) -> DomainResult<ProductInfo> {
        (**self).get_product(id)
    }

    fn mark_used(&self, id: ProductId) -> DomainResult<()> {
        (**self).mark_used(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_type_serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&TrackingType::LotTracked).unwrap();
        assert_eq!(json, "\"LOT_TRACKED\"");
        assert_eq!(TrackingType::Expirable.to_string(), "EXPIRABLE");
    }

    #[test]
    fn variant_parent_builder_sets_flag() {
        let info = ProductInfo::new(ProductId::generate(), "T-Shirt", TrackingType::Simple)
            .variant_parent();
        assert!(info.is_variant_parent);
    }
}
