//! In-memory product catalog for tests/dev.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use stockledger_catalog::{ProductCatalog, ProductId, ProductInfo};
use stockledger_core::{DomainError, DomainResult};

#[derive(Debug, Default)]
pub struct InMemoryProductCatalog {
    products: RwLock<HashMap<ProductId, ProductInfo>>,
    used: RwLock<HashSet<ProductId>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a product.
    pub fn insert(&self, product: ProductInfo) {
        if let Ok(mut products) = self.products.write() {
            products.insert(product.id, product);
        }
    }

    /// Whether a confirmed document has referenced the product.
    pub fn is_used(&self, id: ProductId) -> bool {
        self.used.read().map(|used| used.contains(&id)).unwrap_or(false)
    }
}

impl ProductCatalog for InMemoryProductCatalog {
    fn get_product(&self, id: ProductId) -> DomainResult<ProductInfo> {
        let products = self
            .products
            .read()
            .map_err(|_| DomainError::invariant("product catalog lock poisoned"))?;
        products
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::ProductNotFound(id.to_string()))
    }

    fn mark_used(&self, id: ProductId) -> DomainResult<()> {
        self.get_product(id)?;
        let mut used = self
            .used
            .write()
            .map_err(|_| DomainError::invariant("product catalog lock poisoned"))?;
        used.insert(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_catalog::TrackingType;

    #[test]
    fn unknown_product_is_not_found() {
        let catalog = InMemoryProductCatalog::new();
        let err = catalog.get_product(ProductId::generate()).unwrap_err();
        assert_eq!(err.code(), "PRODUCT_NOT_FOUND");
    }

    #[test]
    fn mark_used_flags_known_products() {
        let catalog = InMemoryProductCatalog::new();
        let info = ProductInfo::new(ProductId::generate(), "Soap", TrackingType::Simple);
        let id = info.id;
        catalog.insert(info);

        assert!(!catalog.is_used(id));
        catalog.mark_used(id).unwrap();
        assert!(catalog.is_used(id));
    }
}
