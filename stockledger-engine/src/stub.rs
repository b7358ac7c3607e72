//! Stub catalog for testing.
//!
//! Holds products in memory and can simulate a catalog outage.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use stockledger_domain::{CategoryId, OrganizationId, Product, ProductId};

use crate::error::LedgerError;
use crate::ports::ProductCatalog;

// =============================================================================
// Stub Catalog
// =============================================================================

/// In-memory product catalog.
#[derive(Debug, Default)]
pub struct StubCatalog {
    /// Products by id
    products: RwLock<HashMap<ProductId, Product>>,
    /// Whether the next lookup fails
    fail_next: RwLock<bool>,
}

impl StubCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a product.
    pub fn insert(&self, product: Product) {
        self.write_products().insert(product.id, product);
    }

    /// Insert an active, uncategorised product and return it.
    pub fn add_product(
        &self,
        id: ProductId,
        organization_id: OrganizationId,
        name: &str,
        base_price: Decimal,
    ) -> Product {
        let product = Product {
            id,
            organization_id,
            category_id: None,
            name: name.to_string(),
            base_price,
            active: true,
        };
        self.insert(product.clone());
        product
    }

    /// Toggle a product's active flag. Returns false if unknown.
    pub fn set_active(&self, id: ProductId, active: bool) -> bool {
        match self.write_products().get_mut(&id) {
            Some(product) => {
                product.active = active;
                true
            },
            None => false,
        }
    }

    /// Move a product into a category. Returns false if unknown.
    pub fn set_category(&self, id: ProductId, category_id: Option<CategoryId>) -> bool {
        match self.write_products().get_mut(&id) {
            Some(product) => {
                product.category_id = category_id;
                true
            },
            None => false,
        }
    }

    /// Remove a product, as if it was deleted from the catalog.
    pub fn remove(&self, id: ProductId) -> Option<Product> {
        self.write_products().remove(&id)
    }

    /// Configure the next lookup to fail.
    pub fn set_fail_next(&self, fail: bool) {
        let mut fail_next = self
            .fail_next
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *fail_next = fail;
    }

    fn should_fail(&self) -> bool {
        let mut fail_next = self
            .fail_next
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *fail_next)
    }

    fn read_products(&self) -> RwLockReadGuard<'_, HashMap<ProductId, Product>> {
        self.products
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_products(&self) -> RwLockWriteGuard<'_, HashMap<ProductId, Product>> {
        self.products
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ProductCatalog for StubCatalog {
    async fn find_product(&self, product_id: ProductId) -> Result<Option<Product>, LedgerError> {
        if self.should_fail() {
            return Err(LedgerError::Catalog("simulated catalog failure".to_string()));
        }
        Ok(self.read_products().get(&product_id).cloned())
    }

    async fn products_in_category(
        &self,
        organization_id: OrganizationId,
        category_id: CategoryId,
    ) -> Result<Vec<ProductId>, LedgerError> {
        if self.should_fail() {
            return Err(LedgerError::Catalog("simulated catalog failure".to_string()));
        }
        let mut ids: Vec<ProductId> = self
            .read_products()
            .values()
            .filter(|p| p.organization_id == organization_id && p.category_id == Some(category_id))
            .map(|p| p.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_find_product() {
        let catalog = StubCatalog::new();
        catalog.add_product(1, 10, "Espresso", dec!(2.50));

        let found = catalog.find_product(1).await.unwrap().unwrap();
        assert_eq!(found.name, "Espresso");
        assert!(catalog.find_product(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fail_next_resets() {
        let catalog = StubCatalog::new();
        catalog.add_product(1, 10, "Espresso", dec!(2.50));
        catalog.set_fail_next(true);

        assert!(catalog.find_product(1).await.is_err());
        assert!(catalog.find_product(1).await.is_ok());
    }

    #[tokio::test]
    async fn test_products_in_category_scoped_to_organization() {
        let catalog = StubCatalog::new();
        catalog.add_product(1, 10, "Espresso", dec!(2.50));
        catalog.add_product(2, 10, "Croissant", dec!(3));
        catalog.add_product(3, 20, "Latte", dec!(4));
        catalog.set_category(1, Some(5));
        catalog.set_category(3, Some(5));

        assert_eq!(catalog.products_in_category(10, 5).await.unwrap(), vec![1]);
        assert!(catalog.products_in_category(10, 6).await.unwrap().is_empty());
    }
}
