//! Port definitions for collaborators outside the ledger.
//!
//! The product catalog is owned elsewhere; the ledger only reads it to
//! check ownership and activity and to enrich balances for display.

use async_trait::async_trait;

use stockledger_domain::{CategoryId, OrganizationId, Product, ProductId};

use crate::error::LedgerError;

// =============================================================================
// Product Catalog Port
// =============================================================================

/// Port for product lookups.
///
/// Implementations:
/// - `StubCatalog` - in-process map for tests and development
/// - `PgCatalog` - reads the `products` table (daemon, `postgres` feature)
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Find a product by id, regardless of owner.
    ///
    /// `Ok(None)` means the product does not exist. `Err` is reserved for
    /// lookup failures and must not be used for a missing product.
    async fn find_product(&self, product_id: ProductId) -> Result<Option<Product>, LedgerError>;

    /// Ids of the organization's products in a category
    async fn products_in_category(
        &self,
        organization_id: OrganizationId,
        category_id: CategoryId,
    ) -> Result<Vec<ProductId>, LedgerError>;
}
