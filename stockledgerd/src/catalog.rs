//! Postgres product catalog.
//!
//! Reads the `products` table owned by the catalog service. The ledger
//! never writes it.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use stockledger_domain::{CategoryId, OrganizationId, Product, ProductId};
use stockledger_engine::{LedgerError, ProductCatalog};

/// Catalog adapter over the `products` table
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn catalog_error(err: sqlx::Error) -> LedgerError {
    LedgerError::Catalog(err.to_string())
}

fn parse_product_row(row: &PgRow) -> Result<Product, sqlx::Error> {
    Ok(Product {
        id: row.try_get("product_id")?,
        organization_id: row.try_get("organization_id")?,
        category_id: row.try_get("category_id")?,
        name: row.try_get("name")?,
        base_price: row.try_get("base_price")?,
        active: row.try_get("is_active")?,
    })
}

#[async_trait]
impl ProductCatalog for PgCatalog {
    async fn find_product(&self, product_id: ProductId) -> Result<Option<Product>, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT product_id, organization_id, category_id, name, base_price, is_active
            FROM products
            WHERE product_id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(catalog_error)?;

        row.as_ref()
            .map(parse_product_row)
            .transpose()
            .map_err(catalog_error)
    }

    async fn products_in_category(
        &self,
        organization_id: OrganizationId,
        category_id: CategoryId,
    ) -> Result<Vec<ProductId>, LedgerError> {
        sqlx::query_scalar(
            r#"
            SELECT product_id
            FROM products
            WHERE organization_id = $1 AND category_id = $2
            ORDER BY product_id
            "#,
        )
        .bind(organization_id)
        .bind(category_id)
        .fetch_all(&self.pool)
        .await
        .map_err(catalog_error)
    }
}
