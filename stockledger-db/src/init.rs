//! Demo catalog seeding.
//!
//! Product management lives outside the ledger, but a local database needs
//! a few products before stock can be booked against them.

use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::info;

use super::Result;

/// Demo products: (name, base price in cents, active)
pub const DEMO_PRODUCTS: &[(&str, i64, bool)] = &[
    ("Pilsner 0.5l", 350, true),
    ("Cider 0.33l", 420, true),
    ("Lemonade", 250, true),
    ("Seasonal Stout", 500, false),
];

/// Id of the `index`-th demo product of an organization
pub fn demo_product_id(organization_id: i64, index: usize) -> i64 {
    organization_id * 1000 + index as i64 + 1
}

/// Insert the demo products for `organization_id`.
///
/// Product ids are `organization_id * 1000 + n` so re-running is a no-op
/// (INSERT ... ON CONFLICT DO NOTHING). Returns the product ids.
pub async fn seed_demo_catalog(pool: &PgPool, organization_id: i64) -> Result<Vec<i64>> {
    let mut tx = pool.begin().await?;
    let mut ids = Vec::with_capacity(DEMO_PRODUCTS.len());

    for (n, (name, cents, active)) in DEMO_PRODUCTS.iter().enumerate() {
        let product_id = demo_product_id(organization_id, n);

        sqlx::query(
            r#"
            INSERT INTO products (product_id, organization_id, category_id, name, base_price, is_active)
            VALUES ($1, $2, NULL, $3, $4, $5)
            ON CONFLICT (product_id) DO NOTHING
            "#,
        )
        .bind(product_id)
        .bind(organization_id)
        .bind(*name)
        .bind(Decimal::new(*cents, 2))
        .bind(*active)
        .execute(&mut *tx)
        .await?;

        ids.push(product_id);
    }

    tx.commit().await?;

    info!(organization_id, products = ids.len(), "Demo catalog seeded");
    Ok(ids)
}
