//! Database lifecycle management for Stockledger.
//!
//! Provides migration running, status checking, and demo catalog seeding.

mod init;

pub use init::{demo_product_id, seed_demo_catalog, DEMO_PRODUCTS};

use sqlx::{PgPool, Row};
use tracing::{info, warn};

/// Result type for DB operations.
pub type Result<T> = std::result::Result<T, anyhow::Error>;

/// Run all pending migrations.
///
/// Uses sqlx migrations from the workspace `migrations` directory.
/// Idempotent: safe to run multiple times.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    info!("Running database migrations...");

    sqlx::migrate!("../migrations").run(pool).await?;

    info!("Migrations completed successfully");
    Ok(())
}

/// One applied migration as recorded by sqlx
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub version: i64,
    pub description: String,
    pub success: bool,
}

/// Row counts of the ledger tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerCounts {
    pub products: i64,
    pub balances: i64,
    pub entries: i64,
    /// Balances whose quantity differs from the sum of their entries
    pub drifted_balances: i64,
}

/// What `db status` found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerStatus {
    /// Latest applied migrations, newest first
    pub migrations: Vec<AppliedMigration>,
    /// `None` until the schema has been migrated
    pub counts: Option<LedgerCounts>,
}

/// Check database connectivity, migration status and ledger consistency.
///
/// Logs the latest applied migrations and the ledger table sizes, and warns
/// about balances that no longer match their ledger.
pub async fn status(pool: &PgPool) -> Result<LedgerStatus> {
    let result: i32 = sqlx::query_scalar("SELECT 1").fetch_one(pool).await?;

    if result != 1 {
        return Err(anyhow::anyhow!("Database connectivity check failed"));
    }

    info!("Database connectivity: OK");

    let migrations = applied_migrations(pool).await?;
    if migrations.is_empty() {
        warn!("No migrations found in database (run `stockledgerd db migrate` first)");
        return Ok(LedgerStatus::default());
    }

    info!("Latest migrations:");
    for mig in &migrations {
        let status = if mig.success { "ok" } else { "FAILED" };
        info!("  [{}] v{}: {}", status, mig.version, mig.description);
    }

    let counts = ledger_counts(pool).await?;
    info!(
        products = counts.products,
        balances = counts.balances,
        entries = counts.entries,
        "Ledger tables"
    );
    if counts.drifted_balances > 0 {
        warn!(
            drifted = counts.drifted_balances,
            "Balances disagree with the sum of their ledger entries"
        );
    }

    Ok(LedgerStatus {
        migrations,
        counts: Some(counts),
    })
}

async fn applied_migrations(pool: &PgPool) -> Result<Vec<AppliedMigration>> {
    // Runtime query: sqlx::query! would need a database at compile time
    let rows = sqlx::query(
        r#"
        SELECT version, description, success
        FROM _sqlx_migrations
        ORDER BY version DESC
        LIMIT 10
        "#,
    )
    .fetch_all(pool)
    .await;

    match rows {
        Ok(rows) => rows
            .iter()
            .map(|row| -> Result<AppliedMigration> {
                Ok(AppliedMigration {
                    version: row.try_get("version")?,
                    description: row.try_get("description")?,
                    success: row.try_get("success")?,
                })
            })
            .collect(),
        // Table does not exist before the first migration
        Err(e) if e.to_string().contains("_sqlx_migrations") => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

async fn ledger_counts(pool: &PgPool) -> Result<LedgerCounts> {
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM products) AS products,
            (SELECT COUNT(*) FROM stock_balances) AS balances,
            (SELECT COUNT(*) FROM ledger_entries) AS entries,
            (SELECT COUNT(*)
               FROM stock_balances b
               LEFT JOIN (
                   SELECT organization_id, product_id, SUM(quantity_change) AS total
                   FROM ledger_entries
                   GROUP BY organization_id, product_id
               ) e USING (organization_id, product_id)
              WHERE b.quantity <> COALESCE(e.total, 0)) AS drifted
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(LedgerCounts {
        products: row.try_get("products")?,
        balances: row.try_get("balances")?,
        entries: row.try_get("entries")?,
        drifted_balances: row.try_get("drifted")?,
    })
}
