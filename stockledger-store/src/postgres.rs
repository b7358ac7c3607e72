//! PostgreSQL ledger store.
//!
//! Balances live in `stock_balances`, entries in `ledger_entries`.
//! Every mutation runs inside one database transaction: the balance row is
//! created if missing and then locked with `SELECT .. FOR UPDATE`, so
//! concurrent writers on the same balance queue behind each other.
//!
//! This module uses dynamic queries (sqlx::query) instead of compile-time
//! checked macros (sqlx::query!) to allow compilation without DATABASE_URL.

use crate::error::StoreError;
use crate::repository::{LedgerStore, LedgerTx};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use stockledger_domain::{BalanceKey, LedgerEntry, OrganizationId, StockBalance, TransactionKind};
use tracing::debug;

/// PostgreSQL-backed ledger store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a store over an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Open database transaction
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

fn parse_balance_row(row: &PgRow) -> Result<StockBalance, sqlx::Error> {
    Ok(StockBalance {
        organization_id: row.try_get("organization_id")?,
        product_id: row.try_get("product_id")?,
        quantity: row.try_get("quantity")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn parse_entry_row(row: &PgRow) -> Result<LedgerEntry, StoreError> {
    let kind: String = row.try_get("kind")?;
    let kind: TransactionKind = kind.parse().map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    Ok(LedgerEntry {
        id: row.try_get("entry_id")?,
        organization_id: row.try_get("organization_id")?,
        product_id: row.try_get("product_id")?,
        kind,
        quantity_change: row.try_get::<Decimal, _>("quantity_change")?,
        quantity_before: row.try_get::<Decimal, _>("quantity_before")?,
        quantity_after: row.try_get::<Decimal, _>("quantity_after")?,
        correlation_id: row.try_get("correlation_id")?,
        notes: row.try_get("notes")?,
        actor_id: row.try_get("actor_id")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl LedgerTx for PgTx {
    async fn lock_balance(
        &mut self,
        key: BalanceKey,
        now: DateTime<Utc>,
    ) -> Result<StockBalance, StoreError> {
        // Make sure a row exists to lock. A concurrent creator blocks here
        // until it commits or rolls back.
        sqlx::query(
            r#"
            INSERT INTO stock_balances (organization_id, product_id, quantity, created_at, updated_at)
            VALUES ($1, $2, 0, $3, $3)
            ON CONFLICT (organization_id, product_id) DO NOTHING
            "#,
        )
        .bind(key.organization_id)
        .bind(key.product_id)
        .bind(now)
        .execute(&mut *self.tx)
        .await?;

        let row = sqlx::query(
            r#"
            SELECT organization_id, product_id, quantity, created_at, updated_at
            FROM stock_balances
            WHERE organization_id = $1 AND product_id = $2
            FOR UPDATE
            "#,
        )
        .bind(key.organization_id)
        .bind(key.product_id)
        .fetch_one(&mut *self.tx)
        .await?;

        debug!(balance = %key, "Balance row locked");
        Ok(parse_balance_row(&row)?)
    }

    async fn put_balance(&mut self, balance: &StockBalance) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE stock_balances
            SET quantity = $3, updated_at = $4
            WHERE organization_id = $1 AND product_id = $2
            "#,
        )
        .bind(balance.organization_id)
        .bind(balance.product_id)
        .bind(balance.quantity)
        .bind(balance.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("balance", balance.key().to_string()));
        }
        Ok(())
    }

    async fn append_entry(&mut self, entry: &LedgerEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO ledger_entries (
                entry_id, organization_id, product_id, kind,
                quantity_change, quantity_before, quantity_after,
                correlation_id, notes, actor_id, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(entry.id)
        .bind(entry.organization_id)
        .bind(entry.product_id)
        .bind(entry.kind.as_str())
        .bind(entry.quantity_change)
        .bind(entry.quantity_before)
        .bind(entry.quantity_after)
        .bind(&entry.correlation_id)
        .bind(&entry.notes)
        .bind(entry.actor_id)
        .bind(entry.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn find_balance(&self, key: BalanceKey) -> Result<Option<StockBalance>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT organization_id, product_id, quantity, created_at, updated_at
            FROM stock_balances
            WHERE organization_id = $1 AND product_id = $2
            "#,
        )
        .bind(key.organization_id)
        .bind(key.product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(parse_balance_row).transpose()?)
    }

    async fn list_balances(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<StockBalance>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT organization_id, product_id, quantity, created_at, updated_at
            FROM stock_balances
            WHERE organization_id = $1
            ORDER BY product_id ASC
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| parse_balance_row(row).map_err(StoreError::from))
            .collect()
    }

    async fn list_entries(&self, key: BalanceKey) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT entry_id, organization_id, product_id, kind,
                   quantity_change, quantity_before, quantity_after,
                   correlation_id, notes, actor_id, created_at
            FROM ledger_entries
            WHERE organization_id = $1 AND product_id = $2
            ORDER BY seq DESC
            "#,
        )
        .bind(key.organization_id)
        .bind(key.product_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(parse_entry_row).collect()
    }
}
