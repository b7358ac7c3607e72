//! Repository trait definitions (Ports)
//!
//! These traits define the storage interface for the ledger.
//! Implementations can be PostgreSQL, in-memory, or mock for testing.

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stockledger_domain::{BalanceKey, LedgerEntry, OrganizationId, StockBalance};

/// One atomic unit of work against the ledger.
///
/// Writes become visible only after `commit`. Dropping the handle without
/// committing discards every staged write, which is what happens when a
/// request future is cancelled mid-flight.
#[async_trait]
pub trait LedgerTx: Send {
    /// Lock the balance for `key` for the rest of the transaction.
    ///
    /// A missing balance is created with quantity 0 inside this transaction,
    /// so it disappears again if the transaction does not commit.
    async fn lock_balance(
        &mut self,
        key: BalanceKey,
        now: DateTime<Utc>,
    ) -> Result<StockBalance, StoreError>;

    /// Persist the new quantity and timestamp of a locked balance
    async fn put_balance(&mut self, balance: &StockBalance) -> Result<(), StoreError>;

    /// Append an immutable ledger entry
    async fn append_entry(&mut self, entry: &LedgerEntry) -> Result<(), StoreError>;

    /// Make all staged writes durable at once
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discard all staged writes
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Ledger storage: committed reads plus a transaction factory
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Begin a transaction
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError>;

    /// Find the committed balance for a key
    async fn find_balance(&self, key: BalanceKey) -> Result<Option<StockBalance>, StoreError>;

    /// All committed balances of an organization, ordered by product id
    async fn list_balances(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<StockBalance>, StoreError>;

    /// Ledger entries of one balance, newest first
    async fn list_entries(&self, key: BalanceKey) -> Result<Vec<LedgerEntry>, StoreError>;
}
