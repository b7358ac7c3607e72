//! In-memory store implementation
//!
//! Used for testing and development without a database.
//! A transaction owns the store mutex from `begin` until it is committed,
//! rolled back or dropped, so transactions are fully serialized.

use crate::error::StoreError;
use crate::repository::{LedgerStore, LedgerTx};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use stockledger_domain::{BalanceKey, LedgerEntry, OrganizationId, StockBalance};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Committed state
#[derive(Default)]
struct Tables {
    balances: BTreeMap<BalanceKey, StockBalance>,
    entries: Vec<LedgerEntry>,
}

/// In-memory store for testing
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of balances
    pub async fn balance_count(&self) -> usize {
        self.tables.lock().await.balances.len()
    }

    /// Get the number of ledger entries
    pub async fn entry_count(&self) -> usize {
        self.tables.lock().await.entries.len()
    }

    /// Clear all data (useful for test setup)
    pub async fn clear(&self) {
        let mut tables = self.tables.lock().await;
        tables.balances.clear();
        tables.entries.clear();
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// Transaction over the in-memory tables.
///
/// Writes are staged and applied on commit; dropping discards them.
pub struct MemoryTx {
    tables: OwnedMutexGuard<Tables>,
    staged_balances: HashMap<BalanceKey, StockBalance>,
    staged_entries: Vec<LedgerEntry>,
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn lock_balance(
        &mut self,
        key: BalanceKey,
        now: DateTime<Utc>,
    ) -> Result<StockBalance, StoreError> {
        if let Some(staged) = self.staged_balances.get(&key) {
            return Ok(staged.clone());
        }

        let balance = match self.tables.balances.get(&key) {
            Some(existing) => existing.clone(),
            None => {
                let created = StockBalance::empty(key, now);
                self.staged_balances.insert(key, created.clone());
                created
            },
        };
        Ok(balance)
    }

    async fn put_balance(&mut self, balance: &StockBalance) -> Result<(), StoreError> {
        if balance.quantity < Decimal::ZERO {
            return Err(StoreError::Constraint(format!(
                "balance {} would become negative: {}",
                balance.key(),
                balance.quantity
            )));
        }
        self.staged_balances.insert(balance.key(), balance.clone());
        Ok(())
    }

    async fn append_entry(&mut self, entry: &LedgerEntry) -> Result<(), StoreError> {
        let key = entry.key();
        if !self.staged_balances.contains_key(&key) && !self.tables.balances.contains_key(&key) {
            return Err(StoreError::Constraint(format!(
                "ledger entry {} references missing balance {}",
                entry.id, key
            )));
        }
        self.staged_entries.push(entry.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx {
            mut tables,
            staged_balances,
            staged_entries,
        } = *self;

        debug!(
            balances = staged_balances.len(),
            entries = staged_entries.len(),
            "Committing in-memory transaction"
        );

        tables.balances.extend(staged_balances);
        tables.entries.extend(staged_entries);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        debug!(
            discarded_entries = self.staged_entries.len(),
            "Rolling back in-memory transaction"
        );
        Ok(())
    }
}

// =============================================================================
// Ledger Store Implementation
// =============================================================================

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        let tables = self.tables.clone().lock_owned().await;
        Ok(Box::new(MemoryTx {
            tables,
            staged_balances: HashMap::new(),
            staged_entries: Vec::new(),
        }))
    }

    async fn find_balance(&self, key: BalanceKey) -> Result<Option<StockBalance>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.balances.get(&key).cloned())
    }

    async fn list_balances(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<StockBalance>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .balances
            .values()
            .filter(|b| b.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn list_entries(&self, key: BalanceKey) -> Result<Vec<LedgerEntry>, StoreError> {
        let tables = self.tables.lock().await;
        // Append order is commit order
        let entries = tables
            .entries
            .iter()
            .rev()
            .filter(|e| e.key() == key)
            .cloned()
            .collect();
        Ok(entries)
    }
}

// =============================================================================
// Tests
// =============================================================================
