//! Stock reconciliation.
//!
//! The only code path that changes a balance. Every change goes through
//! [`post`], which writes the new balance and its ledger entry inside the
//! caller's transaction, so the two can never diverge.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use stockledger_domain::{ActorId, BalanceKey, LedgerEntry, StockBalance, TransactionKind};
use stockledger_store::LedgerTx;

use crate::error::{LedgerError, LedgerResult};

// =============================================================================
// Arithmetic
// =============================================================================

/// Before/after snapshot of a single balance change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    pub before: Decimal,
    pub delta: Decimal,
    pub after: Decimal,
}

/// Apply `delta` to `before`, refusing to go below zero.
///
/// A zero delta is allowed; it records a no-op change. A result outside the
/// `Decimal` range is rejected as an invalid quantity.
pub fn reconcile(key: BalanceKey, before: Decimal, delta: Decimal) -> LedgerResult<Reconciliation> {
    let after = before.checked_add(delta).ok_or_else(|| {
        LedgerError::InvalidQuantity(format!(
            "balance of product {} would overflow ({before} + {delta})",
            key.product_id
        ))
    })?;
    if after < Decimal::ZERO {
        return Err(LedgerError::InsufficientStock {
            product_id: key.product_id,
            available: before,
            requested: -delta,
        });
    }

    Ok(Reconciliation {
        before,
        delta,
        after,
    })
}

// =============================================================================
// Posting
// =============================================================================

/// Ledger metadata attached to a change
#[derive(Debug, Clone)]
pub struct Posting {
    pub kind: TransactionKind,
    pub correlation_id: Option<String>,
    pub notes: Option<String>,
    pub actor_id: ActorId,
}

/// Apply `delta` to a balance already locked in `tx` and append the entry.
///
/// Callers lock first and take `now` afterwards, so entry timestamps follow
/// the order in which transactions acquire the row.
/// Nothing is written if the change would make the balance negative.
pub async fn post(
    tx: &mut dyn LedgerTx,
    mut balance: StockBalance,
    delta: Decimal,
    posting: Posting,
    now: DateTime<Utc>,
) -> LedgerResult<(StockBalance, LedgerEntry)> {
    let key = balance.key();
    let change = reconcile(key, balance.quantity, delta)?;

    let entry = LedgerEntry::new(
        key,
        posting.kind,
        change.before,
        change.delta,
        posting.correlation_id,
        posting.notes,
        posting.actor_id,
        now,
    )?;

    balance.quantity = change.after;
    balance.updated_at = now;
    tx.put_balance(&balance).await?;
    tx.append_entry(&entry).await?;

    debug!(
        balance = %key,
        kind = %entry.kind,
        before = %change.before,
        after = %change.after,
        "Balance posted"
    );

    Ok((balance, entry))
}

// =============================================================================
// Tests
// =============================================================================
