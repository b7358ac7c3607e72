//! Domain Entities for the stock ledger
//!
//! A `StockBalance` is the mutable current quantity of one product inside
//! one organization. Every change to it is mirrored by exactly one
//! immutable `LedgerEntry`.

use crate::value_objects::DomainError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// =============================================================================
// Identifiers
// =============================================================================

/// Identifier of an organization (tenant)
pub type OrganizationId = i64;

/// Identifier of a catalog product
pub type ProductId = i64;

/// Identifier of a product category
pub type CategoryId = i64;

/// Identifier of the user that triggered a mutation
pub type ActorId = Uuid;

/// Identifier of a ledger entry
pub type EntryId = Uuid;

/// Natural key of a balance: one per (organization, product)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BalanceKey {
    /// Owning organization
    pub organization_id: OrganizationId,
    /// Product the balance counts
    pub product_id: ProductId,
}

impl BalanceKey {
    /// Build a key from its parts
    pub fn new(organization_id: OrganizationId, product_id: ProductId) -> Self {
        Self {
            organization_id,
            product_id,
        }
    }
}

impl fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.organization_id, self.product_id)
    }
}

// =============================================================================
// Transaction Kind
// =============================================================================

/// Reason a ledger entry was written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    /// Stock received (purchase, delivery)
    Receive,
    /// Manual removal or absolute correction
    Adjust,
    /// Point-of-sale deduction
    Sale,
}

impl TransactionKind {
    /// Stable storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Receive => "RECEIVE",
            TransactionKind::Adjust => "ADJUST",
            TransactionKind::Sale => "SALE",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RECEIVE" => Ok(TransactionKind::Receive),
            "ADJUST" => Ok(TransactionKind::Adjust),
            "SALE" => Ok(TransactionKind::Sale),
            other => Err(DomainError::InvalidTransactionKind(other.to_string())),
        }
    }
}

// =============================================================================
// Stock Balance
// =============================================================================

/// Current stock quantity for one organization + product pair
///
/// # Invariants
/// - `quantity >= 0`
/// - only the reconciler writes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBalance {
    /// Owning organization
    pub organization_id: OrganizationId,
    /// Product counted by this balance
    pub product_id: ProductId,
    /// Units on hand
    pub quantity: Decimal,
    /// When the balance row was first created
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

impl StockBalance {
    /// A fresh zero balance, created lazily on the first mutation
    pub fn empty(key: BalanceKey, now: DateTime<Utc>) -> Self {
        Self {
            organization_id: key.organization_id,
            product_id: key.product_id,
            quantity: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Natural key of this balance
    pub fn key(&self) -> BalanceKey {
        BalanceKey::new(self.organization_id, self.product_id)
    }
}

// =============================================================================
// Ledger Entry
// =============================================================================

/// Immutable audit record of one stock quantity change
///
/// `quantity_after == quantity_before + quantity_change` always holds;
/// the constructor derives `quantity_after` so it cannot drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Entry identifier (time ordered)
    pub id: EntryId,
    /// Owning organization
    pub organization_id: OrganizationId,
    /// Product whose balance changed
    pub product_id: ProductId,
    /// Why the balance changed
    pub kind: TransactionKind,
    /// Signed change: positive for increases, negative for decreases
    pub quantity_change: Decimal,
    /// Balance before the change
    pub quantity_before: Decimal,
    /// Balance after the change
    pub quantity_after: Decimal,
    /// Shared reference, e.g. a sale id or an external document number
    pub correlation_id: Option<String>,
    /// Free text
    pub notes: Option<String>,
    /// User that triggered the change
    pub actor_id: ActorId,
    /// When the entry was written
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Create an entry for a change applied to `key`
    ///
    /// Returns `DomainError::InvalidQuantity` if `quantity_after` does not
    /// fit in a `Decimal`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        key: BalanceKey,
        kind: TransactionKind,
        quantity_before: Decimal,
        quantity_change: Decimal,
        correlation_id: Option<String>,
        notes: Option<String>,
        actor_id: ActorId,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let quantity_after = quantity_before
            .checked_add(quantity_change)
            .ok_or_else(|| {
                DomainError::InvalidQuantity(format!(
                    "{quantity_before} + {quantity_change} overflows"
                ))
            })?;

        Ok(Self {
            id: Uuid::now_v7(),
            organization_id: key.organization_id,
            product_id: key.product_id,
            kind,
            quantity_change,
            quantity_before,
            quantity_after,
            correlation_id,
            notes,
            actor_id,
            created_at,
        })
    }

    /// Key of the balance this entry belongs to
    pub fn key(&self) -> BalanceKey {
        BalanceKey::new(self.organization_id, self.product_id)
    }
}

// =============================================================================
// Product (catalog collaborator view)
// =============================================================================

/// Product as seen through the catalog port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product identifier
    pub id: ProductId,
    /// Organization that owns the product
    pub organization_id: OrganizationId,
    /// Category, if the product is categorised
    pub category_id: Option<CategoryId>,
    /// Display name
    pub name: String,
    /// Current unit price
    pub base_price: Decimal,
    /// Inactive products cannot be sold
    pub active: bool,
}

// =============================================================================
// Caller
// =============================================================================

/// Identity of the request issuer, supplied by the authentication layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// User that issued the request
    pub actor_id: ActorId,
    /// Organization context, absent for users without one
    pub organization_id: Option<OrganizationId>,
}

impl Caller {
    /// Caller acting inside an organization
    pub fn new(actor_id: ActorId, organization_id: OrganizationId) -> Self {
        Self {
            actor_id,
            organization_id: Some(organization_id),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
