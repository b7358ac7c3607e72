//! Stockledger Domain Layer
//!
//! Pure domain types with zero I/O dependencies: stock balances,
//! immutable ledger entries, catalog products and the value objects
//! that guard quantity invariants.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod entities;
pub mod value_objects;
pub mod views;

// Re-export commonly used types
pub use entities::{
    ActorId, BalanceKey, Caller, CategoryId, EntryId, LedgerEntry, OrganizationId, Product,
    ProductId, StockBalance, TransactionKind,
};
pub use value_objects::{DomainError, Quantity, StockLevel};
pub use views::{BalanceView, SaleLine, SaleResult, UNKNOWN_PRODUCT_NAME};
