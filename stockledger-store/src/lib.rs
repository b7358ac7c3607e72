//! Stockledger Storage Layer
//!
//! Persists stock balances and the append-only ledger.
//!
//! # Architecture
//!
//! - **Repository traits**: `LedgerStore` (reads + transaction factory) and
//!   `LedgerTx` (one atomic unit of work)
//! - **In-memory store**: serializable implementation for tests and development
//! - **PostgreSQL store**: production implementation with row locks (feature `postgres`)
//!
//! # Usage
//!
//! ```rust
//! use stockledger_store::{LedgerStore, LedgerTx, MemoryStore};
//! use stockledger_domain::BalanceKey;
//! use chrono::Utc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryStore::new();
//!     let key = BalanceKey::new(1, 42);
//!
//!     let mut tx = store.begin().await.unwrap();
//!     let mut balance = tx.lock_balance(key, Utc::now()).await.unwrap();
//!     balance.quantity += rust_decimal::Decimal::TEN;
//!     tx.put_balance(&balance).await.unwrap();
//!     tx.commit().await.unwrap();
//!
//!     let stored = store.find_balance(key).await.unwrap().unwrap();
//!     assert_eq!(stored.quantity, rust_decimal::Decimal::TEN);
//! }
//! ```

#![warn(clippy::all)]

// Modules
mod error;
mod memory;
#[cfg(feature = "postgres")]
mod postgres;
mod repository;

// Re-exports
pub use error::StoreError;
pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;
pub use repository::{LedgerStore, LedgerTx};
