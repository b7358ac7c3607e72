//! Stockledger Engine
//!
//! Inventory ledger and stock reconciliation.
//!
//! # Architecture
//!
//! ```text
//! SaleOrchestrator ──┐
//!                    ├─→ reconcile::post → LedgerTx (balance write + ledger append)
//! StockOperations ───┘
//! ```
//!
//! # Components
//!
//! - **Reconciler**: before/after arithmetic, non-negative check, paired writes
//! - **StockOperations**: receive, remove, adjust-to, balance and history queries
//! - **SaleOrchestrator**: multi-line sales committed as one transaction
//! - **Ports**: product catalog interface; `StubCatalog` for tests and development
//!
//! # Example
//!
//! ```rust,ignore
//! use stockledger_engine::{LedgerSettings, StockOperations, StubCatalog};
//! use stockledger_store::MemoryStore;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let catalog = Arc::new(StubCatalog::new());
//! let operations = StockOperations::new(store, catalog, LedgerSettings::default());
//!
//! let view = operations.receive_stock(&caller, product_id, dec!(20), None).await?;
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod operations;
pub mod ports;
pub mod reconcile;
pub mod sale;
pub mod settings;
pub mod stub;

// Re-exports for convenience
pub use error::{LedgerError, LedgerResult};
pub use operations::StockOperations;
pub use ports::ProductCatalog;
pub use reconcile::{post, reconcile, Posting, Reconciliation};
pub use sale::{SaleIdGenerator, SaleItem, SaleOrchestrator};
pub use settings::LedgerSettings;
pub use stub::StubCatalog;
