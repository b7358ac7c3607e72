//! Stockledger Daemon Library
//!
//! HTTP front end for the inventory ledger.
//!
//! # Architecture
//!
//! ```text
//! HTTP → API (identity headers) → StockOperations / SaleOrchestrator
//!                                        ↓
//!                              LedgerStore + ProductCatalog
//! ```
//!
//! # Components
//!
//! - **Daemon**: Main runtime orchestrator
//! - **API**: HTTP endpoints
//! - **Config**: Environment-based configuration
//! - **db**: `migrate`, `status` and `init` subcommands
//!
//! # Example
//!
//! ```rust,ignore
//! use stockledgerd::{Config, Daemon};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("Failed to load config");
//!     let daemon = Daemon::new_memory(config);
//!     daemon.run().await.expect("Daemon error");
//! }
//! ```

#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod daemon;
pub mod db;
pub mod error;

#[cfg(feature = "postgres")]
pub mod catalog;

// Re-exports for convenience
pub use config::{ApiConfig, Config, DatabaseConfig, Environment, LogFormat};
pub use daemon::Daemon;
pub use error::{DaemonError, DaemonResult};

#[cfg(feature = "postgres")]
pub use catalog::PgCatalog;
