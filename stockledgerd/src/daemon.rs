//! Daemon: Main runtime orchestrator.
//!
//! The Daemon ties together:
//! - Ledger store (in-memory or Postgres)
//! - Product catalog (stub or Postgres)
//! - Stock operations and sale orchestrator
//! - API Server (HTTP endpoints)
//!
//! # Lifecycle
//!
//! 1. Load configuration
//! 2. Initialize store and catalog
//! 3. Start API server
//! 4. Wait for SIGINT
//! 5. Graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::net::TcpListener;
use tracing::{error, info};

use stockledger_db::{demo_product_id, DEMO_PRODUCTS};
use stockledger_domain::Product;
use stockledger_engine::{ProductCatalog, SaleOrchestrator, StockOperations, StubCatalog};
use stockledger_store::{LedgerStore, MemoryStore};

use crate::api::{create_router, ApiState};
use crate::config::Config;
use crate::error::{DaemonError, DaemonResult};

// =============================================================================
// Daemon
// =============================================================================

/// The main Stockledger daemon.
pub struct Daemon<S: LedgerStore + 'static, C: ProductCatalog + 'static> {
    /// Configuration
    config: Config,
    /// Handlers' shared state
    state: Arc<ApiState<S, C>>,
}

impl Daemon<MemoryStore, StubCatalog> {
    /// Create a daemon over the in-memory store.
    ///
    /// The stub catalog is seeded with the demo products of the configured
    /// demo organization.
    pub fn new_memory(config: Config) -> Self {
        let organization_id = config.database.demo_organization_id;
        let catalog = Arc::new(StubCatalog::new());
        for (n, (name, cents, active)) in DEMO_PRODUCTS.iter().enumerate() {
            catalog.insert(Product {
                id: demo_product_id(organization_id, n),
                organization_id,
                category_id: None,
                name: name.to_string(),
                base_price: Decimal::new(*cents, 2),
                active: *active,
            });
        }

        Self::new(config, Arc::new(MemoryStore::new()), catalog)
    }
}

#[cfg(feature = "postgres")]
impl Daemon<stockledger_store::PgStore, crate::catalog::PgCatalog> {
    /// Create a daemon over Postgres.
    pub async fn connect_postgres(config: Config, database_url: &str) -> DaemonResult<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect(database_url)
            .await?;

        info!(max_connections = config.database.max_connections, "Connected to Postgres");

        let store = Arc::new(stockledger_store::PgStore::new(pool.clone()));
        let catalog = Arc::new(crate::catalog::PgCatalog::new(pool));
        Ok(Self::new(config, store, catalog))
    }
}

impl<S: LedgerStore + 'static, C: ProductCatalog + 'static> Daemon<S, C> {
    /// Create a new daemon with provided components.
    pub fn new(config: Config, store: Arc<S>, catalog: Arc<C>) -> Self {
        let state = Arc::new(ApiState {
            operations: StockOperations::new(store.clone(), catalog.clone(), config.ledger.clone()),
            sales: SaleOrchestrator::new(store, catalog, config.ledger.clone()),
        });

        Self { config, state }
    }

    /// Stock operations served by this daemon
    pub fn operations(&self) -> &StockOperations<S, C> {
        &self.state.operations
    }

    /// Sale orchestrator served by this daemon
    pub fn sales(&self) -> &SaleOrchestrator<S, C> {
        &self.state.sales
    }

    /// Run the daemon.
    ///
    /// This method blocks until shutdown is requested (SIGINT).
    pub async fn run(self) -> DaemonResult<()> {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %self.config.environment,
            "Starting Stockledger daemon"
        );

        let api_addr = self.start_api_server().await?;
        info!(%api_addr, "API server started");

        tokio::signal::ctrl_c()
            .await
            .map_err(|e| DaemonError::Config(format!("Failed to listen for shutdown signal: {}", e)))?;
        info!("Received shutdown signal");

        info!("Shutdown complete");
        Ok(())
    }

    /// Start the API server.
    pub async fn start_api_server(&self) -> DaemonResult<SocketAddr> {
        let router = create_router(self.state.clone());
        let addr = format!("{}:{}", self.config.api.host, self.config.api.port);

        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            DaemonError::Config(format!("Failed to bind to {}: {}", addr, e))
        })?;

        let local_addr = listener.local_addr().map_err(|e| {
            DaemonError::Config(format!("Failed to get local address: {}", e))
        })?;

        // Spawn the server task
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!(error = %e, "API server error");
            }
        });

        Ok(local_addr)
    }
}

// =============================================================================
// Tests
// =============================================================================
