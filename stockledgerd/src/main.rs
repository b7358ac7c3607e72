//! Stockledger Daemon
//!
//! Inventory ledger HTTP service.
//!
//! # Usage
//!
//! ```bash
//! # Start with default configuration (in-memory store, demo catalog)
//! cargo run -p stockledgerd
//!
//! # Start against Postgres
//! DATABASE_URL=postgres://localhost/stockledger cargo run -p stockledgerd --features postgres
//!
//! # Database management
//! cargo run -p stockledgerd -- db migrate
//! cargo run -p stockledgerd -- db init --organization-id 1
//! ```
//!
//! # Environment Variables
//!
//! - `STOCKLEDGER_ENV`: Environment (test, development, production)
//! - `STOCKLEDGER_API_HOST`: API host (default: 0.0.0.0)
//! - `STOCKLEDGER_API_PORT`: API port (default: 8080)
//! - `STOCKLEDGER_LOG_FORMAT`: text or json (default: text)
//! - `DATABASE_URL`: Postgres URL (requires the `postgres` feature to serve from it)
//! - `STOCKLEDGER_DB_MAX_CONNECTIONS`: Pool size (default: 10)
//! - `STOCKLEDGER_DEMO_ORGANIZATION_ID`: Organization of the in-memory demo catalog (default: 1)
//! - `STOCKLEDGER_UNKNOWN_PRODUCT_NAME`: Placeholder product name (default: Unknown Product)
//! - `STOCKLEDGER_DEFAULT_SALE_NOTE`: Ledger note for sales without notes (default: POS Sale)

use stockledgerd::{Config, Daemon, LogFormat};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::from_default_env()
        .add_directive("stockledgerd=info".parse()?)
        .add_directive("stockledger_engine=info".parse()?);
    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init(),
    }

    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(String::as_str) == Some("db") {
        return stockledgerd::db::run_db_command(args).await;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        api_host = %config.api.host,
        api_port = config.api.port,
        "Stockledger Daemon"
    );

    match config.database.url.clone() {
        #[cfg(feature = "postgres")]
        Some(url) => {
            let daemon = Daemon::connect_postgres(config, &url).await?;
            daemon.run().await?;
        },
        #[cfg(not(feature = "postgres"))]
        Some(_) => {
            tracing::warn!("DATABASE_URL is set but the postgres feature is disabled; using the in-memory store");
            Daemon::new_memory(config).run().await?;
        },
        None => {
            info!("No DATABASE_URL; using the in-memory store");
            Daemon::new_memory(config).run().await?;
        },
    }

    Ok(())
}
