//! Database CLI subcommands for stockledgerd.
//!
//! Provides `db migrate`, `db status`, and `db init` commands.

use anyhow::{anyhow, Result};
use std::env;
use tracing::info;

use stockledger_db::{migrate, seed_demo_catalog, status};

/// Run database CLI subcommands.
///
/// Supported commands:
/// - `stockledgerd db migrate` - Run pending migrations
/// - `stockledgerd db status` - Check migration status
/// - `stockledgerd db init [--organization-id N]` - Seed the demo catalog
pub async fn run_db_command(args: Vec<String>) -> Result<()> {
    if args.len() < 3 {
        return Err(anyhow!("Usage: stockledgerd db <migrate|status|init> [options]"));
    }

    let database_url = env::var("DATABASE_URL")
        .map_err(|_| anyhow!("DATABASE_URL environment variable is required for db commands"))?;

    let pool = sqlx::PgPool::connect(&database_url).await?;

    match args[2].as_str() {
        "migrate" => {
            migrate(&pool).await?;
        },
        "status" => {
            status(&pool).await?;
        },
        "init" => {
            let organization_id = parse_init_args(&args[3..])?;
            let ids = seed_demo_catalog(&pool, organization_id).await?;
            info!(organization_id, ?ids, "Demo catalog ready");
        },
        other => {
            return Err(anyhow!("Unknown db command: {}. Use migrate, status, or init", other));
        },
    }

    Ok(())
}

/// Parse `[--organization-id N]`, defaulting to organization 1.
fn parse_init_args(args: &[String]) -> Result<i64> {
    let mut organization_id = 1;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--organization-id" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| anyhow!("--organization-id requires a value"))?;
                organization_id = value.parse()?;
                i += 2;
            },
            other => return Err(anyhow!("Unknown option: {}", other)),
        }
    }

    Ok(organization_id)
}
