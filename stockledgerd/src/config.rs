//! Daemon configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::{DaemonError, DaemonResult};
use std::env;
use stockledger_domain::OrganizationId;
use stockledger_engine::LedgerSettings;

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Ledger presentation defaults
    pub ledger: LedgerSettings,

    /// Log output format
    pub log_format: LogFormat,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Postgres URL; the in-memory store is used when absent
    pub url: Option<String>,
    /// Pool size
    pub max_connections: u32,
    /// Organization whose demo catalog the in-memory daemon serves
    pub demo_organization_id: OrganizationId,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (uses stubs)
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> DaemonResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        Ok(Self {
            api: Self::load_api_config()?,
            database: Self::load_database_config()?,
            ledger: Self::load_ledger_settings(),
            log_format: Self::load_log_format()?,
            environment: Self::load_environment()?,
        })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 2,
                demo_organization_id: 1,
            },
            ledger: LedgerSettings::default(),
            log_format: LogFormat::Text,
            environment: Environment::Test,
        }
    }

    fn load_environment() -> DaemonResult<Environment> {
        let env_str = env::var("STOCKLEDGER_ENV").unwrap_or_else(|_| "development".to_string());

        match env_str.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(DaemonError::Config(format!(
                "Invalid STOCKLEDGER_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }

    fn load_api_config() -> DaemonResult<ApiConfig> {
        let host = env::var("STOCKLEDGER_API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = Self::load_parsed_env("STOCKLEDGER_API_PORT", 8080u16)?;

        Ok(ApiConfig { host, port })
    }

    fn load_database_config() -> DaemonResult<DatabaseConfig> {
        let url = env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty());
        let max_connections = Self::load_parsed_env("STOCKLEDGER_DB_MAX_CONNECTIONS", 10u32)?;
        let demo_organization_id = Self::load_parsed_env("STOCKLEDGER_DEMO_ORGANIZATION_ID", 1i64)?;

        Ok(DatabaseConfig {
            url,
            max_connections,
            demo_organization_id,
        })
    }

    fn load_ledger_settings() -> LedgerSettings {
        let defaults = LedgerSettings::default();
        LedgerSettings {
            unknown_product_name: env::var("STOCKLEDGER_UNKNOWN_PRODUCT_NAME")
                .unwrap_or(defaults.unknown_product_name),
            default_sale_note: env::var("STOCKLEDGER_DEFAULT_SALE_NOTE")
                .unwrap_or(defaults.default_sale_note),
        }
    }

    fn load_log_format() -> DaemonResult<LogFormat> {
        match env::var("STOCKLEDGER_LOG_FORMAT") {
            Err(_) => Ok(LogFormat::Text),
            Ok(val) => match val.to_lowercase().as_str() {
                "text" | "" => Ok(LogFormat::Text),
                "json" => Ok(LogFormat::Json),
                other => Err(DaemonError::Config(format!(
                    "Invalid STOCKLEDGER_LOG_FORMAT: {}. Expected: text, json",
                    other
                ))),
            },
        }
    }

    fn load_parsed_env<T: std::str::FromStr>(key: &str, default: T) -> DaemonResult<T> {
        match env::var(key) {
            Ok(val) => val
                .parse::<T>()
                .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            Err(_) => Ok(default),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                demo_organization_id: 1,
            },
            ledger: LedgerSettings::default(),
            log_format: LogFormat::Text,
            environment: Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.api.port, 8080);
        assert_eq!(config.database.max_connections, 10);
        assert!(config.database.url.is_none());
        assert_eq!(config.environment, Environment::Development);
    }

    #[test]
    fn test_test_config() {
        let config = Config::test();

        assert_eq!(config.api.port, 0);
        assert_eq!(config.environment, Environment::Test);
    }

    #[test]
    fn test_ledger_defaults() {
        let config = Config::default();

        assert_eq!(config.ledger.unknown_product_name, "Unknown Product");
        assert_eq!(config.ledger.default_sale_note, "POS Sale");
    }

    #[test]
    fn test_environment_display() {
        assert_eq!(Environment::Test.to_string(), "test");
        assert_eq!(Environment::Development.to_string(), "development");
        assert_eq!(Environment::Production.to_string(), "production");
    }
}
