//! Storage layer errors

use thiserror::Error;

/// Errors that can occur in the storage layer
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entity not found
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound {
        /// Type of entity (balance, entry)
        entity_type: String,
        /// Entity ID
        id: String,
    },

    /// Duplicate entity (unique key violation)
    #[error("Duplicate entity: {entity_type} with id {id}")]
    Duplicate {
        /// Type of entity
        entity_type: String,
        /// Entity ID
        id: String,
    },

    /// Write rejected by a storage-level constraint
    #[error("Constraint violated: {0}")]
    Constraint(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Deserialization error (reading a row)
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Domain error passthrough
    #[error("Domain error: {0}")]
    Domain(#[from] stockledger_domain::DomainError),
}

impl StoreError {
    /// Create a not found error
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound {
                entity_type: "unknown".to_string(),
                id: "unknown".to_string(),
            },
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                // unique_violation
                Some("23505") => StoreError::Duplicate {
                    entity_type: db_err.table().unwrap_or("unknown").to_string(),
                    id: db_err.constraint().unwrap_or("unknown").to_string(),
                },
                // check_violation, foreign_key_violation
                Some("23514") | Some("23503") => StoreError::Constraint(db_err.to_string()),
                _ => StoreError::Database(db_err.to_string()),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Connection(err.to_string())
            },
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::Decode(_) => StoreError::Deserialization(err.to_string()),
            _ => StoreError::Database(err.to_string()),
        }
    }
}
