//! Ledger error types.

use rust_decimal::Decimal;
use stockledger_domain::{DomainError, OrganizationId, ProductId};
use stockledger_store::StoreError;
use thiserror::Error;

/// Errors surfaced by stock operations and sales.
///
/// Every variant aborts the enclosing transaction. Callers branch on
/// [`LedgerError::code`], which is stable across releases.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Product, balance or history does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Product exists but belongs to another organization
    #[error("Product {product_id} does not belong to organization {organization_id}")]
    ForbiddenCrossOrganization {
        product_id: ProductId,
        organization_id: OrganizationId,
    },

    /// Quantity has the wrong sign for the operation
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Deduction would drive the balance below zero
    #[error("Insufficient stock for product {product_id}. Available: {available}, Requested: {requested}")]
    InsufficientStock {
        product_id: ProductId,
        available: Decimal,
        requested: Decimal,
    },

    /// Sale attempted against a deactivated product
    #[error("Product is not active: {name}")]
    ProductInactive { product_id: ProductId, name: String },

    /// Caller has no organization context
    #[error("User has no organization")]
    NoOrganization,

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Catalog lookup failed (not the same as a missing product)
    #[error("Catalog error: {0}")]
    Catalog(String),
}

impl LedgerError {
    /// Create a not found error
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::NotFound { .. } => "NOT_FOUND",
            LedgerError::ForbiddenCrossOrganization { .. } => "FORBIDDEN_CROSS_ORGANIZATION",
            LedgerError::InvalidQuantity(_) => "INVALID_QUANTITY",
            LedgerError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            LedgerError::ProductInactive { .. } => "PRODUCT_INACTIVE",
            LedgerError::NoOrganization => "NO_ORGANIZATION",
            LedgerError::Store(_) => "STORE_ERROR",
            LedgerError::Catalog(_) => "CATALOG_ERROR",
        }
    }
}

impl From<DomainError> for LedgerError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidQuantity(msg) => LedgerError::InvalidQuantity(msg),
            other => LedgerError::Store(StoreError::Domain(other)),
        }
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            LedgerError::not_found("Product", 1),
            LedgerError::ForbiddenCrossOrganization {
                product_id: 1,
                organization_id: 2,
            },
            LedgerError::InvalidQuantity("x".to_string()),
            LedgerError::InsufficientStock {
                product_id: 1,
                available: dec!(1),
                requested: dec!(2),
            },
            LedgerError::ProductInactive {
                product_id: 1,
                name: "x".to_string(),
            },
            LedgerError::NoOrganization,
            LedgerError::Store(StoreError::Database("x".to_string())),
            LedgerError::Catalog("x".to_string()),
        ];

        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_insufficient_stock_message_carries_amounts() {
        let err = LedgerError::InsufficientStock {
            product_id: 5,
            available: dec!(90),
            requested: dec!(200),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product 5. Available: 90, Requested: 200"
        );
    }

    #[test]
    fn test_domain_quantity_error_maps_to_invalid_quantity() {
        let err: LedgerError = DomainError::InvalidQuantity("negative".to_string()).into();
        assert_eq!(err.code(), "INVALID_QUANTITY");
    }
}
