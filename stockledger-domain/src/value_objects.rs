//! Value Objects for the stock ledger
//!
//! Immutable, validated quantity primitives.
//! All value objects enforce invariants at construction time.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain errors for value object validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Quantity violates its sign constraint
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Unknown ledger transaction kind
    #[error("Invalid transaction kind: {0}")]
    InvalidTransactionKind(String),
}

// =============================================================================
// Quantity
// =============================================================================

/// Quantity of units moved by a receive, remove or sale line
///
/// # Invariants
/// - Must be > 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quantity(Decimal);

impl Quantity {
    /// Create a new Quantity with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidQuantity` if value <= 0
    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value <= Decimal::ZERO {
            return Err(DomainError::InvalidQuantity(format!(
                "quantity must be positive, got {}",
                value
            )));
        }
        Ok(Self(value))
    }

    /// Get the underlying Decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// StockLevel
// =============================================================================

/// Absolute stock level, the target of an adjustment
///
/// # Invariants
/// - Must be >= 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockLevel(Decimal);

impl StockLevel {
    /// Create a new StockLevel with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidQuantity` if value < 0
    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value < Decimal::ZERO {
            return Err(DomainError::InvalidQuantity(format!(
                "stock level must not be negative, got {}",
                value
            )));
        }
        Ok(Self(value))
    }

    /// Empty stock
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Get the underlying Decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for StockLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Tests
// =============================================================================
