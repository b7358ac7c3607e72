//! Read models returned to callers.

use crate::entities::{OrganizationId, Product, ProductId, StockBalance};
use crate::value_objects::DomainError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Display name used when the catalog has no entry for a balance's product
pub const UNKNOWN_PRODUCT_NAME: &str = "Unknown Product";

/// Balance enriched with catalog display data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceView {
    /// Owning organization
    pub organization_id: OrganizationId,
    /// Product counted
    pub product_id: ProductId,
    /// Catalog name, or the placeholder
    pub product_name: String,
    /// Units on hand
    pub quantity: Decimal,
    /// Catalog base price, or zero
    pub unit_price: Decimal,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

impl BalanceView {
    /// Enrich a balance with catalog data.
    ///
    /// A missing product degrades to `placeholder_name` and a zero price.
    pub fn enrich(balance: &StockBalance, product: Option<&Product>, placeholder_name: &str) -> Self {
        let (product_name, unit_price) = match product {
            Some(p) => (p.name.clone(), p.base_price),
            None => (placeholder_name.to_string(), Decimal::ZERO),
        };

        Self {
            organization_id: balance.organization_id,
            product_id: balance.product_id,
            product_name,
            quantity: balance.quantity,
            unit_price,
            updated_at: balance.updated_at,
        }
    }
}

/// One priced line of a sale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    /// Product sold
    pub product_id: ProductId,
    /// Name at the time of sale
    pub product_name: String,
    /// Units sold
    pub quantity: Decimal,
    /// Base price snapshotted at the time of sale
    pub unit_price: Decimal,
    /// `unit_price * quantity`
    pub line_total: Decimal,
}

impl SaleLine {
    /// Price a line from a catalog product
    pub fn priced(product: &Product, quantity: Decimal) -> Result<Self, DomainError> {
        let line_total = product.base_price.checked_mul(quantity).ok_or_else(|| {
            DomainError::InvalidQuantity(format!(
                "line total for product {} overflows",
                product.id
            ))
        })?;

        Ok(Self {
            product_id: product.id,
            product_name: product.name.clone(),
            quantity,
            unit_price: product.base_price,
            line_total,
        })
    }
}

/// Outcome of a committed sale. Not persisted as its own record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleResult {
    /// Correlation id shared by every ledger entry of the sale
    pub sale_id: String,
    /// Lines in input order
    pub lines: Vec<SaleLine>,
    /// Sum of line totals
    pub total_amount: Decimal,
    /// Notes supplied with the sale
    pub notes: Option<String>,
    /// Commit time
    pub created_at: DateTime<Utc>,
}

impl SaleResult {
    /// Assemble a result, summing line totals exactly
    pub fn new(
        sale_id: String,
        lines: Vec<SaleLine>,
        notes: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let total_amount = lines
            .iter()
            .try_fold(Decimal::ZERO, |acc, l| acc.checked_add(l.line_total))
            .ok_or_else(|| DomainError::InvalidQuantity("sale total overflows".to_string()))?;

        Ok(Self {
            sale_id,
            lines,
            total_amount,
            notes,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::BalanceKey;
    use rust_decimal_macros::dec;

    fn product() -> Product {
        Product {
            id: 7,
            organization_id: 1,
            category_id: None,
            name: "Pilsner".to_string(),
            base_price: dec!(3.35),
            active: true,
        }
    }

    #[test]
    fn test_enrich_uses_catalog_data() {
        let mut balance = StockBalance::empty(BalanceKey::new(1, 7), Utc::now());
        balance.quantity = dec!(12);

        let view = BalanceView::enrich(&balance, Some(&product()), UNKNOWN_PRODUCT_NAME);
        assert_eq!(view.product_name, "Pilsner");
        assert_eq!(view.unit_price, dec!(3.35));
        assert_eq!(view.quantity, dec!(12));
    }

    #[test]
    fn test_enrich_degrades_without_product() {
        let balance = StockBalance::empty(BalanceKey::new(1, 99), Utc::now());

        let view = BalanceView::enrich(&balance, None, UNKNOWN_PRODUCT_NAME);
        assert_eq!(view.product_name, UNKNOWN_PRODUCT_NAME);
        assert_eq!(view.unit_price, Decimal::ZERO);
    }

    #[test]
    fn test_sale_total_is_exact() {
        let p = product();
        let lines = vec![
            SaleLine::priced(&p, dec!(3)).unwrap(),
            SaleLine::priced(&p, dec!(0.5)).unwrap(),
        ];

        let result = SaleResult::new("SALE-x".to_string(), lines, None, Utc::now()).unwrap();
        assert_eq!(result.lines[0].line_total, dec!(10.05));
        assert_eq!(result.lines[1].line_total, dec!(1.675));
        assert_eq!(result.total_amount, dec!(11.725));
    }

    #[test]
    fn test_line_total_overflow_is_rejected() {
        let mut p = product();
        p.base_price = Decimal::MAX;

        let err = SaleLine::priced(&p, dec!(2)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidQuantity(_)));
    }

    #[test]
    fn test_sale_total_overflow_is_rejected() {
        let mut p = product();
        p.base_price = Decimal::MAX;
        let line = SaleLine::priced(&p, dec!(1)).unwrap();

        let err = SaleResult::new("SALE-x".to_string(), vec![line.clone(), line], None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidQuantity(_)));
    }
}
