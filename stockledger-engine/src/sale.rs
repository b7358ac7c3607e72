//! Multi-item sales.
//!
//! A sale deducts stock for every line inside one store transaction. Either
//! every line is applied and committed, or the transaction is rolled back
//! and no balance or ledger entry changes.
//!
//! # Flow
//!
//! ```text
//! validate items → resolve products → begin → lock balances (ascending id)
//!   → stamp sale id and time
//!   → per line in input order: check product, post SALE entry, price line
//!   → total → commit
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use stockledger_domain::{
    BalanceKey, Caller, OrganizationId, Product, ProductId, SaleLine, SaleResult, StockBalance,
    TransactionKind,
};
use stockledger_store::{LedgerStore, LedgerTx};

use crate::error::{LedgerError, LedgerResult};
use crate::operations::{abort, organization_of};
use crate::ports::ProductCatalog;
use crate::reconcile::{post, Posting};
use crate::settings::LedgerSettings;

// =============================================================================
// Sale Item
// =============================================================================

/// One requested line of a sale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    pub product_id: ProductId,
    pub quantity: Decimal,
}

impl SaleItem {
    pub fn new(product_id: ProductId, quantity: Decimal) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

// =============================================================================
// Sale Id Generator
// =============================================================================

/// Generates sale ids of the form `SALE-<unix millis>-<instance>-<counter>`.
///
/// The counter makes ids unique within a generator even when two sales share
/// a millisecond. The random instance tag separates processes.
#[derive(Debug)]
pub struct SaleIdGenerator {
    instance: u32,
    counter: AtomicU64,
}

impl SaleIdGenerator {
    pub fn new() -> Self {
        Self {
            instance: rand::random(),
            counter: AtomicU64::new(0),
        }
    }

    /// Next sale id for a sale happening at `now`
    pub fn next_id(&self, now: DateTime<Utc>) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("SALE-{}-{:08x}-{}", now.timestamp_millis(), self.instance, seq)
    }
}

impl Default for SaleIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Sale Orchestrator
// =============================================================================

/// Processes point-of-sale transactions atomically.
pub struct SaleOrchestrator<S: LedgerStore, C: ProductCatalog> {
    store: Arc<S>,
    catalog: Arc<C>,
    ids: SaleIdGenerator,
    settings: LedgerSettings,
}

impl<S: LedgerStore, C: ProductCatalog> SaleOrchestrator<S, C> {
    pub fn new(store: Arc<S>, catalog: Arc<C>, settings: LedgerSettings) -> Self {
        Self {
            store,
            catalog,
            ids: SaleIdGenerator::new(),
            settings,
        }
    }

    /// Deduct stock for every item and return the priced sale.
    ///
    /// Items are checked in input order and the first failure aborts the
    /// whole sale. The same product may appear on several lines; each line
    /// deducts from what the previous lines left.
    pub async fn process_sale(
        &self,
        caller: &Caller,
        items: &[SaleItem],
        notes: Option<String>,
    ) -> LedgerResult<SaleResult> {
        let organization_id = organization_of(caller)?;
        validate_items(items)?;

        let products = self.resolve_products(items).await?;

        let mut tx = self.store.begin().await?;
        let deducted = self
            .deduct_lines(tx.as_mut(), caller, organization_id, items, &products, notes)
            .await;
        let result = match deducted {
            Ok(result) => result,
            Err(err) => return Err(abort(tx, err).await),
        };
        tx.commit().await?;

        info!(
            sale_id = %result.sale_id,
            organization_id,
            lines = result.lines.len(),
            total = %result.total_amount,
            "Sale committed"
        );
        Ok(result)
    }

    /// Everything that happens inside the sale transaction.
    ///
    /// Every touched balance is locked in ascending product order before any
    /// deduction so concurrent sales cannot deadlock. The sale time is taken
    /// once all locks are held.
    async fn deduct_lines(
        &self,
        tx: &mut dyn LedgerTx,
        caller: &Caller,
        organization_id: OrganizationId,
        items: &[SaleItem],
        products: &HashMap<ProductId, Option<Product>>,
        notes: Option<String>,
    ) -> LedgerResult<SaleResult> {
        let to_lock: BTreeSet<ProductId> = items.iter().map(|i| i.product_id).collect();
        let mut balances: HashMap<ProductId, StockBalance> = HashMap::with_capacity(to_lock.len());
        for product_id in to_lock {
            let key = BalanceKey::new(organization_id, product_id);
            balances.insert(product_id, tx.lock_balance(key, Utc::now()).await?);
        }

        let now = Utc::now();
        let sale_id = self.ids.next_id(now);
        let entry_notes = notes
            .clone()
            .unwrap_or_else(|| self.settings.default_sale_note.clone());

        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let product = sellable(products, organization_id, item.product_id)?;
            let locked = balances
                .remove(&item.product_id)
                .ok_or_else(|| LedgerError::not_found("Stock balance", item.product_id))?;

            let posting = Posting {
                kind: TransactionKind::Sale,
                correlation_id: Some(sale_id.clone()),
                notes: Some(entry_notes.clone()),
                actor_id: caller.actor_id,
            };
            let (balance, _entry) = post(tx, locked, -item.quantity, posting, now)
                .await
                .inspect_err(|err| {
                    warn!(%sale_id, product_id = item.product_id, error = %err, "Sale aborted")
                })?;
            balances.insert(item.product_id, balance);

            lines.push(SaleLine::priced(product, item.quantity)?);
        }

        Ok(SaleResult::new(sale_id, lines, notes, now)?)
    }

    /// Catalog lookup for every distinct product, before the transaction
    async fn resolve_products(
        &self,
        items: &[SaleItem],
    ) -> LedgerResult<HashMap<ProductId, Option<Product>>> {
        let mut products = HashMap::new();
        for item in items {
            if !products.contains_key(&item.product_id) {
                let product = self.catalog.find_product(item.product_id).await?;
                products.insert(item.product_id, product);
            }
        }
        Ok(products)
    }
}

fn validate_items(items: &[SaleItem]) -> LedgerResult<()> {
    if items.is_empty() {
        return Err(LedgerError::InvalidQuantity("sale has no items".to_string()));
    }
    if let Some(item) = items.iter().find(|i| i.quantity <= Decimal::ZERO) {
        return Err(LedgerError::InvalidQuantity(format!(
            "quantity for product {} must be positive, got {}",
            item.product_id, item.quantity
        )));
    }
    Ok(())
}

fn sellable(
    products: &HashMap<ProductId, Option<Product>>,
    organization_id: OrganizationId,
    product_id: ProductId,
) -> LedgerResult<&Product> {
    let product = products
        .get(&product_id)
        .and_then(Option::as_ref)
        .ok_or_else(|| LedgerError::not_found("Product", product_id))?;

    if product.organization_id != organization_id {
        return Err(LedgerError::ForbiddenCrossOrganization {
            product_id,
            organization_id,
        });
    }
    if !product.active {
        return Err(LedgerError::ProductInactive {
            product_id,
            name: product.name.clone(),
        });
    }
    Ok(product)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::StockOperations;
    use crate::stub::StubCatalog;
    use rust_decimal_macros::dec;
    use stockledger_store::MemoryStore;
    use uuid::Uuid;

    const ORG: OrganizationId = 1;

    struct Fixture {
        store: Arc<MemoryStore>,
        catalog: Arc<StubCatalog>,
        ops: StockOperations<MemoryStore, StubCatalog>,
        sales: SaleOrchestrator<MemoryStore, StubCatalog>,
        caller: Caller,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let catalog = Arc::new(StubCatalog::new());
        catalog.add_product(1, ORG, "Espresso Beans", dec!(12.00));
        catalog.add_product(2, ORG, "Milk 1L", dec!(1.50));
        catalog.add_product(3, 99, "Foreign", dec!(1));

        let ops = StockOperations::new(store.clone(), catalog.clone(), LedgerSettings::default());
        let sales = SaleOrchestrator::new(store.clone(), catalog.clone(), LedgerSettings::default());
        let caller = Caller::new(Uuid::now_v7(), ORG);

        ops.receive_stock(&caller, 1, dec!(120), None).await.unwrap();
        ops.receive_stock(&caller, 2, dec!(50), None).await.unwrap();

        Fixture {
            store,
            catalog,
            ops,
            sales,
            caller,
        }
    }

    #[test]
    fn test_sale_ids_are_unique_within_a_millisecond() {
        let ids = SaleIdGenerator::new();
        let now = Utc::now();
        let a = ids.next_id(now);
        let b = ids.next_id(now);
        assert_ne!(a, b);
        assert!(a.starts_with(&format!("SALE-{}-", now.timestamp_millis())));
    }

    #[tokio::test]
    async fn test_sale_deducts_all_lines_with_shared_correlation() {
        let f = fixture().await;

        let result = f
            .sales
            .process_sale(
                &f.caller,
                &[SaleItem::new(1, dec!(30)), SaleItem::new(2, dec!(4))],
                None,
            )
            .await
            .unwrap();

        assert_eq!(result.lines.len(), 2);
        assert_eq!(result.lines[0].line_total, dec!(360.00));
        assert_eq!(result.lines[1].line_total, dec!(6.00));
        assert_eq!(result.total_amount, dec!(366.00));
        assert_eq!(result.notes, None);

        assert_eq!(f.ops.get_balance(&f.caller, 1).await.unwrap().quantity, dec!(90));
        assert_eq!(f.ops.get_balance(&f.caller, 2).await.unwrap().quantity, dec!(46));

        for product_id in [1, 2] {
            let entry = &f.ops.list_history(&f.caller, product_id).await.unwrap()[0];
            assert_eq!(entry.kind, TransactionKind::Sale);
            assert_eq!(entry.correlation_id.as_deref(), Some(result.sale_id.as_str()));
            assert_eq!(entry.notes.as_deref(), Some("POS Sale"));
        }
    }

    #[tokio::test]
    async fn test_sale_notes_flow_to_entries() {
        let f = fixture().await;
        let result = f
            .sales
            .process_sale(&f.caller, &[SaleItem::new(2, dec!(1))], Some("Table 4".into()))
            .await
            .unwrap();

        assert_eq!(result.notes.as_deref(), Some("Table 4"));
        let entry = &f.ops.list_history(&f.caller, 2).await.unwrap()[0];
        assert_eq!(entry.notes.as_deref(), Some("Table 4"));
    }

    #[tokio::test]
    async fn test_failing_line_rolls_back_whole_sale() {
        let f = fixture().await;
        let entries_before = f.store.entry_count().await;

        let err = f
            .sales
            .process_sale(
                &f.caller,
                &[SaleItem::new(1, dec!(10)), SaleItem::new(2, dec!(51))],
                None,
            )
            .await
            .unwrap_err();

        match err {
            LedgerError::InsufficientStock {
                product_id,
                available,
                requested,
            } => {
                assert_eq!(product_id, 2);
                assert_eq!(available, dec!(50));
                assert_eq!(requested, dec!(51));
            },
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(f.ops.get_balance(&f.caller, 1).await.unwrap().quantity, dec!(120));
        assert_eq!(f.store.entry_count().await, entries_before);
    }

    #[tokio::test]
    async fn test_first_failure_in_input_order_wins() {
        let f = fixture().await;
        f.catalog.set_active(2, false);

        let err = f
            .sales
            .process_sale(
                &f.caller,
                &[SaleItem::new(1, dec!(500)), SaleItem::new(2, dec!(1))],
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_STOCK");

        let err = f
            .sales
            .process_sale(
                &f.caller,
                &[SaleItem::new(2, dec!(1)), SaleItem::new(1, dec!(500))],
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ProductInactive { product_id: 2, .. }));
    }

    #[tokio::test]
    async fn test_duplicate_lines_accumulate() {
        let f = fixture().await;

        let result = f
            .sales
            .process_sale(
                &f.caller,
                &[SaleItem::new(2, dec!(30)), SaleItem::new(2, dec!(20))],
                None,
            )
            .await
            .unwrap();
        assert_eq!(result.lines.len(), 2);
        assert_eq!(f.ops.get_balance(&f.caller, 2).await.unwrap().quantity, dec!(0));

        let err = f
            .sales
            .process_sale(
                &f.caller,
                &[SaleItem::new(1, dec!(100)), SaleItem::new(1, dec!(21))],
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientStock { available, .. } if available == dec!(20)
        ));
        assert_eq!(f.ops.get_balance(&f.caller, 1).await.unwrap().quantity, dec!(120));
    }

    #[tokio::test]
    async fn test_invalid_items_rejected_before_any_write() {
        let f = fixture().await;
        let entries_before = f.store.entry_count().await;

        let err = f.sales.process_sale(&f.caller, &[], None).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_QUANTITY");

        let err = f
            .sales
            .process_sale(
                &f.caller,
                &[SaleItem::new(1, dec!(1)), SaleItem::new(2, dec!(0))],
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_QUANTITY");
        assert_eq!(f.store.entry_count().await, entries_before);
    }

    #[tokio::test]
    async fn test_unknown_and_foreign_products() {
        let f = fixture().await;

        let err = f
            .sales
            .process_sale(&f.caller, &[SaleItem::new(42, dec!(1))], None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");

        let err = f
            .sales
            .process_sale(&f.caller, &[SaleItem::new(1, dec!(1)), SaleItem::new(3, dec!(1))], None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN_CROSS_ORGANIZATION");

        // The rolled-back sale must not leave a zero balance for product 42
        assert_eq!(f.store.balance_count().await, 2);
        assert_eq!(f.ops.get_balance(&f.caller, 1).await.unwrap().quantity, dec!(120));
    }

    #[tokio::test]
    async fn test_price_is_snapshotted_at_sale_time() {
        let f = fixture().await;
        let first = f
            .sales
            .process_sale(&f.caller, &[SaleItem::new(2, dec!(2))], None)
            .await
            .unwrap();

        let mut milk = f.catalog.find_product(2).await.unwrap().unwrap();
        milk.base_price = dec!(2.00);
        f.catalog.insert(milk);

        let second = f
            .sales
            .process_sale(&f.caller, &[SaleItem::new(2, dec!(2))], None)
            .await
            .unwrap();

        assert_eq!(first.total_amount, dec!(3.00));
        assert_eq!(second.total_amount, dec!(4.00));
        assert_ne!(first.sale_id, second.sale_id);
    }

    #[tokio::test]
    async fn test_line_total_overflow_rolls_back_sale() {
        let f = fixture().await;
        f.catalog.add_product(4, ORG, "Saffron", Decimal::MAX);
        f.ops.receive_stock(&f.caller, 4, dec!(10), None).await.unwrap();
        let entries_before = f.store.entry_count().await;

        let err = f
            .sales
            .process_sale(&f.caller, &[SaleItem::new(1, dec!(1)), SaleItem::new(4, dec!(2))], None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_QUANTITY");

        let err = f
            .sales
            .process_sale(&f.caller, &[SaleItem::new(4, dec!(1)), SaleItem::new(4, dec!(1))], None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_QUANTITY");

        assert_eq!(f.ops.get_balance(&f.caller, 4).await.unwrap().quantity, dec!(10));
        assert_eq!(f.ops.get_balance(&f.caller, 1).await.unwrap().quantity, dec!(120));
        assert_eq!(f.store.entry_count().await, entries_before);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_sale_blocked_on_a_lock_is_stamped_after_the_holder() {
        let f = fixture().await;
        let sales = Arc::new(f.sales);

        let mut held = f.store.begin().await.unwrap();
        let locked = held.lock_balance(BalanceKey::new(ORG, 2), Utc::now()).await.unwrap();

        let sale = {
            let sales = sales.clone();
            let caller = f.caller;
            tokio::spawn(async move {
                sales.process_sale(&caller, &[SaleItem::new(2, dec!(5))], None).await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let posting = Posting {
            kind: TransactionKind::Adjust,
            correlation_id: None,
            notes: None,
            actor_id: f.caller.actor_id,
        };
        let (_, removal) = post(held.as_mut(), locked, dec!(-3), posting, Utc::now())
            .await
            .unwrap();
        held.commit().await.unwrap();

        let result = sale.await.unwrap().unwrap();
        let history = f.ops.list_history(&f.caller, 2).await.unwrap();
        let balance = f.ops.get_balance(&f.caller, 2).await.unwrap();

        assert_eq!(history[0].correlation_id.as_deref(), Some(result.sale_id.as_str()));
        assert!(history[0].created_at >= removal.created_at);
        assert!(result.created_at >= removal.created_at);
        assert_eq!(history[0].quantity_before, dec!(47));
        assert_eq!(history[0].quantity_after, balance.quantity);
        assert_eq!(balance.quantity, dec!(42));
        assert_eq!(history[1].id, removal.id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_never_oversell() {
        let f = fixture().await;
        let sales = Arc::new(f.sales);

        let mut handles = Vec::new();
        for i in 0..8 {
            let sales = sales.clone();
            let caller = f.caller;
            // Alternate line order so lock ordering is exercised
            let items = if i % 2 == 0 {
                vec![SaleItem::new(1, dec!(10)), SaleItem::new(2, dec!(10))]
            } else {
                vec![SaleItem::new(2, dec!(10)), SaleItem::new(1, dec!(10))]
            };
            handles.push(tokio::spawn(async move {
                sales.process_sale(&caller, &items, None).await
            }));
        }

        let mut committed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => committed += 1,
                Err(LedgerError::InsufficientStock { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        // Product 2 holds 50 units, so exactly five sales of 10 fit
        assert_eq!(committed, 5);
        assert_eq!(f.ops.get_balance(&f.caller, 2).await.unwrap().quantity, dec!(0));
        assert_eq!(f.ops.get_balance(&f.caller, 1).await.unwrap().quantity, dec!(70));
    }
}
