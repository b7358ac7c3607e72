//! Stock operations: receive, remove, adjust-to and the read side.
//!
//! Every mutation runs in its own store transaction and goes through
//! [`crate::reconcile::post`]. Ownership is checked against the catalog
//! before any transaction is opened.

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use stockledger_domain::{
    BalanceKey, BalanceView, Caller, CategoryId, LedgerEntry, OrganizationId, Product, ProductId,
    Quantity, StockBalance, StockLevel, TransactionKind,
};
use stockledger_store::{LedgerStore, LedgerTx};

use crate::error::{LedgerError, LedgerResult};
use crate::ports::ProductCatalog;
use crate::reconcile::{post, Posting};
use crate::settings::LedgerSettings;

// =============================================================================
// Caller checks
// =============================================================================

/// Organization of the caller, or `NoOrganization`
pub(crate) fn organization_of(caller: &Caller) -> LedgerResult<OrganizationId> {
    caller.organization_id.ok_or(LedgerError::NoOrganization)
}

/// Look up a product and require that it belongs to `organization_id`
pub(crate) async fn owned_product<C: ProductCatalog + ?Sized>(
    catalog: &C,
    organization_id: OrganizationId,
    product_id: ProductId,
) -> LedgerResult<Product> {
    let product = catalog
        .find_product(product_id)
        .await?
        .ok_or_else(|| LedgerError::not_found("Product", product_id))?;

    if product.organization_id != organization_id {
        return Err(LedgerError::ForbiddenCrossOrganization {
            product_id,
            organization_id,
        });
    }
    Ok(product)
}

/// Roll back `tx` and hand back the error that caused it
pub(crate) async fn abort(tx: Box<dyn LedgerTx>, err: LedgerError) -> LedgerError {
    if let Err(rollback_err) = tx.rollback().await {
        warn!(error = %rollback_err, "Rollback failed");
    }
    err
}

/// Lock `key`, then compute `delta` from the locked quantity and post it.
///
/// The entry timestamp is taken once the lock is held.
async fn lock_and_post<F>(
    tx: &mut dyn LedgerTx,
    key: BalanceKey,
    delta: F,
    posting: Posting,
) -> LedgerResult<StockBalance>
where
    F: FnOnce(Decimal) -> Decimal + Send,
{
    let locked = tx.lock_balance(key, Utc::now()).await?;
    let now = Utc::now();
    let delta = delta(locked.quantity);
    let (balance, _entry) = post(tx, locked, delta, posting, now).await?;
    Ok(balance)
}

// =============================================================================
// Stock Operations
// =============================================================================

/// Single-product stock operations scoped to the caller's organization.
pub struct StockOperations<S: LedgerStore, C: ProductCatalog> {
    store: Arc<S>,
    catalog: Arc<C>,
    settings: LedgerSettings,
}

impl<S: LedgerStore, C: ProductCatalog> StockOperations<S, C> {
    /// Create stock operations over a store and a catalog.
    pub fn new(store: Arc<S>, catalog: Arc<C>, settings: LedgerSettings) -> Self {
        Self {
            store,
            catalog,
            settings,
        }
    }

    /// Settings in use
    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    /// Increase stock by a positive quantity.
    ///
    /// Creates the balance at zero first if the product has never been
    /// stocked. Writes a `RECEIVE` entry.
    pub async fn receive_stock(
        &self,
        caller: &Caller,
        product_id: ProductId,
        quantity: Decimal,
        notes: Option<String>,
    ) -> LedgerResult<BalanceView> {
        let organization_id = organization_of(caller)?;
        let quantity = Quantity::new(quantity)?.as_decimal();
        let product = owned_product(self.catalog.as_ref(), organization_id, product_id).await?;

        let posting = Posting {
            kind: TransactionKind::Receive,
            correlation_id: None,
            notes,
            actor_id: caller.actor_id,
        };
        let view = self
            .apply(BalanceKey::new(organization_id, product_id), &product, move |_| quantity, posting)
            .await?;

        info!(
            organization_id,
            product_id,
            %quantity,
            balance = %view.quantity,
            "Stock received"
        );
        Ok(view)
    }

    /// Decrease stock by a positive quantity.
    ///
    /// Fails with `InsufficientStock` if the result would be negative.
    /// `reference_id` becomes the entry's correlation id. Writes an
    /// `ADJUST` entry.
    pub async fn remove_stock(
        &self,
        caller: &Caller,
        product_id: ProductId,
        quantity: Decimal,
        reference_id: Option<String>,
        notes: Option<String>,
    ) -> LedgerResult<BalanceView> {
        let organization_id = organization_of(caller)?;
        let quantity = Quantity::new(quantity)?.as_decimal();
        let product = owned_product(self.catalog.as_ref(), organization_id, product_id).await?;

        let posting = Posting {
            kind: TransactionKind::Adjust,
            correlation_id: reference_id,
            notes,
            actor_id: caller.actor_id,
        };
        let view = self
            .apply(BalanceKey::new(organization_id, product_id), &product, move |_| -quantity, posting)
            .await?;

        info!(
            organization_id,
            product_id,
            %quantity,
            balance = %view.quantity,
            "Stock removed"
        );
        Ok(view)
    }

    /// Set stock to an absolute non-negative quantity.
    ///
    /// The delta is computed against the locked balance and recorded as an
    /// `ADJUST` entry, including a zero delta.
    pub async fn adjust_stock_to(
        &self,
        caller: &Caller,
        product_id: ProductId,
        new_quantity: Decimal,
        notes: Option<String>,
    ) -> LedgerResult<BalanceView> {
        let organization_id = organization_of(caller)?;
        let target = StockLevel::new(new_quantity)?.as_decimal();
        let product = owned_product(self.catalog.as_ref(), organization_id, product_id).await?;

        let posting = Posting {
            kind: TransactionKind::Adjust,
            correlation_id: None,
            notes,
            actor_id: caller.actor_id,
        };
        let view = self
            .apply(
                BalanceKey::new(organization_id, product_id),
                &product,
                move |current| target - current,
                posting,
            )
            .await?;

        info!(organization_id, product_id, balance = %view.quantity, "Stock adjusted");
        Ok(view)
    }

    /// Current balance of one product, enriched with catalog data.
    pub async fn get_balance(&self, caller: &Caller, product_id: ProductId) -> LedgerResult<BalanceView> {
        let organization_id = organization_of(caller)?;
        let balance = self
            .store
            .find_balance(BalanceKey::new(organization_id, product_id))
            .await?
            .ok_or_else(|| LedgerError::not_found("Stock balance", product_id))?;

        let product = self.catalog.find_product(product_id).await?;
        Ok(self.view(&balance, product.as_ref()))
    }

    /// All balances of the caller's organization, ordered by product id.
    ///
    /// With `category_id`, only products the catalog places in that
    /// category are returned.
    pub async fn list_balances(
        &self,
        caller: &Caller,
        category_id: Option<CategoryId>,
    ) -> LedgerResult<Vec<BalanceView>> {
        let organization_id = organization_of(caller)?;
        let mut balances = self.store.list_balances(organization_id).await?;

        if let Some(category_id) = category_id {
            let in_category: HashSet<ProductId> = self
                .catalog
                .products_in_category(organization_id, category_id)
                .await?
                .into_iter()
                .collect();
            balances.retain(|b| in_category.contains(&b.product_id));
        }

        let mut views = Vec::with_capacity(balances.len());
        for balance in &balances {
            let product = self.catalog.find_product(balance.product_id).await?;
            views.push(self.view(balance, product.as_ref()));
        }
        Ok(views)
    }

    /// Ledger history of one product, newest first.
    ///
    /// `NotFound` if the caller's organization has no balance for the
    /// product, which also covers products owned by another organization.
    pub async fn list_history(
        &self,
        caller: &Caller,
        product_id: ProductId,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        let organization_id = organization_of(caller)?;
        let key = BalanceKey::new(organization_id, product_id);
        if self.store.find_balance(key).await?.is_none() {
            return Err(LedgerError::not_found("Stock balance", product_id));
        }

        Ok(self.store.list_entries(key).await?)
    }

    async fn apply<F>(
        &self,
        key: BalanceKey,
        product: &Product,
        delta: F,
        posting: Posting,
    ) -> LedgerResult<BalanceView>
    where
        F: FnOnce(Decimal) -> Decimal + Send,
    {
        let mut tx = self.store.begin().await?;
        let posted = lock_and_post(tx.as_mut(), key, delta, posting).await;
        let balance = match posted {
            Ok(balance) => balance,
            Err(err) => return Err(abort(tx, err).await),
        };
        tx.commit().await?;

        Ok(self.view(&balance, Some(product)))
    }

    fn view(&self, balance: &StockBalance, product: Option<&Product>) -> BalanceView {
        // A product owned elsewhere is never shown under this organization's name
        let product = product.filter(|p| p.organization_id == balance.organization_id);
        BalanceView::enrich(balance, product, &self.settings.unknown_product_name)
    }
}

// =============================================================================
// Tests
// =============================================================================
