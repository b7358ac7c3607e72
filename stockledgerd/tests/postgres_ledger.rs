//! Ledger scenarios against PostgreSQL.
//!
//! Run with: `cargo test -p stockledgerd --features postgres`

#![cfg(feature = "postgres")]

use rust_decimal_macros::dec;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use stockledger_db::{demo_product_id, seed_demo_catalog};
use stockledger_domain::{Caller, TransactionKind};
use stockledger_engine::{LedgerError, LedgerSettings, SaleItem, SaleOrchestrator, StockOperations};
use stockledger_store::PgStore;
use stockledgerd::PgCatalog;

const ORG: i64 = 1;

struct Ledger {
    ops: StockOperations<PgStore, PgCatalog>,
    sales: SaleOrchestrator<PgStore, PgCatalog>,
    caller: Caller,
}

async fn ledger(pool: PgPool) -> Ledger {
    seed_demo_catalog(&pool, ORG).await.unwrap();

    let store = Arc::new(PgStore::new(pool.clone()));
    let catalog = Arc::new(PgCatalog::new(pool));
    Ledger {
        ops: StockOperations::new(store.clone(), catalog.clone(), LedgerSettings::default()),
        sales: SaleOrchestrator::new(store, catalog, LedgerSettings::default()),
        caller: Caller::new(Uuid::now_v7(), ORG),
    }
}

#[sqlx::test(migrations = "../migrations")]
async fn test_failed_multi_item_sale_rolls_back_every_line(pool: PgPool) {
    let l = ledger(pool).await;
    let pilsner = demo_product_id(ORG, 0);
    let lemonade = demo_product_id(ORG, 2);
    let stout = demo_product_id(ORG, 3);
    l.ops.receive_stock(&l.caller, pilsner, dec!(10), None).await.unwrap();

    // lemonade has never been stocked
    let err = l
        .sales
        .process_sale(
            &l.caller,
            &[SaleItem::new(pilsner, dec!(3)), SaleItem::new(lemonade, dec!(1))],
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientStock { product_id, .. } if product_id == lemonade));

    // stout is inactive
    let err = l
        .sales
        .process_sale(
            &l.caller,
            &[SaleItem::new(pilsner, dec!(3)), SaleItem::new(stout, dec!(1))],
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PRODUCT_INACTIVE");

    assert_eq!(l.ops.get_balance(&l.caller, pilsner).await.unwrap().quantity, dec!(10));
    assert_eq!(l.ops.list_history(&l.caller, pilsner).await.unwrap().len(), 1);
    assert_eq!(
        l.ops.get_balance(&l.caller, lemonade).await.unwrap_err().code(),
        "NOT_FOUND"
    );
    assert_eq!(
        l.ops.get_balance(&l.caller, stout).await.unwrap_err().code(),
        "NOT_FOUND"
    );
}

#[sqlx::test(migrations = "../migrations")]
async fn test_concurrent_deductions_serialize_on_the_row_lock(pool: PgPool) {
    let l = ledger(pool).await;
    let pilsner = demo_product_id(ORG, 0);
    l.ops.receive_stock(&l.caller, pilsner, dec!(10), None).await.unwrap();

    let (sale, removal) = tokio::join!(
        l.sales.process_sale(&l.caller, &[SaleItem::new(pilsner, dec!(6))], None),
        l.ops.remove_stock(&l.caller, pilsner, dec!(6), None, None),
    );

    let committed = [sale.is_ok(), removal.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(committed, 1);
    for err in [sale.err(), removal.err()].into_iter().flatten() {
        assert!(matches!(
            err,
            LedgerError::InsufficientStock { available, .. } if available == dec!(4)
        ));
    }

    assert_eq!(l.ops.get_balance(&l.caller, pilsner).await.unwrap().quantity, dec!(4));
    let history = l.ops.list_history(&l.caller, pilsner).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].quantity_before, dec!(10));
    assert_eq!(history[0].quantity_after, dec!(4));
}

#[sqlx::test(migrations = "../migrations")]
async fn test_history_chains_newest_first(pool: PgPool) {
    let l = ledger(pool).await;
    let cider = demo_product_id(ORG, 1);

    l.ops.receive_stock(&l.caller, cider, dec!(24), None).await.unwrap();
    let sale = l
        .sales
        .process_sale(&l.caller, &[SaleItem::new(cider, dec!(5)), SaleItem::new(cider, dec!(1))], None)
        .await
        .unwrap();
    l.ops.adjust_stock_to(&l.caller, cider, dec!(20), Some("recount".into())).await.unwrap();

    let history = l.ops.list_history(&l.caller, cider).await.unwrap();
    let kinds: Vec<_> = history.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TransactionKind::Adjust,
            TransactionKind::Sale,
            TransactionKind::Sale,
            TransactionKind::Receive
        ]
    );
    assert_eq!(history[1].correlation_id.as_deref(), Some(sale.sale_id.as_str()));
    for pair in history.windows(2) {
        assert_eq!(pair[0].quantity_before, pair[1].quantity_after);
    }
    assert_eq!(history[0].quantity_after, dec!(20));
}
