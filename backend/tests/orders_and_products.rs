//! Order and product snapshot refresh plus the per-user order summary.

use std::sync::Arc;

use rust_decimal::Decimal;
use rstest::{fixture, rstest};
use serde_json::json;
use woo_sync_store::domain::ports::{OrderRepository, ProductRepository, WpUserRepository};
use woo_sync_store::domain::{
    CallerIdentity, OrdersService, WcCustomerId, WcOrderSnapshot, WcProductId, WcProductSnapshot,
};
use woo_sync_store::outbound::persistence::{
    DieselOrderRepository, DieselProductRepository, DieselWpUserRepository,
};
use woo_sync_store::test_support::fixtures::{day, order, product, profile, user_id};

mod support;

use support::{StoreDatabase, handle_cluster_setup_failure, provision_store_database};

const SERVICE: CallerIdentity = CallerIdentity::Service;

struct Context {
    db: StoreDatabase,
    orders: Arc<DieselOrderRepository>,
    products: DieselProductRepository,
}

#[fixture]
fn context() -> Option<Context> {
    let setup = provision_store_database().and_then(|db| {
        let users = DieselWpUserRepository::new(db.pool.clone());
        db.runtime
            .block_on(users.insert(&SERVICE, &profile(1)))
            .map_err(|err| err.to_string())?;
        Ok(Context {
            orders: Arc::new(DieselOrderRepository::new(db.pool.clone())),
            products: DieselProductRepository::new(db.pool.clone()),
            db,
        })
    });
    match setup {
        Ok(context) => Some(context),
        Err(reason) => handle_cluster_setup_failure(reason),
    }
}

#[rstest]
fn resyncing_an_order_overwrites_the_snapshot(context: Option<Context>) {
    let Some(ctx) = context else {
        eprintln!("SKIP-TEST-CLUSTER: resyncing_an_order_overwrites_the_snapshot skipped");
        return;
    };
    let owner = Some(user_id(1));
    let pending = order(900, owner, Decimal::new(2500, 2), "pending", day(1));
    let mut completed = order(900, owner, Decimal::new(2750, 2), "completed", day(1));
    completed.date_completed = Some(day(2));
    completed.product_names = vec!["Tea".to_owned(), "Cup".to_owned()];

    let written = ctx.db.runtime.block_on(async {
        let first = ctx.orders.upsert_snapshots(&SERVICE, &[pending]).await?;
        let second = ctx.orders.upsert_snapshots(&SERVICE, &[completed.clone()]).await?;
        Ok::<_, woo_sync_store::domain::ports::StorePersistenceError>(first + second)
    });
    let stored = ctx
        .db
        .runtime
        .block_on(ctx.orders.find_by_wc_order_id(&SERVICE, completed.wc_order_id))
        .expect("lookup")
        .expect("order exists");

    assert_eq!(written.expect("upserts"), 2);
    assert_eq!(stored.snapshot, completed);
    assert_eq!(ctx.db.count_as_owner("wc_orders").expect("count"), 1);
}

#[rstest]
fn a_batch_keeps_the_last_copy_of_each_order(context: Option<Context>) {
    let Some(ctx) = context else {
        eprintln!("SKIP-TEST-CLUSTER: a_batch_keeps_the_last_copy_of_each_order skipped");
        return;
    };
    let owner = Some(user_id(1));
    let batch = vec![
        order(1, owner, Decimal::new(100, 2), "pending", day(1)),
        order(2, owner, Decimal::new(200, 2), "pending", day(2)),
        order(1, owner, Decimal::new(150, 2), "completed", day(1)),
    ];

    let written = ctx
        .db
        .runtime
        .block_on(ctx.orders.upsert_snapshots(&SERVICE, &batch))
        .expect("batch upsert");
    let first = ctx
        .db
        .runtime
        .block_on(ctx.orders.find_by_wc_order_id(&SERVICE, batch[0].wc_order_id))
        .expect("lookup")
        .expect("order exists");

    assert_eq!(written, 2);
    assert_eq!(first.snapshot.status.as_deref(), Some("completed"));
    assert_eq!(first.snapshot.total, Some(Decimal::new(150, 2)));
}

#[rstest]
fn summary_counts_spend_and_recent_orders(context: Option<Context>) {
    let Some(ctx) = context else {
        eprintln!("SKIP-TEST-CLUSTER: summary_counts_spend_and_recent_orders skipped");
        return;
    };
    let owner = Some(user_id(1));
    let mut batch = (1..=6)
        .map(|offset| {
            let status = if offset % 2 == 0 { "completed" } else { "processing" };
            order(offset, owner, Decimal::new(1000, 2), status, day(offset))
        })
        .collect::<Vec<_>>();
    let mut untotalled = order(7, owner, Decimal::ZERO, "pending", day(0));
    untotalled.total = None;
    untotalled.date_created = None;
    batch.push(untotalled);
    ctx.db
        .runtime
        .block_on(ctx.orders.upsert_snapshots(&SERVICE, &batch))
        .expect("seed orders");

    let service = OrdersService::new(Arc::clone(&ctx.orders));
    let summary = ctx
        .db
        .runtime
        .block_on(service.summary_for_user(&CallerIdentity::authenticated(user_id(1)), user_id(1)))
        .expect("summary")
        .expect("orders exist");
    let nobody = ctx
        .db
        .runtime
        .block_on(service.summary_for_user(&SERVICE, user_id(2)))
        .expect("summary");

    let recent_ids = summary
        .recent_orders
        .iter()
        .map(|order| order.snapshot.wc_order_id.get())
        .collect::<Vec<_>>();
    assert_eq!(summary.total_orders, 7);
    assert_eq!(summary.completed_orders, 3);
    assert_eq!(summary.total_spent, Decimal::new(6000, 2));
    assert_eq!(recent_ids, vec![6, 5, 4, 3, 2]);
    assert!(nobody.is_none());
}

#[rstest]
fn product_snapshots_refresh_in_place(context: Option<Context>) {
    let Some(ctx) = context else {
        eprintln!("SKIP-TEST-CLUSTER: product_snapshots_refresh_in_place skipped");
        return;
    };
    let listed = product(31, "Green Tea", Decimal::new(450, 2));
    let mut on_sale = listed.clone();
    on_sale.sale_price = Some(Decimal::new(399, 2));
    on_sale.stock_quantity = Some(12);

    let written = ctx.db.runtime.block_on(async {
        ctx.products
            .upsert_snapshots(&SERVICE, &[listed, product(32, "Cup", Decimal::new(800, 2))])
            .await?;
        ctx.products.upsert_snapshots(&SERVICE, &[on_sale.clone()]).await
    });
    let stored = ctx
        .db
        .runtime
        .block_on(ctx.products.find_by_wc_product_id(
            &SERVICE,
            WcProductId::new(31).expect("valid product id"),
        ))
        .expect("lookup")
        .expect("product exists");
    let catalogue = ctx
        .db
        .runtime
        .block_on(ctx.products.list(&SERVICE))
        .expect("list");

    assert_eq!(written.expect("upserts"), 1);
    assert_eq!(stored.snapshot, on_sale);
    assert!(stored.snapshot.is_on_sale());
    assert_eq!(catalogue.len(), 2);
}

#[rstest]
fn empty_batches_write_nothing(context: Option<Context>) {
    let Some(ctx) = context else {
        eprintln!("SKIP-TEST-CLUSTER: empty_batches_write_nothing skipped");
        return;
    };

    let orders = ctx
        .db
        .runtime
        .block_on(ctx.orders.upsert_snapshots(&SERVICE, &[]))
        .expect("empty orders");
    let products = ctx
        .db
        .runtime
        .block_on(ctx.products.upsert_snapshots(&SERVICE, &[]))
        .expect("empty products");

    assert_eq!((orders, products), (0, 0));
}

fn fully_populated_order(order_id: i64) -> WcOrderSnapshot {
    let mut snapshot = order(
        order_id,
        Some(user_id(1)),
        Decimal::new(1200, 2),
        "completed",
        day(1),
    );
    snapshot.wc_customer_id = Some(WcCustomerId::new(7).expect("valid customer id"));
    snapshot.subtotal = Some(Decimal::new(1000, 2));
    snapshot.tax_total = Some(Decimal::new(200, 2));
    snapshot.date_completed = Some(day(2));
    snapshot.billing_email = Some("buyer@example.com".to_owned());
    snapshot.billing_phone = Some("+44 20 7946 0000".to_owned());
    snapshot.shipping_method = Some("flat_rate".to_owned());
    snapshot.payment_method = Some("card".to_owned());
    snapshot
}

fn fully_populated_product(product_id: i64) -> WcProductSnapshot {
    let mut snapshot = product(product_id, "Sencha", Decimal::new(450, 2));
    snapshot.slug = Some(format!("sencha-{product_id}"));
    snapshot.description = Some("Steamed green tea".to_owned());
    snapshot.short_description = Some("Green tea".to_owned());
    snapshot.sku = Some(format!("TEA-{product_id}"));
    snapshot.sale_price = Some(Decimal::new(399, 2));
    snapshot.stock_status = Some("instock".to_owned());
    snapshot.stock_quantity = Some(40);
    snapshot.tags = Some(json!(["green"]));
    snapshot.images = Some(json!([]));
    snapshot.date_created = Some(day(1));
    snapshot.date_modified = Some(day(3));
    snapshot
}

#[rstest]
fn batches_beyond_one_statement_are_written_in_full(context: Option<Context>) {
    let Some(ctx) = context else {
        eprintln!("SKIP-TEST-CLUSTER: batches_beyond_one_statement_are_written_in_full skipped");
        return;
    };
    let orders: Vec<_> = (1..=5_000).map(fully_populated_order).collect();
    let products: Vec<_> = (1..=4_000).map(fully_populated_product).collect();

    let written_orders = ctx
        .db
        .runtime
        .block_on(ctx.orders.upsert_snapshots(&SERVICE, &orders))
        .expect("large order batch");
    let written_products = ctx
        .db
        .runtime
        .block_on(ctx.products.upsert_snapshots(&SERVICE, &products))
        .expect("large product batch");
    let last = ctx
        .db
        .runtime
        .block_on(ctx.orders.find_by_wc_order_id(&SERVICE, orders[4_999].wc_order_id))
        .expect("lookup")
        .expect("last order stored");

    assert_eq!((written_orders, written_products), (5_000, 4_000));
    assert_eq!(ctx.db.count_as_owner("wc_orders").expect("count"), 5_000);
    assert_eq!(ctx.db.count_as_owner("wc_products").expect("count"), 4_000);
    assert_eq!(last.snapshot, orders[4_999]);
}
