use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::json;
use shopdash_core::{normalize_customer, normalize_order, normalize_product};

use super::*;

fn d(raw: &str) -> Decimal {
    Decimal::from_str(raw).unwrap()
}

fn item(product_id: Option<i64>, title: &str, quantity: i32, price: &str) -> NewOrderItem {
    NewOrderItem {
        product_id,
        title: title.to_string(),
        quantity,
        price: d(price),
    }
}

#[tokio::test]
async fn identical_customer_upsert_leaves_row_unchanged() {
    let store = MemoryStore::new();
    let tenant = store.add_tenant("Acme", "acme.myshopify.com", None);
    let record = normalize_customer(&json!({ "id": "5", "email": "a@b.test" })).unwrap();

    let first = store.upsert_customer(tenant.id, &record).await.unwrap();
    let second = store.upsert_customer(tenant.id, &record).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(store.customers().len(), 1);
}

#[tokio::test]
async fn changed_customer_bumps_updated_at_only_on_change() {
    let store = MemoryStore::new();
    let tenant = store.add_tenant("Acme", "acme.myshopify.com", None);
    let first = store
        .upsert_customer(
            tenant.id,
            &normalize_customer(&json!({ "id": "5", "email": "a@b.test" })).unwrap(),
        )
        .await
        .unwrap();

    let second = store
        .upsert_customer(
            tenant.id,
            &normalize_customer(&json!({ "id": "5", "email": "new@b.test" })).unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.email, "new@b.test");
    assert!(second.updated_at >= first.updated_at);
    assert_eq!(second.created_at, first.created_at);
}

#[tokio::test]
async fn same_external_id_in_two_tenants_is_two_rows() {
    let store = MemoryStore::new();
    let a = store.add_tenant("A", "a.myshopify.com", None);
    let b = store.add_tenant("B", "b.myshopify.com", None);
    let record = normalize_customer(&json!({ "id": "5" })).unwrap();

    let in_a = store.upsert_customer(a.id, &record).await.unwrap();
    let in_b = store.upsert_customer(b.id, &record).await.unwrap();

    assert_ne!(in_a.id, in_b.id);
    assert_eq!(store.list_customer_ids(a.id).await.unwrap(), vec![in_a.id]);
}

#[tokio::test]
async fn reported_total_applies_only_without_orders() {
    let store = MemoryStore::new();
    let tenant = store.add_tenant("Acme", "acme.myshopify.com", None);

    let customer = store
        .upsert_customer(
            tenant.id,
            &normalize_customer(&json!({ "id": "5", "total_spent": "10.00" })).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(customer.total_spent, d("10.00"));

    let order = normalize_order(&json!({
        "id": "O1", "total_price": "25.00", "financial_status": "paid"
    }))
    .unwrap();
    store
        .upsert_order(tenant.id, &order, Some(customer.id))
        .await
        .unwrap();
    store.recompute_customer_total(customer.id).await.unwrap();

    let after = store
        .upsert_customer(
            tenant.id,
            &normalize_customer(&json!({ "id": "5", "total_spent": "999.00" })).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(after.total_spent, d("25.00"));
}

#[tokio::test]
async fn product_upsert_stores_images_as_json() {
    let store = MemoryStore::new();
    let tenant = store.add_tenant("Acme", "acme.myshopify.com", None);
    let record = normalize_product(&json!({
        "id": 1,
        "title": "Widget",
        "images": [{ "src": "https://img.test/1.png" }],
    }))
    .unwrap();

    let row = store.upsert_product(tenant.id, &record).await.unwrap();

    assert_eq!(row.images, Some(json!(["https://img.test/1.png"])));
    assert_eq!(
        store.find_product_id(tenant.id, "1").await.unwrap(),
        Some(row.id)
    );
    assert_eq!(store.find_product_id(tenant.id, "2").await.unwrap(), None);
}

#[tokio::test]
async fn order_upsert_reports_previous_customer() {
    let store = MemoryStore::new();
    let tenant = store.add_tenant("Acme", "acme.myshopify.com", None);
    let order = normalize_order(&json!({ "id": "O1" })).unwrap();

    let first = store.upsert_order(tenant.id, &order, Some(7)).await.unwrap();
    assert_eq!(first.previous_customer_id, None);

    let second = store.upsert_order(tenant.id, &order, Some(8)).await.unwrap();
    assert_eq!(second.previous_customer_id, Some(7));
    assert_eq!(second.order.customer_id, Some(8));
}

#[tokio::test]
async fn order_without_date_keeps_stored_date() {
    let store = MemoryStore::new();
    let tenant = store.add_tenant("Acme", "acme.myshopify.com", None);

    let dated = normalize_order(&json!({ "id": "O1", "created_at": "2024-01-02T03:04:05Z" })).unwrap();
    let first = store.upsert_order(tenant.id, &dated, None).await.unwrap();

    let undated = normalize_order(&json!({ "id": "O1" })).unwrap();
    let second = store.upsert_order(tenant.id, &undated, None).await.unwrap();

    assert_eq!(second.order.order_date, first.order.order_date);
}

#[tokio::test]
async fn replace_order_items_is_noop_for_equal_items() {
    let store = MemoryStore::new();
    let tenant = store.add_tenant("Acme", "acme.myshopify.com", None);
    let order = store
        .upsert_order(tenant.id, &normalize_order(&json!({ "id": "O1" })).unwrap(), None)
        .await
        .unwrap()
        .order;

    let items = vec![item(None, "Widget", 1, "9.99"), item(None, "Gadget", 2, "5")];
    store.replace_order_items(order.id, &items).await.unwrap();
    let before = store.order_items(order.id);

    let count = store.replace_order_items(order.id, &items).await.unwrap();
    assert_eq!(count, 2);
    assert_eq!(store.order_items(order.id), before);
}

#[tokio::test]
async fn replace_order_items_replaces_everything() {
    let store = MemoryStore::new();
    let tenant = store.add_tenant("Acme", "acme.myshopify.com", None);
    let order = store
        .upsert_order(tenant.id, &normalize_order(&json!({ "id": "O1" })).unwrap(), None)
        .await
        .unwrap()
        .order;

    store
        .replace_order_items(order.id, &[item(None, "A", 1, "1"), item(None, "B", 1, "1")])
        .await
        .unwrap();
    store
        .replace_order_items(order.id, &[item(None, "C", 3, "2")])
        .await
        .unwrap();

    let items = store.order_items(order.id);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "C");
    assert_eq!(items[0].quantity, 3);
    assert_eq!(items[0].position, 0);
}

#[tokio::test]
async fn replace_items_for_missing_order_is_not_found() {
    let store = MemoryStore::new();
    let err = store.replace_order_items(404, &[]).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound));
}

#[tokio::test]
async fn recompute_counts_only_settled_orders() {
    let store = MemoryStore::new();
    let tenant = store.add_tenant("Acme", "acme.myshopify.com", None);
    let customer = store
        .upsert_customer(tenant.id, &normalize_customer(&json!({ "id": "5" })).unwrap())
        .await
        .unwrap();

    for (id, price, status) in [
        ("O1", "10.00", "paid"),
        ("O2", "5.50", "partially_paid"),
        ("O3", "100.00", "pending"),
        ("O4", "40.00", "refunded"),
    ] {
        let order = normalize_order(&json!({
            "id": id, "total_price": price, "financial_status": status
        }))
        .unwrap();
        store
            .upsert_order(tenant.id, &order, Some(customer.id))
            .await
            .unwrap();
    }

    let total = store.recompute_customer_total(customer.id).await.unwrap();
    assert_eq!(total, d("15.50"));
    assert_eq!(store.customers()[0].total_spent, d("15.50"));
}

#[tokio::test]
async fn fail_points_inject_errors_until_cleared() {
    let store = MemoryStore::new();
    store.fail_on(FailPoint::RecomputeCustomerTotal);
    let err = store.recompute_customer_total(1).await.unwrap_err();
    assert!(matches!(err, DbError::Injected("recompute_customer_total")));

    store.clear_failures();
    let err = store.recompute_customer_total(1).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound));
}

#[tokio::test]
async fn sync_run_lifecycle() {
    let store = MemoryStore::new();
    let tenant = store.add_tenant("Acme", "acme.myshopify.com", Some("shpat_x"));

    let run = store.create_sync_run(tenant.id, "manual").await.unwrap();
    assert_eq!(run.status, "queued");

    let err = store
        .complete_sync_run(run.id, SyncCounts::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::InvalidSyncRunTransition {
            expected_status: "running",
            ..
        }
    ));

    store.start_sync_run(run.id).await.unwrap();
    let counts = SyncCounts {
        customers: 2,
        orders: 3,
        ..SyncCounts::default()
    };
    store.complete_sync_run(run.id, counts).await.unwrap();

    let stored = &store.sync_runs()[0];
    assert_eq!(stored.status, "succeeded");
    assert_eq!(stored.customers_processed, 2);
    assert_eq!(stored.orders_processed, 3);
    assert!(stored.started_at.is_some());
    assert!(stored.completed_at.is_some());
}

#[tokio::test]
async fn inactive_tenants_are_not_listed() {
    let store = MemoryStore::new();
    let a = store.add_tenant("A", "a.myshopify.com", None);
    let b = store.add_tenant("B", "b.myshopify.com", None);
    store.set_tenant_active(a.id, false);

    let active = store.list_active_tenants().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, b.id);

    let found = store.find_tenant_by_domain("a.myshopify.com").await.unwrap();
    assert!(found.is_some_and(|t| !t.is_active));
}
