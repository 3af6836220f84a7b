//! Live integration tests for shopdash-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness, so they only run where `DATABASE_URL` points at a
//! server: `cargo test -p shopdash-db -- --ignored`.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::json;
use shopdash_core::{normalize_customer, normalize_order, normalize_product};
use shopdash_db::{
    create_tenant, deactivate_tenant, find_tenant_by_api_token_hash, get_overview,
    get_product_detail, get_sync_run, list_active_tenants, list_customers_with_orders,
    list_recent_activity, revenue_trend, set_tenant_api_token_hash, CommerceStore,
    CustomerSort, DateRange, NewOrderItem, NewTenant, PgStore, RevenueGranularity, SyncCounts,
    SyncLedger,
};

fn d(raw: &str) -> Decimal {
    Decimal::from_str(raw).unwrap()
}

async fn tenant(pool: &sqlx::PgPool, domain: &str) -> i64 {
    create_tenant(
        pool,
        &NewTenant {
            name: "Test Store",
            shop_domain: domain,
            access_token: Some("shpat_test"),
        },
    )
    .await
    .unwrap_or_else(|e| panic!("create_tenant failed for '{domain}': {e}"))
    .id
}

// ---------------------------------------------------------------------------
// Tenants
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn tenant_lifecycle(pool: sqlx::PgPool) {
    let id = tenant(&pool, "acme.myshopify.com").await;
    set_tenant_api_token_hash(&pool, "acme.myshopify.com", "hash-1")
        .await
        .expect("set hash");

    let found = find_tenant_by_api_token_hash(&pool, "hash-1")
        .await
        .expect("lookup")
        .expect("tenant by hash");
    assert_eq!(found.id, id);

    deactivate_tenant(&pool, "acme.myshopify.com")
        .await
        .expect("deactivate");
    assert!(list_active_tenants(&pool).await.unwrap().is_empty());

    let err = deactivate_tenant(&pool, "missing.myshopify.com")
        .await
        .unwrap_err();
    assert!(matches!(err, shopdash_db::DbError::NotFound));
}

// ---------------------------------------------------------------------------
// Commerce upserts
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn customer_upsert_is_idempotent(pool: sqlx::PgPool) {
    let tenant_id = tenant(&pool, "acme.myshopify.com").await;
    let store = PgStore::new(pool);
    let record = normalize_customer(&json!({ "id": "5", "total_spent": "12.00" })).unwrap();

    let first = store.upsert_customer(tenant_id, &record).await.unwrap();
    let second = store.upsert_customer(tenant_id, &record).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.total_spent, d("12.00"));
    assert_eq!(first.email, "missing_5@example.com");
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn order_upsert_tracks_previous_customer_and_keeps_date(pool: sqlx::PgPool) {
    let tenant_id = tenant(&pool, "acme.myshopify.com").await;
    let store = PgStore::new(pool);
    let a = store
        .upsert_customer(tenant_id, &normalize_customer(&json!({ "id": "A" })).unwrap())
        .await
        .unwrap();
    let b = store
        .upsert_customer(tenant_id, &normalize_customer(&json!({ "id": "B" })).unwrap())
        .await
        .unwrap();

    let dated = normalize_order(&json!({
        "id": "O1", "total_price": "10.00", "created_at": "2024-02-03T04:05:06Z"
    }))
    .unwrap();
    let first = store.upsert_order(tenant_id, &dated, Some(a.id)).await.unwrap();
    assert_eq!(first.previous_customer_id, None);

    let undated = normalize_order(&json!({ "id": "O1", "total_price": "10.00" })).unwrap();
    let second = store.upsert_order(tenant_id, &undated, Some(b.id)).await.unwrap();
    assert_eq!(second.previous_customer_id, Some(a.id));
    assert_eq!(second.order.order_date, first.order.order_date);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn replace_items_and_recompute_totals(pool: sqlx::PgPool) {
    let tenant_id = tenant(&pool, "acme.myshopify.com").await;
    let store = PgStore::new(pool.clone());
    let customer = store
        .upsert_customer(tenant_id, &normalize_customer(&json!({ "id": "C" })).unwrap())
        .await
        .unwrap();
    let product = store
        .upsert_product(
            tenant_id,
            &normalize_product(&json!({ "id": "P", "title": "Widget" })).unwrap(),
        )
        .await
        .unwrap();

    let paid = normalize_order(&json!({
        "id": "O1", "total_price": "30.00", "financial_status": "paid",
        "created_at": "2024-05-01T10:30:00Z"
    }))
    .unwrap();
    let pending = normalize_order(&json!({
        "id": "O2", "total_price": "70.00", "created_at": "2024-05-01T12:00:00Z"
    }))
    .unwrap();
    let order = store
        .upsert_order(tenant_id, &paid, Some(customer.id))
        .await
        .unwrap()
        .order;
    store
        .upsert_order(tenant_id, &pending, Some(customer.id))
        .await
        .unwrap();

    let items = vec![NewOrderItem {
        product_id: Some(product.id),
        title: "Widget".to_string(),
        quantity: 3,
        price: d("10.00"),
    }];
    assert_eq!(store.replace_order_items(order.id, &items).await.unwrap(), 1);
    assert_eq!(store.replace_order_items(order.id, &items).await.unwrap(), 1);

    let total = store.recompute_customer_total(customer.id).await.unwrap();
    assert_eq!(total, d("30.00"));

    let detail = get_product_detail(&pool, tenant_id, product.id).await.unwrap();
    assert_eq!(detail.total_sold, 3);
    assert_eq!(detail.sales[0].line_total, d("30.00"));

    let overview = get_overview(&pool, tenant_id).await.unwrap();
    assert_eq!(overview.total_orders, 2);
    assert_eq!(overview.total_revenue, d("100.00"));

    let customers = list_customers_with_orders(&pool, tenant_id, CustomerSort::TotalSpent, 10, 0)
        .await
        .unwrap();
    assert_eq!(customers[0].orders.len(), 2);
    assert_eq!(customers[0].orders[0].external_order_id, "O2");

    let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    let hourly = revenue_trend(
        &pool,
        tenant_id,
        Some(DateRange::from_days(day, day)),
        RevenueGranularity::Hourly,
    )
    .await
    .unwrap();
    assert_eq!(hourly.len(), 24);
    assert_eq!(hourly[10].bucket, "10:00");
    assert_eq!(hourly[10].revenue, d("30.00"));
    assert_eq!(hourly[12].revenue, d("70.00"));

    let feed = list_recent_activity(&pool, tenant_id, 10).await.unwrap();
    assert_eq!(feed.len(), 3);
    assert!(feed.iter().any(|a| a.kind == "NEW_CUSTOMER"));
}

// ---------------------------------------------------------------------------
// Sync run ledger
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn sync_run_lifecycle_queued_to_failed(pool: sqlx::PgPool) {
    let tenant_id = tenant(&pool, "acme.myshopify.com").await;
    let store = PgStore::new(pool.clone());

    let run = store.create_sync_run(tenant_id, "cli").await.unwrap();
    assert_eq!(run.status, "queued");
    store.start_sync_run(run.id).await.unwrap();

    let counts = SyncCounts {
        customers: 4,
        ..SyncCounts::default()
    };
    store
        .fail_sync_run(run.id, counts, "orders fetch failed")
        .await
        .unwrap();

    let stored = get_sync_run(&pool, run.id).await.unwrap();
    assert_eq!(stored.status, "failed");
    assert_eq!(stored.customers_processed, 4);
    assert_eq!(stored.error_message.as_deref(), Some("orders fetch failed"));

    let err = store.start_sync_run(run.id).await.unwrap_err();
    assert!(matches!(
        err,
        shopdash_db::DbError::InvalidSyncRunTransition { .. }
    ));
}
