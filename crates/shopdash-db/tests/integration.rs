//! Offline unit tests for shopdash-db pool configuration and row types.
//! These tests do not require a live database connection.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use chrono::NaiveDate;
use shopdash_core::{AppConfig, Environment};
use shopdash_db::{DateRange, PoolConfig, SyncCounts, SyncRunRow, TenantRow};

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 5000),
        log_level: "info".to_string(),
        api_token_salt: None,
        shopify_api_secret: None,
        shopify_api_version: "2024-10".to_string(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        shopify_request_timeout_secs: 30,
        shopify_user_agent: "ua".to_string(),
        shopify_page_size: 250,
        shopify_max_retries: 3,
        shopify_retry_backoff_base_secs: 2,
        dedupe_window_secs: 60,
        sync_cron: "0 */15 * * * *".to_string(),
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

/// Compile-time smoke test: confirm that [`SyncRunRow`] has all expected
/// fields with the correct types. No database required.
#[test]
fn sync_run_row_has_expected_fields() {
    use chrono::Utc;
    use uuid::Uuid;

    let row = SyncRunRow {
        id: 1_i64,
        public_id: Uuid::new_v4(),
        tenant_id: 2_i64,
        trigger_source: "scheduled".to_string(),
        status: "queued".to_string(),
        started_at: None,
        completed_at: None,
        customers_processed: 0_i32,
        products_processed: 0_i32,
        orders_processed: 0_i32,
        locations_processed: 0_i32,
        inventory_levels_processed: 0_i32,
        error_message: None,
        created_at: Utc::now(),
    };

    assert_eq!(row.trigger_source, "scheduled");
    assert!(row.completed_at.is_none());
    assert_eq!(SyncCounts::default().orders, 0);
}

#[test]
fn tenant_debug_redacts_access_token() {
    use chrono::Utc;
    use uuid::Uuid;

    let tenant = TenantRow {
        id: 1,
        public_id: Uuid::new_v4(),
        name: "Acme".to_string(),
        shop_domain: "acme.myshopify.com".to_string(),
        access_token: Some("shpat_very_secret".to_string()),
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    let rendered = format!("{tenant:?}");
    assert!(!rendered.contains("shpat_very_secret"));
    assert!(rendered.contains("acme.myshopify.com"));
}

#[test]
fn date_range_spans_multiple_days() {
    let range = DateRange::from_days(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
    );
    assert!(range.from < range.to);
    assert_eq!(range.to.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
}
