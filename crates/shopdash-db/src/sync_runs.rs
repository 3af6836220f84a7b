//! Database operations for `sync_runs`, the ledger of bulk sync passes.

use std::future::Future;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `sync_runs` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SyncRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub tenant_id: i64,
    pub trigger_source: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub customers_processed: i32,
    pub products_processed: i32,
    pub orders_processed: i32,
    pub locations_processed: i32,
    pub inventory_levels_processed: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-resource record counts written when a run settles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounts {
    pub customers: i32,
    pub products: i32,
    pub orders: i32,
    pub locations: i32,
    pub inventory_levels: i32,
}

const SYNC_RUN_COLUMNS: &str = "id, public_id, tenant_id, trigger_source, status, started_at, \
                                completed_at, customers_processed, products_processed, \
                                orders_processed, locations_processed, \
                                inventory_levels_processed, error_message, created_at";

/// Lifecycle bookkeeping for sync runs: `queued → running → succeeded | failed`.
pub trait SyncLedger: Send + Sync + 'static {
    fn list_active_tenants(
        &self,
    ) -> impl Future<Output = Result<Vec<crate::TenantRow>, DbError>> + Send;

    fn create_sync_run(
        &self,
        tenant_id: i64,
        trigger_source: &str,
    ) -> impl Future<Output = Result<SyncRunRow, DbError>> + Send;

    fn start_sync_run(&self, id: i64) -> impl Future<Output = Result<(), DbError>> + Send;

    fn complete_sync_run(
        &self,
        id: i64,
        counts: SyncCounts,
    ) -> impl Future<Output = Result<(), DbError>> + Send;

    fn fail_sync_run(
        &self,
        id: i64,
        counts: SyncCounts,
        error_message: &str,
    ) -> impl Future<Output = Result<(), DbError>> + Send;
}

// ---------------------------------------------------------------------------
// sync_runs operations
// ---------------------------------------------------------------------------

/// Creates a new sync run in `queued` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_sync_run(
    pool: &PgPool,
    tenant_id: i64,
    trigger_source: &str,
) -> Result<SyncRunRow, DbError> {
    let row = sqlx::query_as::<_, SyncRunRow>(&format!(
        "INSERT INTO sync_runs (public_id, tenant_id, trigger_source, status) \
         VALUES ($1, $2, $3, 'queued') \
         RETURNING {SYNC_RUN_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(tenant_id)
    .bind(trigger_source)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a run as `running` and sets `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidSyncRunTransition`] if the run is not `queued`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn start_sync_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE sync_runs \
         SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'queued'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidSyncRunTransition {
            id,
            expected_status: "queued",
        });
    }

    Ok(())
}

/// Marks a run as `succeeded` and records its counts.
///
/// # Errors
///
/// Returns [`DbError::InvalidSyncRunTransition`] if the run is not `running`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn complete_sync_run(pool: &PgPool, id: i64, counts: SyncCounts) -> Result<(), DbError> {
    settle_sync_run(pool, id, "succeeded", counts, None).await
}

/// Marks a run as `failed`, recording whatever counts were reached.
///
/// # Errors
///
/// Returns [`DbError::InvalidSyncRunTransition`] if the run is not `running`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn fail_sync_run(
    pool: &PgPool,
    id: i64,
    counts: SyncCounts,
    error_message: &str,
) -> Result<(), DbError> {
    settle_sync_run(pool, id, "failed", counts, Some(error_message)).await
}

async fn settle_sync_run(
    pool: &PgPool,
    id: i64,
    status: &str,
    counts: SyncCounts,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE sync_runs \
         SET status = $1, completed_at = NOW(), \
             customers_processed = $2, products_processed = $3, orders_processed = $4, \
             locations_processed = $5, inventory_levels_processed = $6, \
             error_message = $7 \
         WHERE id = $8 AND status = 'running'",
    )
    .bind(status)
    .bind(counts.customers)
    .bind(counts.products)
    .bind(counts.orders)
    .bind(counts.locations)
    .bind(counts.inventory_levels)
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidSyncRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_sync_run(pool: &PgPool, id: i64) -> Result<SyncRunRow, DbError> {
    sqlx::query_as::<_, SyncRunRow>(&format!(
        "SELECT {SYNC_RUN_COLUMNS} FROM sync_runs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` runs for a tenant, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_sync_runs(
    pool: &PgPool,
    tenant_id: i64,
    limit: i64,
) -> Result<Vec<SyncRunRow>, DbError> {
    let rows = sqlx::query_as::<_, SyncRunRow>(&format!(
        "SELECT {SYNC_RUN_COLUMNS} FROM sync_runs \
         WHERE tenant_id = $1 \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2"
    ))
    .bind(tenant_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
