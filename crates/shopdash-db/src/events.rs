//! Database operations for the `events` activity log.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `events` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct EventRow {
    pub id: i64,
    pub tenant_id: i64,
    pub event_type: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

/// Appends an event to a tenant's activity log.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_event(
    pool: &PgPool,
    tenant_id: i64,
    event_type: &str,
    payload: &Value,
) -> Result<(), DbError> {
    sqlx::query("INSERT INTO events (tenant_id, event_type, payload) VALUES ($1, $2, $3)")
        .bind(tenant_id)
        .bind(event_type)
        .bind(payload)
        .execute(pool)
        .await?;

    Ok(())
}

/// Returns the newest `limit` events for a tenant.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_events(
    pool: &PgPool,
    tenant_id: i64,
    limit: i64,
) -> Result<Vec<EventRow>, DbError> {
    let rows = sqlx::query_as::<_, EventRow>(
        "SELECT id, tenant_id, event_type, payload, created_at \
         FROM events \
         WHERE tenant_id = $1 \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(tenant_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
