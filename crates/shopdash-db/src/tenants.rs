//! Database operations for the `tenants` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `tenants` table.
///
/// `api_token_hash` is never selected; callers look tenants up by hash instead.
#[derive(Clone, sqlx::FromRow)]
pub struct TenantRow {
    pub id: i64,
    pub public_id: Uuid,
    pub name: String,
    pub shop_domain: String,
    /// Admin API access token. `None` until the store is connected.
    pub access_token: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for TenantRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantRow")
            .field("id", &self.id)
            .field("public_id", &self.public_id)
            .field("name", &self.name)
            .field("shop_domain", &self.shop_domain)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[redacted]"),
            )
            .field("is_active", &self.is_active)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Input for [`create_tenant`].
#[derive(Debug, Clone)]
pub struct NewTenant<'a> {
    pub name: &'a str,
    pub shop_domain: &'a str,
    pub access_token: Option<&'a str>,
}

const TENANT_COLUMNS: &str = "id, public_id, name, shop_domain, access_token, is_active, \
                              created_at, updated_at";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Inserts a tenant, or refreshes name and access token of an existing one
/// with the same `shop_domain`. Re-adding a deactivated tenant reactivates it.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn create_tenant(pool: &PgPool, tenant: &NewTenant<'_>) -> Result<TenantRow, DbError> {
    let row = sqlx::query_as::<_, TenantRow>(&format!(
        "INSERT INTO tenants (public_id, name, shop_domain, access_token) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (shop_domain) DO UPDATE SET \
             name         = EXCLUDED.name, \
             access_token = COALESCE(EXCLUDED.access_token, tenants.access_token), \
             is_active    = TRUE, \
             updated_at   = NOW() \
         RETURNING {TENANT_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(tenant.name)
    .bind(tenant.shop_domain)
    .bind(tenant.access_token)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Returns all tenants, active first, then by domain.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_tenants(pool: &PgPool) -> Result<Vec<TenantRow>, DbError> {
    let rows = sqlx::query_as::<_, TenantRow>(&format!(
        "SELECT {TENANT_COLUMNS} FROM tenants ORDER BY is_active DESC, shop_domain"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns active tenants ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_tenants(pool: &PgPool) -> Result<Vec<TenantRow>, DbError> {
    let rows = sqlx::query_as::<_, TenantRow>(&format!(
        "SELECT {TENANT_COLUMNS} FROM tenants WHERE is_active = true ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns the tenant owning `shop_domain` (active or not), or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_tenant_by_domain(
    pool: &PgPool,
    shop_domain: &str,
) -> Result<Option<TenantRow>, DbError> {
    let row = sqlx::query_as::<_, TenantRow>(&format!(
        "SELECT {TENANT_COLUMNS} FROM tenants WHERE shop_domain = $1"
    ))
    .bind(shop_domain)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Marks a tenant inactive, halting ingestion and sync for it.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no tenant owns `shop_domain`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn deactivate_tenant(pool: &PgPool, shop_domain: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE tenants SET is_active = false, updated_at = NOW() WHERE shop_domain = $1",
    )
    .bind(shop_domain)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Replaces the stored API token hash for a tenant.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no tenant owns `shop_domain`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn set_tenant_api_token_hash(
    pool: &PgPool,
    shop_domain: &str,
    token_hash: &str,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE tenants SET api_token_hash = $1, updated_at = NOW() WHERE shop_domain = $2",
    )
    .bind(token_hash)
    .bind(shop_domain)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Resolves a tenant from the hash of a presented API token.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_tenant_by_api_token_hash(
    pool: &PgPool,
    token_hash: &str,
) -> Result<Option<TenantRow>, DbError> {
    let row = sqlx::query_as::<_, TenantRow>(&format!(
        "SELECT {TENANT_COLUMNS} FROM tenants WHERE api_token_hash = $1"
    ))
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
