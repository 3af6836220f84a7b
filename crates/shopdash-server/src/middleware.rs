use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shopdash_db::TenantRow;
use sqlx::PgPool;
use uuid::Uuid;

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// The tenant a bearer token resolved to, stored as a request extension.
#[derive(Debug, Clone)]
pub struct AuthenticatedTenant(pub TenantRow);

/// Resolves bearer tokens to tenants.
#[derive(Clone)]
pub struct TenantAuthState {
    pool: PgPool,
    salt: Option<Arc<str>>,
}

impl TenantAuthState {
    #[must_use]
    pub fn new(pool: PgPool, salt: Option<&str>) -> Self {
        Self {
            pool,
            salt: salt.filter(|s| !s.is_empty()).map(Arc::from),
        }
    }
}

#[derive(Debug, Serialize)]
struct MiddlewareErrorBody {
    error: MiddlewareError,
}

#[derive(Debug, Serialize)]
struct MiddlewareError {
    code: &'static str,
    message: &'static str,
}

fn reject(status: StatusCode, code: &'static str, message: &'static str) -> Response {
    (
        status,
        Json(MiddlewareErrorBody {
            error: MiddlewareError { code, message },
        }),
    )
        .into_response()
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Middleware resolving `Authorization: Bearer <token>` to an active tenant.
///
/// Unknown tokens get `401`, tokens of a deactivated tenant get `403`.
pub async fn require_tenant_auth(
    State(auth): State<TenantAuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token_hash = match extract_bearer_token(req.headers().get(AUTHORIZATION)) {
        Some(token) => shopdash_core::hash_api_token(token, auth.salt.as_deref()),
        None => {
            return reject(
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "missing or invalid bearer token",
            )
        }
    };

    match shopdash_db::find_tenant_by_api_token_hash(&auth.pool, &token_hash).await {
        Ok(Some(tenant)) if tenant.is_active => {
            req.extensions_mut().insert(AuthenticatedTenant(tenant));
            next.run(req).await
        }
        Ok(Some(tenant)) => {
            tracing::warn!(tenant_id = tenant.id, "rejected token of inactive tenant");
            reject(StatusCode::FORBIDDEN, "forbidden", "tenant is inactive")
        }
        Ok(None) => reject(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing or invalid bearer token",
        ),
        Err(e) => {
            tracing::error!(error = %e, "tenant lookup failed");
            reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "failed to resolve tenant",
            )
        }
    }
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
