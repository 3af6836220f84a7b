mod customers;
mod dashboard;
mod orders;
mod products;
mod sync;
mod webhooks;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use shopdash_db::{DateRange, PgStore};
use shopdash_ingest::{DuplicateSuppressor, IngestionQueue, SyncOrchestrator, WebhookVerifier};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{request_id, require_tenant_auth, RequestId, TenantAuthState};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub queue: IngestionQueue,
    pub dedupe: DuplicateSuppressor,
    pub verifier: Arc<WebhookVerifier>,
    pub orchestrator: Arc<SyncOrchestrator<PgStore>>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(data: T, request_id: String) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "forbidden" => StatusCode::FORBIDDEN,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 200)
}

pub(super) fn map_db_error(request_id: String, error: &shopdash_db::DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

/// Parses the `start_date`/`end_date` query pair (`YYYY-MM-DD`).
///
/// The filter applies only when both are present and non-blank; the range
/// covers both days completely.
pub(super) fn parse_date_range(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<Option<DateRange>, String> {
    let (Some(start), Some(end)) = (
        start.map(str::trim).filter(|s| !s.is_empty()),
        end.map(str::trim).filter(|s| !s.is_empty()),
    ) else {
        return Ok(None);
    };

    let parse = |name: &str, raw: &str| {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| format!("{name} must be a YYYY-MM-DD date, got '{raw}'"))
    };
    let start = parse("start_date", start)?;
    let end = parse("end_date", end)?;
    if start > end {
        return Err("start_date must not be after end_date".to_owned());
    }

    Ok(Some(DateRange::from_days(start, end)))
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: TenantAuthState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/sync", post(sync::trigger_sync))
        .route("/api/v1/dashboard/overview", get(dashboard::get_overview))
        .route("/api/v1/revenue-trend", get(dashboard::get_revenue_trend))
        .route("/api/v1/events", get(dashboard::list_recent_events))
        .route("/api/v1/notifications", get(dashboard::list_notifications))
        .route("/api/v1/customers", get(customers::list_customers))
        .route("/api/v1/customers/top", get(customers::list_top_customers))
        .route("/api/v1/products", get(products::list_products))
        .route("/api/v1/products/{id}", get(products::get_product))
        .route("/api/v1/orders", get(orders::list_orders))
        .layer(axum::middleware::from_fn_with_state(
            auth,
            require_tenant_auth,
        ))
}

pub fn build_app(state: AppState, auth: TenantAuthState) -> Router {
    let public_routes = Router::new()
        .route("/api/v1/health", get(health))
        .route(
            "/api/v1/webhooks/shopify",
            post(webhooks::receive_webhook),
        )
        .route(
            "/api/v1/webhooks/shopify/{resource}/{action}",
            post(webhooks::receive_topic_webhook),
        );

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match shopdash_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::memory_state;
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::Timelike;
    use tower::ServiceExt;

    #[test]
    fn normalize_limit_applies_defaults_and_bounds() {
        assert_eq!(normalize_limit(None), 50);
        assert_eq!(normalize_limit(Some(0)), 1);
        assert_eq!(normalize_limit(Some(1_000)), 200);
        assert_eq!(normalize_limit(Some(25)), 25);
    }

    #[test]
    fn api_error_codes_map_to_statuses() {
        let cases = [
            ("validation_error", StatusCode::BAD_REQUEST),
            ("not_found", StatusCode::NOT_FOUND),
            ("unauthorized", StatusCode::UNAUTHORIZED),
            ("forbidden", StatusCode::FORBIDDEN),
            ("unavailable", StatusCode::SERVICE_UNAVAILABLE),
            ("sync_failed", StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (code, status) in cases {
            let response = ApiError::new("req-1", code, "msg").into_response();
            assert_eq!(response.status(), status, "code {code}");
        }
    }

    #[test]
    fn date_range_requires_both_bounds() {
        assert_eq!(parse_date_range(None, None), Ok(None));
        assert_eq!(parse_date_range(Some("2024-03-01"), None), Ok(None));
        assert_eq!(parse_date_range(Some(""), Some("2024-03-01")), Ok(None));
    }

    #[test]
    fn date_range_covers_whole_days() {
        let range = parse_date_range(Some("2024-03-01"), Some("2024-03-02"))
            .expect("valid")
            .expect("range");

        assert_eq!(range.from.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert_eq!(range.to.date_naive().to_string(), "2024-03-02");
        assert_eq!(range.to.hour(), 23);
        assert_eq!(range.to.minute(), 59);
    }

    #[test]
    fn date_range_rejects_bad_input() {
        assert!(parse_date_range(Some("03/01/2024"), Some("2024-03-02")).is_err());
        assert!(parse_date_range(Some("2024-03-05"), Some("2024-03-02")).is_err());
    }

    #[tokio::test]
    async fn protected_routes_require_bearer_token() {
        let (_store, state, auth) = memory_state(None);
        let app = build_app(state, auth);

        for uri in [
            "/api/v1/dashboard/overview",
            "/api/v1/customers",
            "/api/v1/orders",
        ] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/sync")
                    .header("authorization", "Basic abc")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json parse");
        assert_eq!(json["error"]["code"], "unauthorized");
    }

    #[tokio::test]
    async fn request_id_is_echoed() {
        let (_store, state, auth) = memory_state(None);
        let app = build_app(state, auth);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/customers")
                    .header("x-request-id", "req-abc")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(
            response
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok()),
            Some("req-abc")
        );
    }
}
