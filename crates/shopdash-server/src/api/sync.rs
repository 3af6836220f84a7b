use axum::{extract::State, Extension, Json};
use serde::Serialize;
use shopdash_ingest::{IngestError, SyncSummary, TriggerSource};

use crate::middleware::{AuthenticatedTenant, RequestId};

use super::{ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct SyncResult {
    message: String,
    sync_run_id: i64,
    customers: i32,
    products: i32,
    orders: i32,
    locations: i32,
    inventory_levels: i32,
    skipped: Vec<&'static str>,
}

impl From<SyncSummary> for SyncResult {
    fn from(summary: SyncSummary) -> Self {
        Self {
            message: summary.to_string(),
            sync_run_id: summary.sync_run_id,
            customers: summary.counts.customers,
            products: summary.counts.products,
            orders: summary.counts.orders,
            locations: summary.counts.locations,
            inventory_levels: summary.counts.inventory_levels,
            skipped: summary.skipped,
        }
    }
}

/// Runs a full bulk sync for the caller's tenant and waits for it.
pub(super) async fn trigger_sync(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(AuthenticatedTenant(tenant)): Extension<AuthenticatedTenant>,
) -> Result<Json<ApiResponse<SyncResult>>, ApiError> {
    let summary = state
        .orchestrator
        .sync_tenant(&tenant, TriggerSource::Manual)
        .await
        .map_err(|e| map_sync_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(SyncResult::from(summary), req_id.0)))
}

fn map_sync_error(request_id: String, error: &IngestError) -> ApiError {
    tracing::error!(error = %error, "sync failed");
    match error {
        IngestError::MissingAccessToken { .. } => {
            ApiError::new(request_id, "bad_request", error.to_string())
        }
        IngestError::InactiveTenant { .. } => {
            ApiError::new(request_id, "forbidden", error.to_string())
        }
        _ => ApiError::new(request_id, "sync_failed", format!("sync failed: {error}")),
    }
}
