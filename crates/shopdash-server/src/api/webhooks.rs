//! Shopify webhook receiver.
//!
//! Verified, first-seen deliveries are queued for reconciliation and
//! acknowledged immediately. Shopify sees `200` or `401`, plus `503` while
//! the server is draining its queue on shutdown.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Extension, Json,
};
use serde::Serialize;
use serde_json::Value;
use shopdash_ingest::WebhookJob;

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState};

const HMAC_HEADER: &str = "x-shopify-hmac-sha256";
const SHOP_DOMAIN_HEADER: &str = "x-shopify-shop-domain";
const EVENT_ID_HEADER: &str = "x-shopify-event-id";
const TOPIC_HEADER: &str = "x-shopify-topic";

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(super) struct WebhookAck {
    status: &'static str,
}

pub(super) async fn receive_topic_webhook(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((resource, action)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<WebhookAck>>, ApiError> {
    accept(&state, req_id.0, &headers, &body, Some(format!("{resource}/{action}")))
}

pub(super) async fn receive_webhook(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<WebhookAck>>, ApiError> {
    accept(&state, req_id.0, &headers, &body, None)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn ack(request_id: String, status: &'static str) -> Json<ApiResponse<WebhookAck>> {
    Json(ApiResponse::new(WebhookAck { status }, request_id))
}

fn accept(
    state: &AppState,
    request_id: String,
    headers: &HeaderMap,
    body: &[u8],
    path_topic: Option<String>,
) -> Result<Json<ApiResponse<WebhookAck>>, ApiError> {
    let (Some(digest), Some(shop_domain)) = (
        header_str(headers, HMAC_HEADER),
        header_str(headers, SHOP_DOMAIN_HEADER),
    ) else {
        tracing::warn!("webhook rejected: missing signature or shop domain header");
        return Err(ApiError::new(
            request_id,
            "unauthorized",
            "missing webhook signature or shop domain",
        ));
    };

    if !state.verifier.check(body, Some(digest)).is_accepted() {
        tracing::warn!(shop_domain, "webhook rejected: invalid signature");
        return Err(ApiError::new(
            request_id,
            "unauthorized",
            "invalid webhook signature",
        ));
    }

    let topic = header_str(headers, TOPIC_HEADER)
        .map(ToOwned::to_owned)
        .or(path_topic)
        .unwrap_or_default();
    let event_id = header_str(headers, EVENT_ID_HEADER);

    if !state.dedupe.should_process(event_id) {
        return Ok(ack(request_id, "duplicate"));
    }

    let payload: Value = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(
                shop_domain,
                topic = %topic,
                error = %e,
                "webhook body is not valid JSON; dropped"
            );
            return Ok(ack(request_id, "ignored"));
        }
    };

    tracing::info!(shop_domain, topic = %topic, ?event_id, "webhook accepted");
    let job = WebhookJob {
        topic,
        shop_domain: shop_domain.to_owned(),
        event_id: event_id.map(ToOwned::to_owned),
        payload,
    };
    if let Err(e) = state.queue.enqueue(job) {
        tracing::error!(shop_domain, error = %e, "failed to queue webhook");
        // Shopify retries a 503; the retry must not be taken for a duplicate.
        if let Some(event_id) = event_id {
            state.dedupe.forget(event_id);
        }
        return Err(ApiError::new(
            request_id,
            "unavailable",
            "webhook queue is not accepting work",
        ));
    }

    Ok(ack(request_id, "queued"))
}
