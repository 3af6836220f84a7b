use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shopdash_db::{OrderListRow, RevenueGranularity};

use crate::middleware::{AuthenticatedTenant, RequestId};

use super::{map_db_error, parse_date_range, ApiError, ApiResponse, AppState};

const RECENT_ACTIVITY_LIMIT: i64 = 10;
const NOTIFICATION_LIMIT: i64 = 5;

#[derive(Debug, Serialize)]
pub(super) struct OverviewData {
    total_customers: i64,
    total_orders: i64,
    total_products: i64,
    total_revenue: Decimal,
}

#[derive(Debug, Deserialize)]
pub(super) struct RevenueTrendQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct RevenuePoint {
    /// `YYYY-MM-DD`, or `HH:00` for a single-day range.
    date: String,
    revenue: Decimal,
}

#[derive(Debug, Serialize)]
pub(super) struct ActivityItem {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    message: String,
    amount: Option<Decimal>,
    date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct NotificationItem {
    id: i64,
    title: &'static str,
    message: String,
    time: DateTime<Utc>,
    read: bool,
    #[serde(rename = "type")]
    kind: &'static str,
}

impl From<OrderListRow> for NotificationItem {
    fn from(row: OrderListRow) -> Self {
        let who = row.customer_first_name.as_deref().unwrap_or("Guest");
        Self {
            id: row.order.id,
            title: "New Order Received",
            message: format!(
                "Order #{} from {who} - ${:.2}",
                row.order.external_order_id, row.order.total_price
            ),
            time: row.order.order_date,
            read: false,
            kind: "order",
        }
    }
}

pub(super) async fn get_overview(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(AuthenticatedTenant(tenant)): Extension<AuthenticatedTenant>,
) -> Result<Json<ApiResponse<OverviewData>>, ApiError> {
    let row = shopdash_db::get_overview(&state.pool, tenant.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = OverviewData {
        total_customers: row.total_customers,
        total_orders: row.total_orders,
        total_products: row.total_products,
        total_revenue: row.total_revenue,
    };
    Ok(Json(ApiResponse::new(data, req_id.0)))
}

/// Revenue per day, or per hour when the range is a single day.
pub(super) async fn get_revenue_trend(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(AuthenticatedTenant(tenant)): Extension<AuthenticatedTenant>,
    Query(query): Query<RevenueTrendQuery>,
) -> Result<Json<ApiResponse<Vec<RevenuePoint>>>, ApiError> {
    let range = parse_date_range(query.start_date.as_deref(), query.end_date.as_deref())
        .map_err(|msg| ApiError::new(req_id.0.clone(), "validation_error", msg))?;
    let granularity = match range {
        Some(r) if r.from.date_naive() == r.to.date_naive() => RevenueGranularity::Hourly,
        _ => RevenueGranularity::Daily,
    };

    let buckets = shopdash_db::revenue_trend(&state.pool, tenant.id, range, granularity)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = buckets
        .into_iter()
        .map(|b| RevenuePoint {
            date: b.bucket,
            revenue: b.revenue,
        })
        .collect();
    Ok(Json(ApiResponse::new(data, req_id.0)))
}

/// Latest orders and newest customers, newest first.
pub(super) async fn list_recent_events(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(AuthenticatedTenant(tenant)): Extension<AuthenticatedTenant>,
) -> Result<Json<ApiResponse<Vec<ActivityItem>>>, ApiError> {
    let rows = shopdash_db::list_recent_activity(&state.pool, tenant.id, RECENT_ACTIVITY_LIMIT)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| ActivityItem {
            id: row.id,
            kind: row.kind,
            message: row.message,
            amount: row.amount,
            date: row.occurred_at,
        })
        .collect();
    Ok(Json(ApiResponse::new(data, req_id.0)))
}

/// The five latest orders, phrased as notifications.
pub(super) async fn list_notifications(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(AuthenticatedTenant(tenant)): Extension<AuthenticatedTenant>,
) -> Result<Json<ApiResponse<Vec<NotificationItem>>>, ApiError> {
    let rows = shopdash_db::list_latest_orders(&state.pool, tenant.id, NOTIFICATION_LIMIT)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows.into_iter().map(NotificationItem::from).collect();
    Ok(Json(ApiResponse::new(data, req_id.0)))
}
