use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shopdash_db::OrderListRow;

use crate::middleware::{AuthenticatedTenant, RequestId};

use super::{map_db_error, normalize_limit, parse_date_range, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct OrdersQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct OrderCustomer {
    id: i64,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct OrderItem {
    id: i64,
    external_order_id: String,
    total_price: Decimal,
    order_date: DateTime<Utc>,
    status: String,
    financial_status: Option<String>,
    fulfillment_status: Option<String>,
    tags: Option<String>,
    currency: Option<String>,
    item_count: i64,
    /// `null` for guest orders.
    customer: Option<OrderCustomer>,
}

impl From<OrderListRow> for OrderItem {
    fn from(row: OrderListRow) -> Self {
        let customer = row.order.customer_id.map(|id| OrderCustomer {
            id,
            first_name: row.customer_first_name,
            last_name: row.customer_last_name,
            email: row.customer_email,
        });
        let order = row.order;
        Self {
            id: order.id,
            external_order_id: order.external_order_id,
            total_price: order.total_price,
            order_date: order.order_date,
            status: order.status,
            financial_status: order.financial_status,
            fulfillment_status: order.fulfillment_status,
            tags: order.tags,
            currency: order.currency,
            item_count: row.item_count,
            customer,
        }
    }
}

/// Orders newest first, optionally limited to an inclusive day range.
pub(super) async fn list_orders(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(AuthenticatedTenant(tenant)): Extension<AuthenticatedTenant>,
    Query(query): Query<OrdersQuery>,
) -> Result<Json<ApiResponse<Vec<OrderItem>>>, ApiError> {
    let range = parse_date_range(query.start_date.as_deref(), query.end_date.as_deref())
        .map_err(|msg| ApiError::new(req_id.0.clone(), "validation_error", msg))?;

    let rows = shopdash_db::list_orders(&state.pool, tenant.id, range, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows.into_iter().map(OrderItem::from).collect();
    Ok(Json(ApiResponse::new(data, req_id.0)))
}
