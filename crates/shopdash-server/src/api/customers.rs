use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shopdash_db::{CustomerOrderRow, CustomerRow, CustomerSort, CustomerWithOrders};

use crate::middleware::{AuthenticatedTenant, RequestId};

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState};

const TOP_CUSTOMERS_DEFAULT: i64 = 5;

#[derive(Debug, Deserialize)]
pub(super) struct CustomersQuery {
    pub sort: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TopCustomersQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct CustomerItem {
    id: i64,
    external_customer_id: String,
    email: String,
    first_name: String,
    last_name: String,
    total_spent: Decimal,
    currency: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    orders: Option<Vec<CustomerOrderItem>>,
}

#[derive(Debug, Serialize)]
pub(super) struct CustomerOrderItem {
    id: i64,
    external_order_id: String,
    total_price: Decimal,
    order_date: DateTime<Utc>,
    status: String,
    fulfillment_status: Option<String>,
    item_count: i64,
}

impl From<CustomerRow> for CustomerItem {
    fn from(row: CustomerRow) -> Self {
        Self {
            id: row.id,
            external_customer_id: row.external_customer_id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            total_spent: row.total_spent,
            currency: row.currency,
            created_at: row.created_at,
            updated_at: row.updated_at,
            orders: None,
        }
    }
}

impl From<CustomerOrderRow> for CustomerOrderItem {
    fn from(row: CustomerOrderRow) -> Self {
        Self {
            id: row.id,
            external_order_id: row.external_order_id,
            total_price: row.total_price,
            order_date: row.order_date,
            status: row.status,
            fulfillment_status: row.fulfillment_status,
            item_count: row.item_count,
        }
    }
}

impl From<CustomerWithOrders> for CustomerItem {
    fn from(row: CustomerWithOrders) -> Self {
        let mut item = Self::from(row.customer);
        item.orders = Some(row.orders.into_iter().map(CustomerOrderItem::from).collect());
        item
    }
}

/// Customers with their orders nested, sorted by `sort` (default `total_spent`).
pub(super) async fn list_customers(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(AuthenticatedTenant(tenant)): Extension<AuthenticatedTenant>,
    Query(query): Query<CustomersQuery>,
) -> Result<Json<ApiResponse<Vec<CustomerItem>>>, ApiError> {
    let sort = match query.sort.as_deref() {
        None | Some("") => CustomerSort::default(),
        Some(raw) => CustomerSort::parse(raw).ok_or_else(|| {
            ApiError::new(
                req_id.0.clone(),
                "validation_error",
                format!("sort must be one of total_spent, created_at, name; got '{raw}'"),
            )
        })?,
    };
    let offset = query.offset.unwrap_or(0).max(0);

    let rows = shopdash_db::list_customers_with_orders(
        &state.pool,
        tenant.id,
        sort,
        normalize_limit(query.limit),
        offset,
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows.into_iter().map(CustomerItem::from).collect();
    Ok(Json(ApiResponse::new(data, req_id.0)))
}

pub(super) async fn list_top_customers(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(AuthenticatedTenant(tenant)): Extension<AuthenticatedTenant>,
    Query(query): Query<TopCustomersQuery>,
) -> Result<Json<ApiResponse<Vec<CustomerItem>>>, ApiError> {
    let limit = query.limit.unwrap_or(TOP_CUSTOMERS_DEFAULT).clamp(1, 50);
    let rows = shopdash_db::list_top_customers(&state.pool, tenant.id, limit)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows.into_iter().map(CustomerItem::from).collect();
    Ok(Json(ApiResponse::new(data, req_id.0)))
}
