use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use shopdash_db::{DbError, ProductDetail, ProductRow, ProductSaleRow};

use crate::middleware::{AuthenticatedTenant, RequestId};

use super::{map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct ProductItem {
    id: i64,
    external_product_id: String,
    title: String,
    price: Decimal,
    inventory: i64,
    /// `Active` while stock remains, `Out of Stock` otherwise.
    status: &'static str,
    image: Option<String>,
    vendor: Option<String>,
    product_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct ProductDetailItem {
    #[serde(flatten)]
    product: ProductItem,
    total_sold: i64,
    orders: Vec<ProductSaleItem>,
}

#[derive(Debug, Serialize)]
pub(super) struct ProductSaleItem {
    order_id: String,
    order_date: DateTime<Utc>,
    customer_name: String,
    quantity: i32,
    total_price: Decimal,
}

fn first_image(images: Option<&Value>) -> Option<String> {
    images?
        .as_array()?
        .first()?
        .as_str()
        .map(ToOwned::to_owned)
}

impl From<ProductRow> for ProductItem {
    fn from(row: ProductRow) -> Self {
        Self {
            image: first_image(row.images.as_ref()),
            status: if row.inventory > 0 {
                "Active"
            } else {
                "Out of Stock"
            },
            id: row.id,
            external_product_id: row.external_product_id,
            title: row.title,
            price: row.price,
            inventory: row.inventory,
            vendor: row.vendor,
            product_type: row.product_type,
        }
    }
}

impl From<ProductSaleRow> for ProductSaleItem {
    fn from(row: ProductSaleRow) -> Self {
        Self {
            order_id: row.external_order_id,
            order_date: row.order_date,
            customer_name: row.customer_name.unwrap_or_else(|| "Unknown".to_owned()),
            quantity: row.quantity,
            total_price: row.line_total,
        }
    }
}

impl From<ProductDetail> for ProductDetailItem {
    fn from(detail: ProductDetail) -> Self {
        Self {
            product: ProductItem::from(detail.product),
            total_sold: detail.total_sold,
            orders: detail.sales.into_iter().map(ProductSaleItem::from).collect(),
        }
    }
}

pub(super) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(AuthenticatedTenant(tenant)): Extension<AuthenticatedTenant>,
) -> Result<Json<ApiResponse<Vec<ProductItem>>>, ApiError> {
    let rows = shopdash_db::list_products(&state.pool, tenant.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows.into_iter().map(ProductItem::from).collect();
    Ok(Json(ApiResponse::new(data, req_id.0)))
}

/// One product with every order line that sold it, newest first.
pub(super) async fn get_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(AuthenticatedTenant(tenant)): Extension<AuthenticatedTenant>,
    Path(product_id): Path<i64>,
) -> Result<Json<ApiResponse<ProductDetailItem>>, ApiError> {
    let detail = match shopdash_db::get_product_detail(&state.pool, tenant.id, product_id).await {
        Ok(detail) => detail,
        Err(DbError::NotFound) => {
            return Err(ApiError::new(
                req_id.0,
                "not_found",
                format!("product {product_id} not found"),
            ))
        }
        Err(e) => return Err(map_db_error(req_id.0, &e)),
    };

    Ok(Json(ApiResponse::new(
        ProductDetailItem::from(detail),
        req_id.0,
    )))
}
