//! Commerce entity rows and the [`CommerceStore`] seam the reconciler writes through.

use std::future::Future;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use shopdash_core::{CustomerRecord, InventoryLevelRecord, LocationRecord, OrderRecord, ProductRecord};

use crate::{DbError, TenantRow};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `customers` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CustomerRow {
    pub id: i64,
    pub tenant_id: i64,
    pub external_customer_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Sum of this customer's settled order totals, recomputed on every order merge.
    pub total_spent: Decimal,
    pub currency: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `products` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub tenant_id: i64,
    pub external_product_id: String,
    pub title: String,
    pub price: Decimal,
    pub inventory: i64,
    /// JSON array of image URLs, or `NULL` when the source listed none.
    pub images: Option<Value>,
    pub vendor: Option<String>,
    pub product_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `orders` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct OrderRow {
    pub id: i64,
    pub tenant_id: i64,
    pub external_order_id: String,
    /// `None` for guest orders.
    pub customer_id: Option<i64>,
    pub total_price: Decimal,
    pub order_date: DateTime<Utc>,
    pub status: String,
    pub financial_status: Option<String>,
    pub fulfillment_status: Option<String>,
    pub tags: Option<String>,
    pub currency: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `order_items` table.
///
/// Note: the schema does not include an `updated_at` column on this table;
/// items are only ever replaced wholesale.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct OrderItemRow {
    pub id: i64,
    pub order_id: i64,
    /// `None` when the product was not known locally at merge time.
    pub product_id: Option<i64>,
    pub position: i32,
    pub title: String,
    pub quantity: i32,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// A row from the `locations` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LocationRow {
    pub id: i64,
    pub tenant_id: i64,
    pub external_location_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `inventory_levels` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct InventoryLevelRow {
    pub id: i64,
    pub tenant_id: i64,
    pub location_id: i64,
    pub external_inventory_item_id: String,
    pub available: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One line item to attach to an order, already resolved against local products.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: Option<i64>,
    pub title: String,
    pub quantity: i32,
    pub price: Decimal,
}

/// Result of [`CommerceStore::upsert_order`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderUpsert {
    pub order: OrderRow,
    /// The customer the order was linked to before this upsert. Differs from
    /// `order.customer_id` when the order was re-linked.
    pub previous_customer_id: Option<i64>,
}

// ---------------------------------------------------------------------------
// Storage seam
// ---------------------------------------------------------------------------

/// Transactional upsert-by-unique-key storage for reconciled commerce state.
///
/// Every upsert keys on `(tenant_id, external id)` and leaves a row
/// byte-identical (including `updated_at`) when nothing changed.
pub trait CommerceStore: Send + Sync + 'static {
    /// Resolves a tenant (active or not) from its shop domain.
    fn find_tenant_by_domain(
        &self,
        shop_domain: &str,
    ) -> impl Future<Output = Result<Option<TenantRow>, DbError>> + Send;

    /// Inserts or updates a customer.
    ///
    /// `reported_total_spent` is only applied while no order references the
    /// customer; afterwards the stored aggregate is owned by
    /// [`CommerceStore::recompute_customer_total`].
    fn upsert_customer(
        &self,
        tenant_id: i64,
        customer: &CustomerRecord,
    ) -> impl Future<Output = Result<CustomerRow, DbError>> + Send;

    fn upsert_product(
        &self,
        tenant_id: i64,
        product: &ProductRecord,
    ) -> impl Future<Output = Result<ProductRow, DbError>> + Send;

    /// Inserts or updates an order linked to `customer_id`.
    ///
    /// A `None` `order_date` keeps the stored date, or uses the insert time.
    fn upsert_order(
        &self,
        tenant_id: i64,
        order: &OrderRecord,
        customer_id: Option<i64>,
    ) -> impl Future<Output = Result<OrderUpsert, DbError>> + Send;

    fn find_product_id(
        &self,
        tenant_id: i64,
        external_product_id: &str,
    ) -> impl Future<Output = Result<Option<i64>, DbError>> + Send;

    /// Replaces every item of `order_id` with `items`, atomically.
    ///
    /// Returns the number of items now attached. When the stored items
    /// already equal `items` nothing is rewritten.
    fn replace_order_items(
        &self,
        order_id: i64,
        items: &[NewOrderItem],
    ) -> impl Future<Output = Result<usize, DbError>> + Send;

    /// Recomputes `total_spent` from the customer's settled orders and stores it.
    fn recompute_customer_total(
        &self,
        customer_id: i64,
    ) -> impl Future<Output = Result<Decimal, DbError>> + Send;

    /// Ids of every customer belonging to `tenant_id`, ascending.
    fn list_customer_ids(
        &self,
        tenant_id: i64,
    ) -> impl Future<Output = Result<Vec<i64>, DbError>> + Send;

    fn insert_event(
        &self,
        tenant_id: i64,
        event_type: &str,
        payload: &Value,
    ) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Inserts or updates a location, returning its internal id.
    fn upsert_location(
        &self,
        tenant_id: i64,
        location: &LocationRecord,
    ) -> impl Future<Output = Result<i64, DbError>> + Send;

    fn upsert_inventory_level(
        &self,
        tenant_id: i64,
        location_id: i64,
        level: &InventoryLevelRecord,
    ) -> impl Future<Output = Result<(), DbError>> + Send;
}
