//! Read-model queries used by `shopdash-server` dashboard endpoints.
//!
//! Every query is scoped to one tenant.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::commerce::{CustomerRow, OrderRow, ProductRow};
use crate::DbError;

/// Number of orders and of new customers each contributing to the activity feed.
const ACTIVITY_SOURCE_LIMIT: i64 = 5;

/// Headline counts for the overview cards.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct OverviewRow {
    pub total_customers: i64,
    pub total_orders: i64,
    pub total_products: i64,
    /// Sum of every order total, regardless of settlement status.
    pub total_revenue: Decimal,
}

/// Sort order for the customer list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CustomerSort {
    #[default]
    TotalSpent,
    CreatedAt,
    Name,
}

impl CustomerSort {
    /// Parses the `sort` query parameter; `None` for unknown values.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "total_spent" => Some(Self::TotalSpent),
            "created_at" => Some(Self::CreatedAt),
            "name" => Some(Self::Name),
            _ => None,
        }
    }

    fn order_by(self) -> &'static str {
        match self {
            Self::TotalSpent => "total_spent DESC, id",
            Self::CreatedAt => "created_at DESC, id DESC",
            Self::Name => "first_name, last_name, id",
        }
    }
}

/// An order nested under its customer in the customer list.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CustomerOrderRow {
    pub id: i64,
    pub customer_id: i64,
    pub external_order_id: String,
    pub total_price: Decimal,
    pub order_date: DateTime<Utc>,
    pub status: String,
    pub fulfillment_status: Option<String>,
    pub item_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerWithOrders {
    pub customer: CustomerRow,
    /// Newest first.
    pub orders: Vec<CustomerOrderRow>,
}

/// An order joined with its customer's display fields.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct OrderListRow {
    #[sqlx(flatten)]
    pub order: OrderRow,
    pub customer_first_name: Option<String>,
    pub customer_last_name: Option<String>,
    pub customer_email: Option<String>,
    pub item_count: i64,
}

/// One order line that sold a given product.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ProductSaleRow {
    pub external_order_id: String,
    pub order_date: DateTime<Utc>,
    pub customer_name: Option<String>,
    pub quantity: i32,
    /// Unit price times quantity.
    pub line_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDetail {
    pub product: ProductRow,
    pub total_sold: i64,
    pub sales: Vec<ProductSaleRow>,
}

/// An inclusive range of whole UTC days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateRange {
    /// From the start of `start` to the last millisecond of `end`.
    #[must_use]
    pub fn from_days(start: NaiveDate, end: NaiveDate) -> Self {
        let end_of_day =
            NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
        Self {
            from: start.and_time(NaiveTime::MIN).and_utc(),
            to: end.and_time(end_of_day).and_utc(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevenueGranularity {
    Daily,
    /// All 24 hours of the range, including hours without orders.
    Hourly,
}

/// Revenue for one bucket: `YYYY-MM-DD` when daily, `HH:00` when hourly.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RevenueBucket {
    pub bucket: String,
    pub revenue: Decimal,
}

/// An entry of the recent-activity feed.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ActivityRow {
    pub id: String,
    /// `ORDER_PLACED` or `NEW_CUSTOMER`.
    pub kind: String,
    pub message: String,
    pub amount: Option<Decimal>,
    pub occurred_at: DateTime<Utc>,
}

const ORDER_LIST_SELECT: &str = "SELECT o.id, o.tenant_id, o.external_order_id, o.customer_id, \
        o.total_price, o.order_date, o.status, o.financial_status, o.fulfillment_status, \
        o.tags, o.currency, o.created_at, o.updated_at, \
        c.first_name AS customer_first_name, c.last_name AS customer_last_name, \
        c.email AS customer_email, \
        (SELECT COUNT(*) FROM order_items i WHERE i.order_id = o.id) AS item_count \
    FROM orders o \
    LEFT JOIN customers c ON c.id = o.customer_id";

/// Returns customer, order, and product counts plus total order revenue.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_overview(pool: &PgPool, tenant_id: i64) -> Result<OverviewRow, DbError> {
    let row = sqlx::query_as::<_, OverviewRow>(
        "SELECT \
             (SELECT COUNT(*) FROM customers WHERE tenant_id = $1) AS total_customers, \
             (SELECT COUNT(*) FROM orders WHERE tenant_id = $1) AS total_orders, \
             (SELECT COUNT(*) FROM products WHERE tenant_id = $1) AS total_products, \
             (SELECT COALESCE(SUM(total_price), 0) FROM orders WHERE tenant_id = $1) \
                 AS total_revenue",
    )
    .bind(tenant_id)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Returns a page of customers, each with its orders nested newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either query fails.
pub async fn list_customers_with_orders(
    pool: &PgPool,
    tenant_id: i64,
    sort: CustomerSort,
    limit: i64,
    offset: i64,
) -> Result<Vec<CustomerWithOrders>, DbError> {
    let customers = sqlx::query_as::<_, CustomerRow>(&format!(
        "SELECT id, tenant_id, external_customer_id, email, first_name, last_name, \
                total_spent, currency, created_at, updated_at \
         FROM customers \
         WHERE tenant_id = $1 \
         ORDER BY {} \
         LIMIT $2 OFFSET $3",
        sort.order_by()
    ))
    .bind(tenant_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    if customers.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = customers.iter().map(|c| c.id).collect();
    let orders = sqlx::query_as::<_, CustomerOrderRow>(
        "SELECT o.id, o.customer_id, o.external_order_id, o.total_price, o.order_date, \
                o.status, o.fulfillment_status, \
                (SELECT COUNT(*) FROM order_items i WHERE i.order_id = o.id) AS item_count \
         FROM orders o \
         WHERE o.customer_id = ANY($1) \
         ORDER BY o.order_date DESC, o.id DESC",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let mut by_customer: HashMap<i64, Vec<CustomerOrderRow>> = HashMap::new();
    for order in orders {
        by_customer.entry(order.customer_id).or_default().push(order);
    }

    Ok(customers
        .into_iter()
        .map(|customer| CustomerWithOrders {
            orders: by_customer.remove(&customer.id).unwrap_or_default(),
            customer,
        })
        .collect())
}

/// Returns the `limit` customers with the highest `total_spent`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_top_customers(
    pool: &PgPool,
    tenant_id: i64,
    limit: i64,
) -> Result<Vec<CustomerRow>, DbError> {
    let rows = sqlx::query_as::<_, CustomerRow>(
        "SELECT id, tenant_id, external_customer_id, email, first_name, last_name, \
                total_spent, currency, created_at, updated_at \
         FROM customers \
         WHERE tenant_id = $1 \
         ORDER BY total_spent DESC, id \
         LIMIT $2",
    )
    .bind(tenant_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns every product of the tenant ordered by title.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_products(pool: &PgPool, tenant_id: i64) -> Result<Vec<ProductRow>, DbError> {
    let rows = sqlx::query_as::<_, ProductRow>(
        "SELECT id, tenant_id, external_product_id, title, price, inventory, images, \
                vendor, product_type, created_at, updated_at \
         FROM products \
         WHERE tenant_id = $1 \
         ORDER BY title, id",
    )
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns a product with every order line that sold it, newest order first.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the product does not exist for this
/// tenant, or [`DbError::Sqlx`] if a query fails.
pub async fn get_product_detail(
    pool: &PgPool,
    tenant_id: i64,
    product_id: i64,
) -> Result<ProductDetail, DbError> {
    let product = sqlx::query_as::<_, ProductRow>(
        "SELECT id, tenant_id, external_product_id, title, price, inventory, images, \
                vendor, product_type, created_at, updated_at \
         FROM products \
         WHERE tenant_id = $1 AND id = $2",
    )
    .bind(tenant_id)
    .bind(product_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    let sales = sqlx::query_as::<_, ProductSaleRow>(
        "SELECT o.external_order_id, o.order_date, \
                c.first_name || ' ' || c.last_name AS customer_name, \
                i.quantity, (i.price * i.quantity) AS line_total \
         FROM order_items i \
         JOIN orders o ON o.id = i.order_id \
         LEFT JOIN customers c ON c.id = o.customer_id \
         WHERE i.product_id = $1 AND o.tenant_id = $2 \
         ORDER BY o.order_date DESC, i.id",
    )
    .bind(product_id)
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;

    let total_sold = sales.iter().map(|s| i64::from(s.quantity)).sum();

    Ok(ProductDetail {
        product,
        total_sold,
        sales,
    })
}

/// Returns orders newest first, optionally restricted to a day range.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_orders(
    pool: &PgPool,
    tenant_id: i64,
    range: Option<DateRange>,
    limit: i64,
) -> Result<Vec<OrderListRow>, DbError> {
    let rows = sqlx::query_as::<_, OrderListRow>(&format!(
        "{ORDER_LIST_SELECT} \
         WHERE o.tenant_id = $1 \
           AND ($2::TIMESTAMPTZ IS NULL OR o.order_date >= $2) \
           AND ($3::TIMESTAMPTZ IS NULL OR o.order_date <= $3) \
         ORDER BY o.order_date DESC, o.id DESC \
         LIMIT $4"
    ))
    .bind(tenant_id)
    .bind(range.map(|r| r.from))
    .bind(range.map(|r| r.to))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns the `limit` most recent orders by order date.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_latest_orders(
    pool: &PgPool,
    tenant_id: i64,
    limit: i64,
) -> Result<Vec<OrderListRow>, DbError> {
    list_orders(pool, tenant_id, None, limit).await
}

/// Sums order totals per day, or per hour of the day.
///
/// Hourly buckets always cover `00:00` through `23:00`. Daily buckets only
/// include days that had orders.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn revenue_trend(
    pool: &PgPool,
    tenant_id: i64,
    range: Option<DateRange>,
    granularity: RevenueGranularity,
) -> Result<Vec<RevenueBucket>, DbError> {
    let sql = match granularity {
        RevenueGranularity::Daily => {
            "SELECT to_char(o.order_date AT TIME ZONE 'UTC', 'YYYY-MM-DD') AS bucket, \
                    SUM(o.total_price) AS revenue \
             FROM orders o \
             WHERE o.tenant_id = $1 \
               AND ($2::TIMESTAMPTZ IS NULL OR o.order_date >= $2) \
               AND ($3::TIMESTAMPTZ IS NULL OR o.order_date <= $3) \
             GROUP BY 1 \
             ORDER BY 1"
        }
        RevenueGranularity::Hourly => {
            "SELECT to_char(h, 'FM00') || ':00' AS bucket, \
                    COALESCE(SUM(o.total_price), 0) AS revenue \
             FROM generate_series(0, 23) AS h \
             LEFT JOIN orders o \
               ON o.tenant_id = $1 \
              AND ($2::TIMESTAMPTZ IS NULL OR o.order_date >= $2) \
              AND ($3::TIMESTAMPTZ IS NULL OR o.order_date <= $3) \
              AND EXTRACT(HOUR FROM o.order_date AT TIME ZONE 'UTC') = h \
             GROUP BY h \
             ORDER BY h"
        }
    };

    let rows = sqlx::query_as::<_, RevenueBucket>(sql)
        .bind(tenant_id)
        .bind(range.map(|r| r.from))
        .bind(range.map(|r| r.to))
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Returns the newest orders and newest customers merged into one feed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_activity(
    pool: &PgPool,
    tenant_id: i64,
    limit: i64,
) -> Result<Vec<ActivityRow>, DbError> {
    let rows = sqlx::query_as::<_, ActivityRow>(
        "(SELECT 'order_' || o.id AS id, 'ORDER_PLACED' AS kind, \
                 'Order #' || o.external_order_id || ' placed by ' \
                     || COALESCE(c.first_name, 'Guest') AS message, \
                 o.total_price AS amount, o.order_date AS occurred_at \
          FROM orders o \
          LEFT JOIN customers c ON c.id = o.customer_id \
          WHERE o.tenant_id = $1 \
          ORDER BY o.order_date DESC \
          LIMIT $2) \
         UNION ALL \
         (SELECT 'cust_' || c.id, 'NEW_CUSTOMER', \
                 'New customer joined: ' || c.first_name || ' ' || c.last_name, \
                 NULL::NUMERIC, c.created_at \
          FROM customers c \
          WHERE c.tenant_id = $1 \
          ORDER BY c.created_at DESC \
          LIMIT $2) \
         ORDER BY occurred_at DESC \
         LIMIT $3",
    )
    .bind(tenant_id)
    .bind(ACTIVITY_SOURCE_LIMIT)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customer_sort_parses_known_values() {
        assert_eq!(CustomerSort::parse("total_spent"), Some(CustomerSort::TotalSpent));
        assert_eq!(CustomerSort::parse("created_at"), Some(CustomerSort::CreatedAt));
        assert_eq!(CustomerSort::parse("name"), Some(CustomerSort::Name));
        assert_eq!(CustomerSort::parse("email; DROP TABLE"), None);
        assert_eq!(CustomerSort::default(), CustomerSort::TotalSpent);
    }

    #[test]
    fn date_range_covers_whole_days() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let range = DateRange::from_days(day, day);
        assert_eq!(range.from.to_rfc3339(), "2024-05-01T00:00:00+00:00");
        assert_eq!(range.to.to_rfc3339(), "2024-05-01T23:59:59.999+00:00");
    }
}
