//! Postgres implementation of [`CommerceStore`] and [`SyncLedger`].
//!
//! Each upsert bumps `updated_at` only when a stored column actually changes,
//! so replaying an identical payload leaves the row byte-identical.

use rust_decimal::Decimal;
use serde_json::Value;
use shopdash_core::{
    CustomerRecord, InventoryLevelRecord, LocationRecord, OrderRecord, ProductRecord,
    SETTLED_STATUSES,
};
use sqlx::PgPool;

use crate::commerce::{
    CommerceStore, CustomerRow, NewOrderItem, OrderRow, OrderUpsert, ProductRow,
};
use crate::sync_runs::{SyncCounts, SyncLedger, SyncRunRow};
use crate::{DbError, TenantRow};

const CUSTOMER_COLUMNS: &str = "id, tenant_id, external_customer_id, email, first_name, \
                                last_name, total_spent, currency, created_at, updated_at";

const PRODUCT_COLUMNS: &str = "id, tenant_id, external_product_id, title, price, inventory, \
                               images, vendor, product_type, created_at, updated_at";

const ORDER_COLUMNS: &str = "id, tenant_id, external_order_id, customer_id, total_price, \
                             order_date, status, financial_status, fulfillment_status, tags, \
                             currency, created_at, updated_at";

/// [`CommerceStore`] backed by a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(sqlx::FromRow)]
struct OrderUpsertRow {
    #[sqlx(flatten)]
    order: OrderRow,
    previous_customer_id: Option<i64>,
}

#[derive(sqlx::FromRow)]
struct StoredItem {
    product_id: Option<i64>,
    title: String,
    quantity: i32,
    price: Decimal,
}

impl CommerceStore for PgStore {
    async fn find_tenant_by_domain(&self, shop_domain: &str) -> Result<Option<TenantRow>, DbError> {
        crate::tenants::get_tenant_by_domain(&self.pool, shop_domain).await
    }

    async fn upsert_customer(
        &self,
        tenant_id: i64,
        customer: &CustomerRecord,
    ) -> Result<CustomerRow, DbError> {
        // The aggregate is only overwritten by a reported value while no
        // order references the customer.
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "INSERT INTO customers AS c \
                 (tenant_id, external_customer_id, email, first_name, last_name, \
                  total_spent, currency) \
             VALUES ($1, $2, $3, $4, $5, COALESCE($6::NUMERIC, 0), $7) \
             ON CONFLICT (tenant_id, external_customer_id) DO UPDATE SET \
                 email       = EXCLUDED.email, \
                 first_name  = EXCLUDED.first_name, \
                 last_name   = EXCLUDED.last_name, \
                 total_spent = CASE \
                     WHEN EXISTS (SELECT 1 FROM orders o WHERE o.customer_id = c.id) \
                         THEN c.total_spent \
                     ELSE COALESCE($6::NUMERIC, c.total_spent) END, \
                 currency    = COALESCE(EXCLUDED.currency, c.currency), \
                 updated_at  = CASE \
                     WHEN (c.email, c.first_name, c.last_name, c.currency) \
                          IS DISTINCT FROM \
                          (EXCLUDED.email, EXCLUDED.first_name, EXCLUDED.last_name, \
                           COALESCE(EXCLUDED.currency, c.currency)) \
                       OR (NOT EXISTS (SELECT 1 FROM orders o WHERE o.customer_id = c.id) \
                           AND $6::NUMERIC IS NOT NULL \
                           AND c.total_spent IS DISTINCT FROM $6::NUMERIC(14, 2)) \
                         THEN NOW() \
                     ELSE c.updated_at END \
             RETURNING {CUSTOMER_COLUMNS}"
        ))
        .bind(tenant_id)
        .bind(&customer.external_id)
        .bind(&customer.email)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(customer.reported_total_spent)
        .bind(&customer.currency)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn upsert_product(
        &self,
        tenant_id: i64,
        product: &ProductRecord,
    ) -> Result<ProductRow, DbError> {
        let images = product
            .images
            .as_ref()
            .map(|urls| Value::from(urls.clone()));

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "INSERT INTO products AS p \
                 (tenant_id, external_product_id, title, price, inventory, images, \
                  vendor, product_type) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (tenant_id, external_product_id) DO UPDATE SET \
                 title        = EXCLUDED.title, \
                 price        = EXCLUDED.price, \
                 inventory    = EXCLUDED.inventory, \
                 images       = EXCLUDED.images, \
                 vendor       = EXCLUDED.vendor, \
                 product_type = EXCLUDED.product_type, \
                 updated_at   = CASE \
                     WHEN (p.title, p.price, p.inventory, p.images, p.vendor, p.product_type) \
                          IS DISTINCT FROM \
                          (EXCLUDED.title, EXCLUDED.price, EXCLUDED.inventory, \
                           EXCLUDED.images, EXCLUDED.vendor, EXCLUDED.product_type) \
                         THEN NOW() \
                     ELSE p.updated_at END \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(tenant_id)
        .bind(&product.external_id)
        .bind(&product.title)
        .bind(product.price)
        .bind(product.inventory)
        .bind(images)
        .bind(&product.vendor)
        .bind(&product.product_type)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn upsert_order(
        &self,
        tenant_id: i64,
        order: &OrderRecord,
        customer_id: Option<i64>,
    ) -> Result<OrderUpsert, DbError> {
        // The CTE reads the pre-upsert snapshot, which is how the previous
        // customer link survives into RETURNING.
        let row = sqlx::query_as::<_, OrderUpsertRow>(&format!(
            "WITH prev AS ( \
                 SELECT customer_id FROM orders \
                 WHERE tenant_id = $1 AND external_order_id = $2 \
             ) \
             INSERT INTO orders AS o \
                 (tenant_id, external_order_id, customer_id, total_price, order_date, \
                  status, financial_status, fulfillment_status, tags, currency) \
             VALUES ($1, $2, $3, $4, COALESCE($5::TIMESTAMPTZ, NOW()), $6, $7, $8, $9, $10) \
             ON CONFLICT (tenant_id, external_order_id) DO UPDATE SET \
                 customer_id        = EXCLUDED.customer_id, \
                 total_price        = EXCLUDED.total_price, \
                 order_date         = COALESCE($5, o.order_date), \
                 status             = EXCLUDED.status, \
                 financial_status   = EXCLUDED.financial_status, \
                 fulfillment_status = EXCLUDED.fulfillment_status, \
                 tags               = EXCLUDED.tags, \
                 currency           = COALESCE(EXCLUDED.currency, o.currency), \
                 updated_at         = CASE \
                     WHEN (o.customer_id, o.total_price, o.order_date, o.status, \
                           o.financial_status, o.fulfillment_status, o.tags, o.currency) \
                          IS DISTINCT FROM \
                          (EXCLUDED.customer_id, EXCLUDED.total_price, \
                           COALESCE($5, o.order_date), EXCLUDED.status, \
                           EXCLUDED.financial_status, EXCLUDED.fulfillment_status, \
                           EXCLUDED.tags, COALESCE(EXCLUDED.currency, o.currency)) \
                         THEN NOW() \
                     ELSE o.updated_at END \
             RETURNING {ORDER_COLUMNS}, (SELECT customer_id FROM prev) AS previous_customer_id"
        ))
        .bind(tenant_id)
        .bind(&order.external_id)
        .bind(customer_id)
        .bind(order.total_price)
        .bind(order.order_date)
        .bind(&order.status)
        .bind(&order.financial_status)
        .bind(&order.fulfillment_status)
        .bind(&order.tags)
        .bind(&order.currency)
        .fetch_one(&self.pool)
        .await?;

        Ok(OrderUpsert {
            order: row.order,
            previous_customer_id: row.previous_customer_id,
        })
    }

    async fn find_product_id(
        &self,
        tenant_id: i64,
        external_product_id: &str,
    ) -> Result<Option<i64>, DbError> {
        let id = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM products WHERE tenant_id = $1 AND external_product_id = $2",
        )
        .bind(tenant_id)
        .bind(external_product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn replace_order_items(
        &self,
        order_id: i64,
        items: &[NewOrderItem],
    ) -> Result<usize, DbError> {
        let mut tx = self.pool.begin().await?;

        // Lock the parent so concurrent replacements of one order serialize.
        sqlx::query("SELECT id FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;

        let stored = sqlx::query_as::<_, StoredItem>(
            "SELECT product_id, title, quantity, price \
             FROM order_items WHERE order_id = $1 ORDER BY position",
        )
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await?;

        let unchanged = stored.len() == items.len()
            && stored.iter().zip(items).all(|(s, n)| {
                s.product_id == n.product_id
                    && s.title == n.title
                    && s.quantity == n.quantity
                    && s.price == n.price
            });
        if unchanged {
            tx.commit().await?;
            return Ok(items.len());
        }

        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        for (position, item) in (0_i32..).zip(items) {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, position, title, quantity, price) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(order_id)
            .bind(item.product_id)
            .bind(position)
            .bind(&item.title)
            .bind(item.quantity)
            .bind(item.price)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(items.len())
    }

    async fn recompute_customer_total(&self, customer_id: i64) -> Result<Decimal, DbError> {
        let statuses: Vec<String> = SETTLED_STATUSES.iter().map(ToString::to_string).collect();

        let total = sqlx::query_scalar::<_, Decimal>(
            "UPDATE customers AS c SET \
                 total_spent = agg.total, \
                 updated_at  = CASE WHEN c.total_spent IS DISTINCT FROM agg.total \
                                    THEN NOW() ELSE c.updated_at END \
             FROM ( \
                 SELECT COALESCE(SUM(total_price), 0)::NUMERIC(14, 2) AS total \
                 FROM orders \
                 WHERE customer_id = $1 AND status = ANY($2::TEXT[]) \
             ) AS agg \
             WHERE c.id = $1 \
             RETURNING c.total_spent",
        )
        .bind(customer_id)
        .bind(statuses)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(total)
    }

    async fn list_customer_ids(&self, tenant_id: i64) -> Result<Vec<i64>, DbError> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM customers WHERE tenant_id = $1 ORDER BY id",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn insert_event(
        &self,
        tenant_id: i64,
        event_type: &str,
        payload: &Value,
    ) -> Result<(), DbError> {
        crate::events::insert_event(&self.pool, tenant_id, event_type, payload).await
    }

    async fn upsert_location(
        &self,
        tenant_id: i64,
        location: &LocationRecord,
    ) -> Result<i64, DbError> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO locations AS l (tenant_id, external_location_id, name) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (tenant_id, external_location_id) DO UPDATE SET \
                 name       = EXCLUDED.name, \
                 updated_at = CASE WHEN l.name IS DISTINCT FROM EXCLUDED.name \
                                   THEN NOW() ELSE l.updated_at END \
             RETURNING id",
        )
        .bind(tenant_id)
        .bind(&location.external_id)
        .bind(&location.name)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn upsert_inventory_level(
        &self,
        tenant_id: i64,
        location_id: i64,
        level: &InventoryLevelRecord,
    ) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO inventory_levels AS i \
                 (tenant_id, location_id, external_inventory_item_id, available) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (tenant_id, location_id, external_inventory_item_id) DO UPDATE SET \
                 available  = EXCLUDED.available, \
                 updated_at = CASE WHEN i.available IS DISTINCT FROM EXCLUDED.available \
                                   THEN NOW() ELSE i.updated_at END",
        )
        .bind(tenant_id)
        .bind(location_id)
        .bind(&level.external_inventory_item_id)
        .bind(level.available)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl SyncLedger for PgStore {
    async fn list_active_tenants(&self) -> Result<Vec<TenantRow>, DbError> {
        crate::tenants::list_active_tenants(&self.pool).await
    }

    async fn create_sync_run(
        &self,
        tenant_id: i64,
        trigger_source: &str,
    ) -> Result<SyncRunRow, DbError> {
        crate::sync_runs::create_sync_run(&self.pool, tenant_id, trigger_source).await
    }

    async fn start_sync_run(&self, id: i64) -> Result<(), DbError> {
        crate::sync_runs::start_sync_run(&self.pool, id).await
    }

    async fn complete_sync_run(&self, id: i64, counts: SyncCounts) -> Result<(), DbError> {
        crate::sync_runs::complete_sync_run(&self.pool, id, counts).await
    }

    async fn fail_sync_run(
        &self,
        id: i64,
        counts: SyncCounts,
        error_message: &str,
    ) -> Result<(), DbError> {
        crate::sync_runs::fail_sync_run(&self.pool, id, counts, error_message).await
    }
}
