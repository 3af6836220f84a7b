//! In-memory [`CommerceStore`] and [`SyncLedger`] with the same merge
//! semantics as [`crate::PgStore`]. Enabled by the `test-support` feature.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use shopdash_core::{
    is_settled_status, CustomerRecord, InventoryLevelRecord, LocationRecord, OrderRecord,
    ProductRecord,
};
use uuid::Uuid;

use crate::commerce::{
    CommerceStore, CustomerRow, InventoryLevelRow, LocationRow, NewOrderItem, OrderItemRow,
    OrderRow, OrderUpsert, ProductRow,
};
use crate::events::EventRow;
use crate::sync_runs::{SyncCounts, SyncLedger, SyncRunRow};
use crate::{DbError, TenantRow};

/// Operations that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    ReplaceOrderItems,
    RecomputeCustomerTotal,
    UpsertLocation,
}

#[derive(Default)]
struct State {
    next_id: i64,
    tenants: Vec<TenantRow>,
    customers: Vec<CustomerRow>,
    products: Vec<ProductRow>,
    orders: Vec<OrderRow>,
    order_items: Vec<OrderItemRow>,
    events: Vec<EventRow>,
    locations: Vec<LocationRow>,
    inventory_levels: Vec<InventoryLevelRow>,
    sync_runs: Vec<SyncRunRow>,
    fail_points: Vec<FailPoint>,
}

impl State {
    fn id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check(&self, point: FailPoint, name: &'static str) -> Result<(), DbError> {
        if self.fail_points.contains(&point) {
            return Err(DbError::Injected(name));
        }
        Ok(())
    }
}

/// A `CommerceStore` that keeps every table in a `Vec` behind a mutex.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

/// Mirrors `NUMERIC(14, 2)` column storage.
fn money(value: Decimal) -> Decimal {
    let mut stored = value.round_dp(2);
    stored.rescale(2);
    stored
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not wedge every later assertion.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Inserts an active tenant and returns it.
    pub fn add_tenant(&self, name: &str, shop_domain: &str, access_token: Option<&str>) -> TenantRow {
        let mut state = self.lock();
        let now = Utc::now();
        let row = TenantRow {
            id: state.id(),
            public_id: Uuid::new_v4(),
            name: name.to_string(),
            shop_domain: shop_domain.to_string(),
            access_token: access_token.map(str::to_string),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        state.tenants.push(row.clone());
        row
    }

    pub fn set_tenant_active(&self, tenant_id: i64, is_active: bool) {
        let mut state = self.lock();
        if let Some(tenant) = state.tenants.iter_mut().find(|t| t.id == tenant_id) {
            tenant.is_active = is_active;
        }
    }

    /// Makes every later call of `point` fail with [`DbError::Injected`].
    pub fn fail_on(&self, point: FailPoint) {
        self.lock().fail_points.push(point);
    }

    pub fn clear_failures(&self) {
        self.lock().fail_points.clear();
    }

    #[must_use]
    pub fn customers(&self) -> Vec<CustomerRow> {
        self.lock().customers.clone()
    }

    #[must_use]
    pub fn products(&self) -> Vec<ProductRow> {
        self.lock().products.clone()
    }

    #[must_use]
    pub fn orders(&self) -> Vec<OrderRow> {
        self.lock().orders.clone()
    }

    /// Items of one order in position order.
    #[must_use]
    pub fn order_items(&self, order_id: i64) -> Vec<OrderItemRow> {
        let mut items: Vec<_> = self
            .lock()
            .order_items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.position);
        items
    }

    #[must_use]
    pub fn all_order_items(&self) -> Vec<OrderItemRow> {
        self.lock().order_items.clone()
    }

    #[must_use]
    pub fn events(&self) -> Vec<EventRow> {
        self.lock().events.clone()
    }

    #[must_use]
    pub fn locations(&self) -> Vec<LocationRow> {
        self.lock().locations.clone()
    }

    #[must_use]
    pub fn inventory_levels(&self) -> Vec<InventoryLevelRow> {
        self.lock().inventory_levels.clone()
    }

    #[must_use]
    pub fn sync_runs(&self) -> Vec<SyncRunRow> {
        self.lock().sync_runs.clone()
    }

    /// Overwrites `total_spent` directly, as an out-of-band writer would.
    pub fn force_total_spent(&self, customer_id: i64, total: Decimal) {
        let mut state = self.lock();
        if let Some(customer) = state.customers.iter_mut().find(|c| c.id == customer_id) {
            customer.total_spent = money(total);
        }
    }

    fn settle_run(
        &self,
        id: i64,
        status: &str,
        counts: SyncCounts,
        error_message: Option<&str>,
    ) -> Result<(), DbError> {
        let mut state = self.lock();
        let run = state
            .sync_runs
            .iter_mut()
            .find(|r| r.id == id && r.status == "running")
            .ok_or(DbError::InvalidSyncRunTransition {
                id,
                expected_status: "running",
            })?;
        run.status = status.to_string();
        run.completed_at = Some(Utc::now());
        run.customers_processed = counts.customers;
        run.products_processed = counts.products;
        run.orders_processed = counts.orders;
        run.locations_processed = counts.locations;
        run.inventory_levels_processed = counts.inventory_levels;
        run.error_message = error_message.map(str::to_string);
        Ok(())
    }
}

fn touch(updated_at: &mut DateTime<Utc>, changed: bool, now: DateTime<Utc>) {
    if changed {
        *updated_at = now;
    }
}

impl CommerceStore for MemoryStore {
    async fn find_tenant_by_domain(&self, shop_domain: &str) -> Result<Option<TenantRow>, DbError> {
        Ok(self
            .lock()
            .tenants
            .iter()
            .find(|t| t.shop_domain == shop_domain)
            .cloned())
    }

    async fn upsert_customer(
        &self,
        tenant_id: i64,
        customer: &CustomerRecord,
    ) -> Result<CustomerRow, DbError> {
        let mut state = self.lock();
        let now = Utc::now();
        let reported = customer.reported_total_spent.map(money);

        if let Some(idx) = state.customers.iter().position(|c| {
            c.tenant_id == tenant_id && c.external_customer_id == customer.external_id
        }) {
            let id = state.customers[idx].id;
            let has_orders = state.orders.iter().any(|o| o.customer_id == Some(id));
            let row = &mut state.customers[idx];

            let currency = customer.currency.clone().or_else(|| row.currency.clone());
            let total_spent = match reported {
                Some(total) if !has_orders => total,
                _ => row.total_spent,
            };
            let changed = row.email != customer.email
                || row.first_name != customer.first_name
                || row.last_name != customer.last_name
                || row.currency != currency
                || row.total_spent != total_spent;

            row.email.clone_from(&customer.email);
            row.first_name.clone_from(&customer.first_name);
            row.last_name.clone_from(&customer.last_name);
            row.currency = currency;
            row.total_spent = total_spent;
            touch(&mut row.updated_at, changed, now);
            return Ok(row.clone());
        }

        let row = CustomerRow {
            id: state.id(),
            tenant_id,
            external_customer_id: customer.external_id.clone(),
            email: customer.email.clone(),
            first_name: customer.first_name.clone(),
            last_name: customer.last_name.clone(),
            total_spent: reported.unwrap_or_else(|| money(Decimal::ZERO)),
            currency: customer.currency.clone(),
            created_at: now,
            updated_at: now,
        };
        state.customers.push(row.clone());
        Ok(row)
    }

    async fn upsert_product(
        &self,
        tenant_id: i64,
        product: &ProductRecord,
    ) -> Result<ProductRow, DbError> {
        let mut state = self.lock();
        let now = Utc::now();
        let images = product
            .images
            .as_ref()
            .map(|urls| Value::from(urls.clone()));
        let price = money(product.price);

        if let Some(row) = state.products.iter_mut().find(|p| {
            p.tenant_id == tenant_id && p.external_product_id == product.external_id
        }) {
            let changed = row.title != product.title
                || row.price != price
                || row.inventory != product.inventory
                || row.images != images
                || row.vendor != product.vendor
                || row.product_type != product.product_type;

            row.title.clone_from(&product.title);
            row.price = price;
            row.inventory = product.inventory;
            row.images = images;
            row.vendor.clone_from(&product.vendor);
            row.product_type.clone_from(&product.product_type);
            touch(&mut row.updated_at, changed, now);
            return Ok(row.clone());
        }

        let row = ProductRow {
            id: state.id(),
            tenant_id,
            external_product_id: product.external_id.clone(),
            title: product.title.clone(),
            price,
            inventory: product.inventory,
            images,
            vendor: product.vendor.clone(),
            product_type: product.product_type.clone(),
            created_at: now,
            updated_at: now,
        };
        state.products.push(row.clone());
        Ok(row)
    }

    async fn upsert_order(
        &self,
        tenant_id: i64,
        order: &OrderRecord,
        customer_id: Option<i64>,
    ) -> Result<OrderUpsert, DbError> {
        let mut state = self.lock();
        let now = Utc::now();
        let total_price = money(order.total_price);

        if let Some(row) = state.orders.iter_mut().find(|o| {
            o.tenant_id == tenant_id && o.external_order_id == order.external_id
        }) {
            let previous_customer_id = row.customer_id;
            let order_date = order.order_date.unwrap_or(row.order_date);
            let currency = order.currency.clone().or_else(|| row.currency.clone());
            let changed = row.customer_id != customer_id
                || row.total_price != total_price
                || row.order_date != order_date
                || row.status != order.status
                || row.financial_status != order.financial_status
                || row.fulfillment_status != order.fulfillment_status
                || row.tags != order.tags
                || row.currency != currency;

            row.customer_id = customer_id;
            row.total_price = total_price;
            row.order_date = order_date;
            row.status.clone_from(&order.status);
            row.financial_status.clone_from(&order.financial_status);
            row.fulfillment_status.clone_from(&order.fulfillment_status);
            row.tags.clone_from(&order.tags);
            row.currency = currency;
            touch(&mut row.updated_at, changed, now);
            return Ok(OrderUpsert {
                order: row.clone(),
                previous_customer_id,
            });
        }

        let row = OrderRow {
            id: state.id(),
            tenant_id,
            external_order_id: order.external_id.clone(),
            customer_id,
            total_price,
            order_date: order.order_date.unwrap_or(now),
            status: order.status.clone(),
            financial_status: order.financial_status.clone(),
            fulfillment_status: order.fulfillment_status.clone(),
            tags: order.tags.clone(),
            currency: order.currency.clone(),
            created_at: now,
            updated_at: now,
        };
        state.orders.push(row.clone());
        Ok(OrderUpsert {
            order: row,
            previous_customer_id: None,
        })
    }

    async fn find_product_id(
        &self,
        tenant_id: i64,
        external_product_id: &str,
    ) -> Result<Option<i64>, DbError> {
        Ok(self
            .lock()
            .products
            .iter()
            .find(|p| p.tenant_id == tenant_id && p.external_product_id == external_product_id)
            .map(|p| p.id))
    }

    async fn replace_order_items(
        &self,
        order_id: i64,
        items: &[NewOrderItem],
    ) -> Result<usize, DbError> {
        let mut state = self.lock();
        state.check(FailPoint::ReplaceOrderItems, "replace_order_items")?;
        if !state.orders.iter().any(|o| o.id == order_id) {
            return Err(DbError::NotFound);
        }

        let mut stored: Vec<&OrderItemRow> = state
            .order_items
            .iter()
            .filter(|i| i.order_id == order_id)
            .collect();
        stored.sort_by_key(|i| i.position);
        let unchanged = stored.len() == items.len()
            && stored.iter().zip(items).all(|(s, n)| {
                s.product_id == n.product_id
                    && s.title == n.title
                    && s.quantity == n.quantity
                    && s.price == money(n.price)
            });
        if unchanged {
            return Ok(items.len());
        }

        state.order_items.retain(|i| i.order_id != order_id);
        let now = Utc::now();
        for (position, item) in (0_i32..).zip(items) {
            let id = state.id();
            state.order_items.push(OrderItemRow {
                id,
                order_id,
                product_id: item.product_id,
                position,
                title: item.title.clone(),
                quantity: item.quantity,
                price: money(item.price),
                created_at: now,
            });
        }
        Ok(items.len())
    }

    async fn recompute_customer_total(&self, customer_id: i64) -> Result<Decimal, DbError> {
        let mut state = self.lock();
        state.check(FailPoint::RecomputeCustomerTotal, "recompute_customer_total")?;

        let total = money(
            state
                .orders
                .iter()
                .filter(|o| o.customer_id == Some(customer_id) && is_settled_status(&o.status))
                .map(|o| o.total_price)
                .sum(),
        );

        let customer = state
            .customers
            .iter_mut()
            .find(|c| c.id == customer_id)
            .ok_or(DbError::NotFound)?;
        let changed = customer.total_spent != total;
        customer.total_spent = total;
        touch(&mut customer.updated_at, changed, Utc::now());
        Ok(total)
    }

    async fn list_customer_ids(&self, tenant_id: i64) -> Result<Vec<i64>, DbError> {
        let mut ids: Vec<i64> = self
            .lock()
            .customers
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .map(|c| c.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn insert_event(
        &self,
        tenant_id: i64,
        event_type: &str,
        payload: &Value,
    ) -> Result<(), DbError> {
        let mut state = self.lock();
        let id = state.id();
        state.events.push(EventRow {
            id,
            tenant_id,
            event_type: event_type.to_string(),
            payload: payload.clone(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn upsert_location(
        &self,
        tenant_id: i64,
        location: &LocationRecord,
    ) -> Result<i64, DbError> {
        let mut state = self.lock();
        state.check(FailPoint::UpsertLocation, "upsert_location")?;
        let now = Utc::now();

        if let Some(row) = state.locations.iter_mut().find(|l| {
            l.tenant_id == tenant_id && l.external_location_id == location.external_id
        }) {
            let changed = row.name != location.name;
            row.name.clone_from(&location.name);
            touch(&mut row.updated_at, changed, now);
            return Ok(row.id);
        }

        let id = state.id();
        state.locations.push(LocationRow {
            id,
            tenant_id,
            external_location_id: location.external_id.clone(),
            name: location.name.clone(),
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn upsert_inventory_level(
        &self,
        tenant_id: i64,
        location_id: i64,
        level: &InventoryLevelRecord,
    ) -> Result<(), DbError> {
        let mut state = self.lock();
        let now = Utc::now();

        if let Some(row) = state.inventory_levels.iter_mut().find(|i| {
            i.tenant_id == tenant_id
                && i.location_id == location_id
                && i.external_inventory_item_id == level.external_inventory_item_id
        }) {
            let changed = row.available != level.available;
            row.available = level.available;
            touch(&mut row.updated_at, changed, now);
            return Ok(());
        }

        let id = state.id();
        state.inventory_levels.push(InventoryLevelRow {
            id,
            tenant_id,
            location_id,
            external_inventory_item_id: level.external_inventory_item_id.clone(),
            available: level.available,
            created_at: now,
            updated_at: now,
        });
        Ok(())
    }
}

impl SyncLedger for MemoryStore {
    async fn list_active_tenants(&self) -> Result<Vec<TenantRow>, DbError> {
        Ok(self
            .lock()
            .tenants
            .iter()
            .filter(|t| t.is_active)
            .cloned()
            .collect())
    }

    async fn create_sync_run(
        &self,
        tenant_id: i64,
        trigger_source: &str,
    ) -> Result<SyncRunRow, DbError> {
        let mut state = self.lock();
        let row = SyncRunRow {
            id: state.id(),
            public_id: Uuid::new_v4(),
            tenant_id,
            trigger_source: trigger_source.to_string(),
            status: "queued".to_string(),
            started_at: None,
            completed_at: None,
            customers_processed: 0,
            products_processed: 0,
            orders_processed: 0,
            locations_processed: 0,
            inventory_levels_processed: 0,
            error_message: None,
            created_at: Utc::now(),
        };
        state.sync_runs.push(row.clone());
        Ok(row)
    }

    async fn start_sync_run(&self, id: i64) -> Result<(), DbError> {
        let mut state = self.lock();
        let run = state
            .sync_runs
            .iter_mut()
            .find(|r| r.id == id && r.status == "queued")
            .ok_or(DbError::InvalidSyncRunTransition {
                id,
                expected_status: "queued",
            })?;
        run.status = "running".to_string();
        run.started_at = Some(Utc::now());
        Ok(())
    }

    async fn complete_sync_run(&self, id: i64, counts: SyncCounts) -> Result<(), DbError> {
        self.settle_run(id, "succeeded", counts, None)
    }

    async fn fail_sync_run(
        &self,
        id: i64,
        counts: SyncCounts,
        error_message: &str,
    ) -> Result<(), DbError> {
        self.settle_run(id, "failed", counts, Some(error_message))
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
