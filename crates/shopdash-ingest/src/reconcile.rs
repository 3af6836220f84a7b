//! Idempotent merge of raw Shopify payloads into a tenant's stored state.
//!
//! Payloads are normalized into canonical records first; everything here
//! works on those records and the [`CommerceStore`] seam only.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::Value;
use shopdash_core::{
    normalize_customer, normalize_inventory_level, normalize_location, normalize_order,
    normalize_product, CustomerRecord, LineItemRecord,
};
use shopdash_db::{CommerceStore, CustomerRow, NewOrderItem, OrderRow, ProductRow};

use crate::error::IngestError;

/// Title stored for a line item whose payload carries none.
pub const UNKNOWN_ITEM_TITLE: &str = "Unknown Item";

/// Order merge steps that may fail without undoing the order upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePhase {
    LineItems,
    CustomerTotal,
}

/// Result of [`Reconciler::merge_order`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderMerge {
    pub order: OrderRow,
    /// Items attached after the merge; `None` when the payload had no line
    /// items or replacing them failed.
    pub items_written: Option<usize>,
    /// Recomputed aggregate of the linked customer, when there is one and
    /// the recompute succeeded.
    pub customer_total: Option<Decimal>,
    /// Phases that failed after the order row was written. The next merge of
    /// the same order repairs them.
    pub failed_phases: Vec<MergePhase>,
}

impl OrderMerge {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed_phases.is_empty()
    }
}

/// A stored location and the Shopify id its inventory is listed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedLocation {
    pub id: i64,
    pub external_id: String,
}

/// Reconciliation engine over a [`CommerceStore`].
pub struct Reconciler<S> {
    store: Arc<S>,
}

impl<S> Clone for Reconciler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: CommerceStore> Reconciler<S> {
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Upserts a customer payload.
    ///
    /// # Errors
    ///
    /// [`IngestError::Normalize`] when the payload has no id, or
    /// [`IngestError::Db`] when the upsert fails.
    pub async fn merge_customer(
        &self,
        tenant_id: i64,
        payload: &Value,
    ) -> Result<CustomerRow, IngestError> {
        let record = normalize_customer(payload)?;
        self.upsert_customer(tenant_id, &record).await
    }

    async fn upsert_customer(
        &self,
        tenant_id: i64,
        record: &CustomerRecord,
    ) -> Result<CustomerRow, IngestError> {
        let row = self.store.upsert_customer(tenant_id, record).await?;
        tracing::debug!(
            tenant_id,
            customer_id = row.id,
            external_id = %record.external_id,
            "merged customer"
        );
        Ok(row)
    }

    /// Upserts a product payload.
    ///
    /// # Errors
    ///
    /// [`IngestError::Normalize`] when the payload has no id, or
    /// [`IngestError::Db`] when the upsert fails.
    pub async fn merge_product(
        &self,
        tenant_id: i64,
        payload: &Value,
    ) -> Result<ProductRow, IngestError> {
        let record = normalize_product(payload)?;
        let row = self.store.upsert_product(tenant_id, &record).await?;
        tracing::debug!(
            tenant_id,
            product_id = row.id,
            external_id = %record.external_id,
            "merged product"
        );
        Ok(row)
    }

    /// Merges an order and everything hanging off it.
    ///
    /// 1. the embedded customer is merged and linked, if present;
    /// 2. the order row is upserted;
    /// 3. a non-empty `line_items` list replaces every stored item;
    /// 4. the linked customer's `total_spent` is recomputed from scratch,
    ///    and so is the previous owner's when the order changed hands.
    ///
    /// Steps 3 and 4 fail forward: their errors are logged and reported in
    /// [`OrderMerge::failed_phases`] while the order row stays written.
    ///
    /// # Errors
    ///
    /// [`IngestError::Normalize`] for a payload (or embedded customer)
    /// without an id; [`IngestError::Db`] when steps 1 or 2 fail.
    pub async fn merge_order(
        &self,
        tenant_id: i64,
        payload: &Value,
    ) -> Result<OrderMerge, IngestError> {
        let record = normalize_order(payload)?;

        let customer_id = match &record.customer {
            Some(customer) => Some(self.upsert_customer(tenant_id, customer).await?.id),
            None => None,
        };

        let upsert = self
            .store
            .upsert_order(tenant_id, &record, customer_id)
            .await?;
        let order = upsert.order;
        let mut failed_phases = Vec::new();

        let items_written = match &record.line_items {
            Some(line_items) => match self.replace_items(tenant_id, &order, line_items).await {
                Ok(count) => Some(count),
                Err(err) => {
                    tracing::error!(
                        tenant_id,
                        order_id = order.id,
                        error = %err,
                        "line item replacement failed; keeping previous items"
                    );
                    failed_phases.push(MergePhase::LineItems);
                    None
                }
            },
            None => None,
        };

        let mut customer_total = None;
        let mut to_recompute: Vec<i64> = customer_id.into_iter().collect();
        if let Some(previous) = upsert.previous_customer_id {
            if Some(previous) != customer_id {
                to_recompute.push(previous);
            }
        }
        for id in to_recompute {
            match self.store.recompute_customer_total(id).await {
                Ok(total) if Some(id) == customer_id => customer_total = Some(total),
                Ok(_) => {}
                Err(err) => {
                    tracing::error!(
                        tenant_id,
                        order_id = order.id,
                        customer_id = id,
                        error = %err,
                        "customer total recompute failed"
                    );
                    if !failed_phases.contains(&MergePhase::CustomerTotal) {
                        failed_phases.push(MergePhase::CustomerTotal);
                    }
                }
            }
        }

        tracing::debug!(
            tenant_id,
            order_id = order.id,
            external_id = %order.external_order_id,
            ?customer_id,
            "merged order"
        );

        Ok(OrderMerge {
            order,
            items_written,
            customer_total,
            failed_phases,
        })
    }

    async fn replace_items(
        &self,
        tenant_id: i64,
        order: &OrderRow,
        line_items: &[LineItemRecord],
    ) -> Result<usize, IngestError> {
        let mut items = Vec::with_capacity(line_items.len());
        for line in line_items {
            let Some(external_product_id) = line.external_product_id.as_deref() else {
                tracing::debug!(
                    tenant_id,
                    order_id = order.id,
                    "skipping line item without product_id"
                );
                continue;
            };

            let product_id = self
                .store
                .find_product_id(tenant_id, external_product_id)
                .await?;
            let title = match (&line.title, product_id) {
                (Some(title), _) => title.clone(),
                (None, Some(_)) => UNKNOWN_ITEM_TITLE.to_owned(),
                (None, None) => {
                    tracing::warn!(
                        tenant_id,
                        order_id = order.id,
                        external_product_id,
                        "line item has neither a known product nor a title"
                    );
                    UNKNOWN_ITEM_TITLE.to_owned()
                }
            };

            items.push(NewOrderItem {
                product_id,
                title,
                quantity: line.quantity,
                price: line.price,
            });
        }

        Ok(self.store.replace_order_items(order.id, &items).await?)
    }

    /// Upserts a location payload.
    ///
    /// # Errors
    ///
    /// [`IngestError::Normalize`] or [`IngestError::Db`].
    pub async fn merge_location(
        &self,
        tenant_id: i64,
        payload: &Value,
    ) -> Result<MergedLocation, IngestError> {
        let record = normalize_location(payload)?;
        let id = self.store.upsert_location(tenant_id, &record).await?;
        Ok(MergedLocation {
            id,
            external_id: record.external_id,
        })
    }

    /// Upserts one inventory level of a local location.
    ///
    /// # Errors
    ///
    /// [`IngestError::Normalize`] or [`IngestError::Db`].
    pub async fn merge_inventory_level(
        &self,
        tenant_id: i64,
        location_id: i64,
        payload: &Value,
    ) -> Result<(), IngestError> {
        let record = normalize_inventory_level(payload)?;
        self.store
            .upsert_inventory_level(tenant_id, location_id, &record)
            .await?;
        Ok(())
    }

    /// Appends an activity event for the tenant.
    ///
    /// # Errors
    ///
    /// [`IngestError::Db`] when the insert fails.
    pub async fn record_event(
        &self,
        tenant_id: i64,
        event_type: &str,
        payload: &Value,
    ) -> Result<(), IngestError> {
        self.store
            .insert_event(tenant_id, event_type, payload)
            .await?;
        Ok(())
    }

    /// Recomputes `total_spent` for every customer of the tenant.
    ///
    /// Returns how many customers were recomputed. Individual failures are
    /// logged and skipped.
    ///
    /// # Errors
    ///
    /// [`IngestError::Db`] when the customer list cannot be read.
    pub async fn recompute_all_totals(&self, tenant_id: i64) -> Result<usize, IngestError> {
        let ids = self.store.list_customer_ids(tenant_id).await?;
        let mut recomputed = 0usize;
        for id in ids {
            match self.store.recompute_customer_total(id).await {
                Ok(_) => recomputed += 1,
                Err(err) => tracing::warn!(
                    tenant_id,
                    customer_id = id,
                    error = %err,
                    "skipping customer total recompute"
                ),
            }
        }
        tracing::info!(tenant_id, recomputed, "recomputed customer totals");
        Ok(recomputed)
    }
}

#[cfg(test)]
#[path = "reconcile_test.rs"]
mod tests;
