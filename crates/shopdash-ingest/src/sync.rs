//! Bulk sync: pull every collection of a store through the reconciler.
//!
//! Resources are walked one page at a time in a fixed order (customers,
//! products, orders, then locations and their inventory) so orders find
//! their products already stored. A failing resource is logged and skipped;
//! the run still settles as succeeded with whatever was processed.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use shopdash_db::{CommerceStore, SyncCounts, SyncLedger, TenantRow};
use shopdash_shopify::{Resource, ShopCredentials, ShopifyClient, ShopifyError, MAX_PAGES};

use crate::error::IngestError;
use crate::reconcile::Reconciler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    Manual,
    Scheduled,
    Cli,
}

impl TriggerSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
            Self::Cli => "cli",
        }
    }
}

/// Outcome of one tenant's sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    pub sync_run_id: i64,
    pub shop_domain: String,
    pub counts: SyncCounts,
    /// Resources that could not be fetched this run.
    pub skipped: Vec<&'static str>,
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.counts;
        write!(
            f,
            "Sync Complete: {} Customers, {} Products, {} Orders, {} Locations, {} Inventory Levels.",
            c.customers, c.products, c.orders, c.locations, c.inventory_levels
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum CoreResource {
    Customers,
    Products,
    Orders,
}

impl CoreResource {
    fn resource(self) -> Resource {
        match self {
            Self::Customers => Resource::customers(),
            Self::Products => Resource::products(),
            Self::Orders => Resource::orders(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Customers => "customers",
            Self::Products => "products",
            Self::Orders => "orders",
        }
    }

    fn counter(self, counts: &mut SyncCounts) -> &mut i32 {
        match self {
            Self::Customers => &mut counts.customers,
            Self::Products => &mut counts.products,
            Self::Orders => &mut counts.orders,
        }
    }
}

pub struct SyncOrchestrator<S> {
    reconciler: Reconciler<S>,
    client: Arc<ShopifyClient>,
    page_size: u32,
}

impl<S: CommerceStore + SyncLedger> SyncOrchestrator<S> {
    #[must_use]
    pub fn new(reconciler: Reconciler<S>, client: Arc<ShopifyClient>, page_size: u32) -> Self {
        Self {
            reconciler,
            client,
            page_size,
        }
    }

    /// Runs a full sync of one tenant and records it in the sync ledger.
    ///
    /// # Errors
    ///
    /// - [`IngestError::InactiveTenant`] for a deactivated tenant (no run is
    ///   recorded).
    /// - [`IngestError::MissingAccessToken`] when the tenant is not connected;
    ///   the run is recorded as failed.
    /// - [`IngestError::Db`] when the ledger itself cannot be written.
    pub async fn sync_tenant(
        &self,
        tenant: &TenantRow,
        trigger: TriggerSource,
    ) -> Result<SyncSummary, IngestError> {
        if !tenant.is_active {
            return Err(IngestError::InactiveTenant {
                shop_domain: tenant.shop_domain.clone(),
            });
        }

        let ledger = self.reconciler.store();
        let run = ledger.create_sync_run(tenant.id, trigger.as_str()).await?;
        ledger.start_sync_run(run.id).await?;
        tracing::info!(
            tenant_id = tenant.id,
            shop_domain = %tenant.shop_domain,
            sync_run_id = run.id,
            trigger = trigger.as_str(),
            "sync started"
        );

        let Some(access_token) = tenant.access_token.as_deref().filter(|t| !t.is_empty()) else {
            let err = IngestError::MissingAccessToken {
                shop_domain: tenant.shop_domain.clone(),
            };
            ledger
                .fail_sync_run(run.id, SyncCounts::default(), &err.to_string())
                .await?;
            tracing::error!(sync_run_id = run.id, error = %err, "sync failed");
            return Err(err);
        };
        let shop = ShopCredentials {
            shop_domain: &tenant.shop_domain,
            access_token,
        };

        let mut counts = SyncCounts::default();
        let mut skipped = Vec::new();

        for kind in [
            CoreResource::Customers,
            CoreResource::Products,
            CoreResource::Orders,
        ] {
            if let Err(err) = self.sync_core(tenant.id, shop, kind, &mut counts).await {
                tracing::error!(
                    tenant_id = tenant.id,
                    resource = kind.name(),
                    error = %err,
                    "resource fetch failed; skipping"
                );
                skipped.push(kind.name());
            }
        }

        if let Err(err) = self.sync_locations(tenant.id, shop, &mut counts).await {
            if err.is_access_denied() {
                tracing::info!(
                    tenant_id = tenant.id,
                    error = %err,
                    "skipping locations (scope missing?)"
                );
            } else {
                tracing::warn!(tenant_id = tenant.id, error = %err, "locations fetch failed; skipping");
            }
            skipped.push("locations");
        }

        ledger.complete_sync_run(run.id, counts).await?;

        let summary = SyncSummary {
            sync_run_id: run.id,
            shop_domain: tenant.shop_domain.clone(),
            counts,
            skipped,
        };
        tracing::info!(
            tenant_id = tenant.id,
            sync_run_id = run.id,
            skipped = ?summary.skipped,
            "{summary}"
        );
        Ok(summary)
    }

    /// Syncs every active tenant, one after another.
    ///
    /// A failing tenant is logged and does not stop the rest.
    ///
    /// # Errors
    ///
    /// [`IngestError::Db`] only when the tenant list cannot be read.
    pub async fn sync_all_active(
        &self,
        trigger: TriggerSource,
    ) -> Result<Vec<(String, Result<SyncSummary, IngestError>)>, IngestError> {
        let tenants = self.reconciler.store().list_active_tenants().await?;
        let mut results = Vec::with_capacity(tenants.len());

        for tenant in &tenants {
            let result = self.sync_tenant(tenant, trigger).await;
            if let Err(err) = &result {
                tracing::error!(
                    tenant_id = tenant.id,
                    shop_domain = %tenant.shop_domain,
                    error = %err,
                    "tenant sync failed"
                );
            }
            results.push((tenant.shop_domain.clone(), result));
        }

        Ok(results)
    }

    /// Walks one core resource page by page, merging as it goes.
    ///
    /// Records that fail to normalize or merge are logged and skipped.
    async fn sync_core(
        &self,
        tenant_id: i64,
        shop: ShopCredentials<'_>,
        kind: CoreResource,
        counts: &mut SyncCounts,
    ) -> Result<(), ShopifyError> {
        let resource = kind.resource();
        let mut cursor: Option<String> = None;
        let mut page_count = 0usize;

        loop {
            page_count += 1;
            if page_count > MAX_PAGES {
                return Err(ShopifyError::PaginationLimit {
                    resource: kind.name().to_owned(),
                    max_pages: MAX_PAGES,
                });
            }

            let page = self
                .client
                .fetch_page(shop, &resource, self.page_size, cursor.as_deref())
                .await?;

            for payload in &page.records {
                match self.merge_core(tenant_id, kind, payload).await {
                    Ok(()) => {
                        let counter = kind.counter(counts);
                        *counter = counter.saturating_add(1);
                    }
                    Err(err) => {
                        let external_id = payload.get("id").unwrap_or(&Value::Null);
                        tracing::warn!(
                            tenant_id,
                            resource = kind.name(),
                            external_id = %external_id,
                            error = %err,
                            "skipping record"
                        );
                    }
                }
            }

            cursor = page.next_cursor;
            if cursor.is_none() {
                return Ok(());
            }
        }
    }

    async fn merge_core(
        &self,
        tenant_id: i64,
        kind: CoreResource,
        payload: &Value,
    ) -> Result<(), IngestError> {
        match kind {
            CoreResource::Customers => {
                self.reconciler.merge_customer(tenant_id, payload).await?;
            }
            CoreResource::Products => {
                self.reconciler.merge_product(tenant_id, payload).await?;
            }
            CoreResource::Orders => {
                let merged = self.reconciler.merge_order(tenant_id, payload).await?;
                if !merged.is_complete() {
                    tracing::warn!(
                        tenant_id,
                        order_id = merged.order.id,
                        failed = ?merged.failed_phases,
                        "order merged partially"
                    );
                }
            }
        }
        Ok(())
    }

    /// Locations, then the inventory levels of each. A location whose
    /// inventory cannot be fetched keeps its row and is otherwise skipped.
    async fn sync_locations(
        &self,
        tenant_id: i64,
        shop: ShopCredentials<'_>,
        counts: &mut SyncCounts,
    ) -> Result<(), ShopifyError> {
        let locations = self
            .client
            .fetch_all(shop, &Resource::locations(), self.page_size)
            .await?;

        for payload in &locations {
            let location = match self.reconciler.merge_location(tenant_id, payload).await {
                Ok(location) => location,
                Err(err) => {
                    tracing::warn!(tenant_id, error = %err, "skipping location");
                    continue;
                }
            };
            counts.locations = counts.locations.saturating_add(1);

            let levels = match self
                .client
                .fetch_all(
                    shop,
                    &Resource::inventory_levels(&location.external_id),
                    self.page_size,
                )
                .await
            {
                Ok(levels) => levels,
                Err(err) => {
                    tracing::warn!(
                        tenant_id,
                        location_id = location.id,
                        error = %err,
                        "skipping inventory levels"
                    );
                    continue;
                }
            };

            for level in &levels {
                match self
                    .reconciler
                    .merge_inventory_level(tenant_id, location.id, level)
                    .await
                {
                    Ok(()) => counts.inventory_levels = counts.inventory_levels.saturating_add(1),
                    Err(err) => {
                        tracing::warn!(tenant_id, error = %err, "skipping inventory level");
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_message_lists_every_count() {
        let summary = SyncSummary {
            sync_run_id: 1,
            shop_domain: "acme.myshopify.com".to_owned(),
            counts: SyncCounts {
                customers: 2,
                products: 3,
                orders: 4,
                locations: 1,
                inventory_levels: 5,
            },
            skipped: Vec::new(),
        };
        assert_eq!(
            summary.to_string(),
            "Sync Complete: 2 Customers, 3 Products, 4 Orders, 1 Locations, 5 Inventory Levels."
        );
    }

    #[test]
    fn trigger_sources_match_ledger_values() {
        assert_eq!(TriggerSource::Manual.as_str(), "manual");
        assert_eq!(TriggerSource::Scheduled.as_str(), "scheduled");
        assert_eq!(TriggerSource::Cli.as_str(), "cli");
    }
}
