//! Manual bulk sync and aggregate recompute.

use std::sync::Arc;

use shopdash_core::AppConfig;
use shopdash_db::PgStore;
use shopdash_ingest::{Reconciler, SyncOrchestrator, TriggerSource};

/// Syncs one tenant, or every active tenant when `tenant` is `None`.
///
/// # Errors
///
/// Returns an error if the tenant is unknown, its sync fails, or any tenant
/// of an all-tenant run fails.
pub(crate) async fn run_sync(
    pool: sqlx::PgPool,
    config: &AppConfig,
    tenant: Option<&str>,
) -> anyhow::Result<()> {
    let reconciler = Reconciler::new(Arc::new(PgStore::new(pool.clone())));
    let client = Arc::new(crate::shopify_client(config)?);
    let orchestrator = SyncOrchestrator::new(reconciler, client, config.shopify_page_size);

    if let Some(domain) = tenant {
        let tenant = crate::require_tenant(&pool, domain).await?;
        let summary = orchestrator.sync_tenant(&tenant, TriggerSource::Cli).await?;
        println!("{domain}: {summary}");
        if !summary.skipped.is_empty() {
            println!("  skipped: {}", summary.skipped.join(", "));
        }
        return Ok(());
    }

    let results = orchestrator.sync_all_active(TriggerSource::Cli).await?;
    if results.is_empty() {
        println!("no active tenants to sync");
        return Ok(());
    }

    let mut failed = 0_usize;
    for (domain, result) in &results {
        match result {
            Ok(summary) => println!("{domain}: {summary}"),
            Err(e) => {
                failed += 1;
                println!("{domain}: FAILED: {e}");
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} tenant syncs failed", results.len());
    }
    Ok(())
}

/// Recomputes `total_spent` for every customer of one or all active tenants.
///
/// # Errors
///
/// Returns an error if the tenant is unknown or a recompute fails.
pub(crate) async fn run_recalc_totals(
    pool: sqlx::PgPool,
    tenant: Option<&str>,
) -> anyhow::Result<()> {
    let tenants = match tenant {
        Some(domain) => vec![crate::require_tenant(&pool, domain).await?],
        None => shopdash_db::list_active_tenants(&pool).await?,
    };
    let reconciler = Reconciler::new(Arc::new(PgStore::new(pool)));

    for tenant in &tenants {
        let count = reconciler.recompute_all_totals(tenant.id).await?;
        println!("{}: recomputed {count} customer total(s)", tenant.shop_domain);
    }
    Ok(())
}
