//! Background job scheduler.
//!
//! Registers the periodic bulk sync of every active tenant.

use std::sync::Arc;

use shopdash_db::PgStore;
use shopdash_ingest::{SyncOrchestrator, TriggerSource};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the background job scheduler.
///
/// The returned [`JobScheduler`] must be kept alive for the lifetime of the
/// process; dropping it stops the jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// `sync_cron` does not parse, or the scheduler fails to start.
pub async fn build_scheduler(
    orchestrator: Arc<SyncOrchestrator<PgStore>>,
    sync_cron: &str,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    scheduler.add(sync_job(orchestrator, sync_cron)?).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Periodic sync of every active tenant, one after another.
fn sync_job(
    orchestrator: Arc<SyncOrchestrator<PgStore>>,
    sync_cron: &str,
) -> Result<Job, JobSchedulerError> {
    Job::new_async(sync_cron, move |_uuid, _lock| {
        let orchestrator = Arc::clone(&orchestrator);

        Box::pin(async move {
            tracing::info!("scheduler: starting periodic sync");
            match orchestrator.sync_all_active(TriggerSource::Scheduled).await {
                Ok(results) => {
                    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
                    tracing::info!(
                        tenants = results.len(),
                        failed,
                        "scheduler: periodic sync complete"
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "scheduler: failed to load active tenants");
                }
            }
        })
    })
}
