//! Webhook and bulk-sync ingestion into per-tenant commerce state.

pub mod dedupe;
pub mod error;
pub mod queue;
pub mod reconcile;
pub mod signature;
pub mod sync;

pub use dedupe::DuplicateSuppressor;
pub use error::IngestError;
pub use queue::{IngestionQueue, JobHandler, JobOutcome, TopicRoute, WebhookJob};
pub use reconcile::{MergePhase, MergedLocation, OrderMerge, Reconciler, UNKNOWN_ITEM_TITLE};
pub use signature::{sign, verify, SignatureCheck, WebhookVerifier};
pub use sync::{SyncOrchestrator, SyncSummary, TriggerSource};
