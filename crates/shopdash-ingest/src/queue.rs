//! Single-consumer FIFO queue between webhook receipt and reconciliation.
//!
//! Exactly one job is in flight at a time; the next starts only after the
//! current one settles. Failed jobs are logged and dropped: the periodic
//! bulk sync is what heals a lost webhook.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt as _;
use serde_json::Value;
use shopdash_db::CommerceStore;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::IngestError;
use crate::reconcile::Reconciler;

/// Event type recorded for `checkouts/*` topics.
pub const CHECKOUT_STARTED: &str = "CHECKOUT_STARTED";
/// Event type recorded when a job carries no topic at all.
pub const UNKNOWN_TOPIC: &str = "UNKNOWN";

/// A verified, deduplicated webhook delivery.
#[derive(Debug, Clone)]
pub struct WebhookJob {
    pub topic: String,
    pub shop_domain: String,
    pub event_id: Option<String>,
    pub payload: Value,
}

/// What a topic is dispatched to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicRoute {
    Customer,
    Product,
    Order,
    Checkout,
    /// Recorded as an activity event with this type.
    Event(String),
}

impl TopicRoute {
    /// Maps `resource/action` topics onto a route.
    ///
    /// `*/delete` topics become plain events: ingestion never deletes, and a
    /// delete payload carries nothing but the id.
    #[must_use]
    pub fn from_topic(topic: &str) -> Self {
        let topic = topic.trim();
        if topic.is_empty() {
            return Self::Event(UNKNOWN_TOPIC.to_owned());
        }

        let (resource, action) = topic.split_once('/').unwrap_or((topic, ""));
        if action == "delete" {
            return Self::Event(topic.to_owned());
        }
        match resource {
            "customers" => Self::Customer,
            "products" => Self::Product,
            "orders" => Self::Order,
            "checkouts" => Self::Checkout,
            _ => Self::Event(topic.to_owned()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Customer { id: i64 },
    Product { id: i64 },
    Order { id: i64, complete: bool },
    Event { event_type: String },
}

/// Processes one job. Implemented by [`Reconciler`].
pub trait JobHandler: Send + Sync + 'static {
    fn handle(
        &self,
        job: &WebhookJob,
    ) -> impl Future<Output = Result<JobOutcome, IngestError>> + Send;
}

impl<S: CommerceStore> JobHandler for Reconciler<S> {
    async fn handle(&self, job: &WebhookJob) -> Result<JobOutcome, IngestError> {
        let tenant = self
            .store()
            .find_tenant_by_domain(&job.shop_domain)
            .await?
            .ok_or_else(|| IngestError::UnknownTenant {
                shop_domain: job.shop_domain.clone(),
            })?;
        if !tenant.is_active {
            return Err(IngestError::InactiveTenant {
                shop_domain: job.shop_domain.clone(),
            });
        }

        match TopicRoute::from_topic(&job.topic) {
            TopicRoute::Customer => {
                let row = self.merge_customer(tenant.id, &job.payload).await?;
                Ok(JobOutcome::Customer { id: row.id })
            }
            TopicRoute::Product => {
                let row = self.merge_product(tenant.id, &job.payload).await?;
                Ok(JobOutcome::Product { id: row.id })
            }
            TopicRoute::Order => {
                let merged = self.merge_order(tenant.id, &job.payload).await?;
                Ok(JobOutcome::Order {
                    id: merged.order.id,
                    complete: merged.is_complete(),
                })
            }
            TopicRoute::Checkout => {
                self.record_event(tenant.id, CHECKOUT_STARTED, &job.payload)
                    .await?;
                Ok(JobOutcome::Event {
                    event_type: CHECKOUT_STARTED.to_owned(),
                })
            }
            TopicRoute::Event(event_type) => {
                self.record_event(tenant.id, &event_type, &job.payload)
                    .await?;
                Ok(JobOutcome::Event { event_type })
            }
        }
    }
}

enum Message {
    Job(WebhookJob),
    Shutdown,
}

/// Handle to the running queue. Clones share the same consumer.
#[derive(Clone)]
pub struct IngestionQueue {
    tx: mpsc::UnboundedSender<Message>,
    pending: Arc<AtomicUsize>,
    handled: Arc<AtomicUsize>,
    /// Held across every send so nothing is queued behind `Shutdown`.
    closed: Arc<Mutex<bool>>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl IngestionQueue {
    /// Spawns the consumer task. Must be called inside a Tokio runtime.
    #[must_use]
    pub fn start<H: JobHandler>(handler: H) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let handled = Arc::new(AtomicUsize::new(0));
        let worker = tokio::spawn(consume(
            handler,
            rx,
            Arc::clone(&pending),
            Arc::clone(&handled),
        ));
        Self {
            tx,
            pending,
            handled,
            closed: Arc::new(Mutex::new(false)),
            worker: Arc::new(Mutex::new(Some(worker))),
        }
    }

    /// Appends a job behind everything already queued.
    ///
    /// # Errors
    ///
    /// [`IngestError::QueueClosed`] once [`Self::shutdown`] has been called.
    pub fn enqueue(&self, job: WebhookJob) -> Result<(), IngestError> {
        let closed = self.closed.lock().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return Err(IngestError::QueueClosed);
        }
        tracing::debug!(topic = %job.topic, shop_domain = %job.shop_domain, "job queued");
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(Message::Job(job)).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(IngestError::QueueClosed);
        }
        Ok(())
    }

    /// Jobs queued or in flight.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Jobs the consumer has settled, whether they succeeded or not.
    #[must_use]
    pub fn handled(&self) -> usize {
        self.handled.load(Ordering::SeqCst)
    }

    /// Stops accepting jobs and waits for every queued job to settle.
    pub async fn shutdown(&self) {
        {
            let mut closed = self.closed.lock().unwrap_or_else(PoisonError::into_inner);
            if !*closed {
                *closed = true;
                // The consumer may already be gone; there is nothing left to drain then.
                let _ = self.tx.send(Message::Shutdown);
            }
        }

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if let Err(err) = worker.await {
                tracing::error!(error = %err, "ingestion queue consumer ended abnormally");
            }
        }
    }
}

async fn consume<H: JobHandler>(
    handler: H,
    mut rx: mpsc::UnboundedReceiver<Message>,
    pending: Arc<AtomicUsize>,
    handled: Arc<AtomicUsize>,
) {
    while let Some(message) = rx.recv().await {
        let job = match message {
            Message::Job(job) => job,
            Message::Shutdown => break,
        };

        match AssertUnwindSafe(handler.handle(&job)).catch_unwind().await {
            Ok(Ok(outcome)) => tracing::info!(
                topic = %job.topic,
                shop_domain = %job.shop_domain,
                ?outcome,
                "job completed"
            ),
            Ok(Err(err)) => tracing::error!(
                topic = %job.topic,
                shop_domain = %job.shop_domain,
                event_id = job.event_id.as_deref(),
                error = %err,
                "job failed; dropping"
            ),
            Err(_) => tracing::error!(
                topic = %job.topic,
                shop_domain = %job.shop_domain,
                "job panicked; dropping"
            ),
        }
        handled.fetch_add(1, Ordering::SeqCst);
        pending.fetch_sub(1, Ordering::SeqCst);
    }
    tracing::info!("ingestion queue stopped");
}

#[cfg(test)]
#[path = "queue_test.rs"]
mod tests;
