//! Short-horizon suppression of redelivered webhook event ids.
//!
//! Best-effort and process-local: it absorbs Shopify's retry bursts, while
//! idempotent merges keep state correct for anything that slips through.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Set of recently seen event ids, each evicted by its own timer.
///
/// Cheap to clone; clones share the set. Must be used inside a Tokio
/// runtime because eviction runs on spawned tasks.
#[derive(Debug, Clone)]
pub struct DuplicateSuppressor {
    seen: Arc<Mutex<HashSet<String>>>,
    window: Duration,
}

impl Default for DuplicateSuppressor {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl DuplicateSuppressor {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            seen: Arc::new(Mutex::new(HashSet::new())),
            window,
        }
    }

    /// `true` when the event should be processed.
    ///
    /// The first sighting of an id records it for the window and returns
    /// `true`; repeats within the window return `false`. Events without an
    /// id cannot be deduplicated and always return `true`.
    #[must_use]
    pub fn should_process(&self, event_id: Option<&str>) -> bool {
        let Some(event_id) = event_id.filter(|id| !id.is_empty()) else {
            return true;
        };

        let inserted = self
            .seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(event_id.to_owned());
        if !inserted {
            tracing::info!(event_id, "duplicate webhook event, skipping");
            return false;
        }

        let seen = Arc::clone(&self.seen);
        let window = self.window;
        let event_id = event_id.to_owned();
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            seen.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&event_id);
        });
        true
    }

    /// Drops an id recorded by [`Self::should_process`] so a redelivery is
    /// processed again. Used when the event could not be handed off.
    pub fn forget(&self, event_id: &str) {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(event_id);
    }

    /// Number of ids currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn repeat_within_window_is_suppressed() {
        let dedupe = DuplicateSuppressor::new(Duration::from_secs(60));
        assert!(dedupe.should_process(Some("evt-1")));
        assert!(!dedupe.should_process(Some("evt-1")));
        assert!(dedupe.should_process(Some("evt-2")));
        assert_eq!(dedupe.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn id_is_forgotten_after_window() {
        let dedupe = DuplicateSuppressor::new(Duration::from_secs(60));
        assert!(dedupe.should_process(Some("evt-1")));

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(!dedupe.should_process(Some("evt-1")));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(dedupe.is_empty());
        assert!(dedupe.should_process(Some("evt-1")));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_id_always_processes() {
        let dedupe = DuplicateSuppressor::default();
        assert!(dedupe.should_process(None));
        assert!(dedupe.should_process(None));
        assert!(dedupe.should_process(Some("")));
        assert!(dedupe.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn forgotten_id_is_processed_again() {
        let dedupe = DuplicateSuppressor::default();
        assert!(dedupe.should_process(Some("evt-7")));
        dedupe.forget("evt-7");
        assert!(dedupe.is_empty());
        assert!(dedupe.should_process(Some("evt-7")));
        assert!(!dedupe.should_process(Some("evt-7")));
    }

    #[tokio::test(start_paused = true)]
    async fn clones_share_the_set() {
        let a = DuplicateSuppressor::default();
        let b = a.clone();
        assert!(a.should_process(Some("evt-9")));
        assert!(!b.should_process(Some("evt-9")));
    }
}
