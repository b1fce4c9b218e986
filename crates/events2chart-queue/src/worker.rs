//! Queue worker: drains the queue into the analytics backend.

use std::sync::Arc;
use std::time::Duration;

use events2chart_analytics::AnalyticsBackend;
use events2chart_core::{ItemKey, ItemStatus};
use events2chart_store::QueueStore;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::QueueError;
use crate::forwarding::forwarded_payload;

/// Worker tuning knobs.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Claim owner identifier recorded on every item this worker claims.
    pub owner_id: String,
    /// Upper bound on delivery attempts before an item is left `failed`
    /// for operator inspection.
    pub max_attempts: u32,
    /// Sleep when the queue is empty.
    pub idle_backoff: Duration,
    /// Payload field carrying the ISO-8601 event time at the backend.
    pub timestamp_field: String,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            owner_id: format!("worker-{}", Uuid::new_v4().simple()),
            max_attempts: 5,
            idle_backoff: Duration::from_millis(500),
            timestamp_field: "timestamp".to_string(),
        }
    }
}

/// What `process_one` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Item forwarded, acknowledged, and removed from the queue.
    Forwarded(ItemKey),
    /// Transient backend failure; item requeued for another attempt.
    Requeued(ItemKey),
    /// Item left `failed` (rejection or attempts exhausted).
    Failed(ItemKey),
    /// Nothing claimable right now.
    Idle,
}

/// Forwards claimed work items to the analytics backend.
///
/// Multiple workers may run against the same store: claiming is
/// compare-and-swap protected, and there is no shared in-process state
/// between workers.
pub struct QueueWorker<S: ?Sized, B: ?Sized> {
    store: Arc<S>,
    backend: Arc<B>,
    settings: WorkerSettings,
}

impl<S, B> QueueWorker<S, B>
where
    S: QueueStore + ?Sized,
    B: AnalyticsBackend + ?Sized,
{
    pub fn new(store: Arc<S>, backend: Arc<B>, settings: WorkerSettings) -> Self {
        Self {
            store,
            backend,
            settings,
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.settings.owner_id
    }

    /// Claim and forward one item.
    ///
    /// Delivery is at-least-once: a crash between backend acknowledgment
    /// and queue removal re-forwards the item on recovery. That duplicate
    /// is an accepted trade-off, not a bug; deduplication would require an
    /// idempotency key on the backend side.
    pub async fn process_one(&self) -> Result<ProcessOutcome, QueueError> {
        let Some(item) = self.store.claim(&self.settings.owner_id).await? else {
            return Ok(ProcessOutcome::Idle);
        };
        let key = item.key;

        if !self
            .store
            .advance(key, ItemStatus::Claimed, ItemStatus::Processing)
            .await?
        {
            // The reaper got there first; the item is back in the pool.
            debug!(item_key = key, "claim lost before processing");
            return Ok(ProcessOutcome::Idle);
        }

        let payload = forwarded_payload(&item, &self.settings.timestamp_field);
        match self.backend.record_event(&item.event_type, &payload).await {
            Ok(()) => {
                self.store
                    .advance(key, ItemStatus::Processing, ItemStatus::Succeeded)
                    .await?;
                self.store.remove(key).await?;
                info!(
                    item_key = key,
                    event_type = %item.event_type,
                    owner = %self.settings.owner_id,
                    "event forwarded"
                );
                Ok(ProcessOutcome::Forwarded(key))
            }
            Err(err) => {
                // Exactly one transition per failed cycle, so the attempt
                // count equals the number of delivery attempts made.
                let attempts = item.attempts + 1;
                if err.is_transient() && attempts < self.settings.max_attempts {
                    self.store.release(key, ItemStatus::Processing).await?;
                    warn!(
                        item_key = key,
                        attempts,
                        error = %err,
                        "transient forward failure, item requeued"
                    );
                    Ok(ProcessOutcome::Requeued(key))
                } else {
                    self.store
                        .fail(key, ItemStatus::Processing, &err.to_string())
                        .await?;
                    warn!(
                        item_key = key,
                        attempts,
                        error = %err,
                        "item left failed for operator inspection"
                    );
                    Ok(ProcessOutcome::Failed(key))
                }
            }
        }
    }

    /// Drain loop: process items until shutdown.
    ///
    /// A store error is logged and retried after the idle backoff; no
    /// single failed item or hiccup halts subsequent processing.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(owner = %self.settings.owner_id, "queue worker started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            let idle = match self.process_one().await {
                Ok(ProcessOutcome::Idle) => true,
                Ok(_) => false,
                Err(err) => {
                    error!(error = %err, "queue worker store error");
                    true
                }
            };
            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.settings.idle_backoff) => {}
                    _ = shutdown.changed() => break,
                }
            }
        }
        info!(owner = %self.settings.owner_id, "queue worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use events2chart_analytics::{AggregateQuery, BackendError, MemoryBackend};
    use events2chart_core::GroupValue;
    use events2chart_store::MemoryStore;
    use parking_lot::Mutex;

    fn settings(max_attempts: u32) -> WorkerSettings {
        WorkerSettings {
            owner_id: "worker-test".to_string(),
            max_attempts,
            idle_backoff: Duration::from_millis(1),
            timestamp_field: "timestamp".to_string(),
        }
    }

    async fn seed(store: &MemoryStore) -> events2chart_core::ItemKey {
        let payload = serde_json::json!({
            "customer": { "gender": "Female" },
            "cost": 10.0,
        });
        let serde_json::Value::Object(map) = payload else {
            unreachable!()
        };
        store.append("Purchases", map, chrono::Utc::now()).await.unwrap()
    }

    #[tokio::test]
    async fn forwarded_item_is_removed_and_backend_sees_clean_payload() {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(MemoryBackend::new("timestamp"));
        let key = seed(&store).await;

        let worker = QueueWorker::new(Arc::clone(&store), Arc::clone(&backend), settings(3));
        let outcome = worker.process_one().await.unwrap();
        assert_eq!(outcome, ProcessOutcome::Forwarded(key));

        assert!(store.get(key).await.unwrap().is_none());
        let recorded = backend.recorded_payloads("Purchases");
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].get("timestamp").is_some());
        assert!(recorded[0].get("event_type").is_none());
    }

    /// Backend that always fails, with a switchable error kind.
    struct FailingBackend {
        transient: Mutex<bool>,
    }

    #[async_trait]
    impl events2chart_analytics::AnalyticsBackend for FailingBackend {
        async fn record_event(
            &self,
            _event_type: &str,
            _payload: &serde_json::Value,
        ) -> Result<(), BackendError> {
            if *self.transient.lock() {
                Err(BackendError::Transient("connection refused".to_string()))
            } else {
                Err(BackendError::Rejected("malformed payload".to_string()))
            }
        }

        async fn aggregate(
            &self,
            _query: &AggregateQuery,
        ) -> Result<Vec<GroupValue>, BackendError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn transient_failures_requeue_until_attempts_run_out() {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(FailingBackend {
            transient: Mutex::new(true),
        });
        let key = seed(&store).await;

        let worker = QueueWorker::new(Arc::clone(&store), backend, settings(3));

        assert_eq!(worker.process_one().await.unwrap(), ProcessOutcome::Requeued(key));
        assert_eq!(worker.process_one().await.unwrap(), ProcessOutcome::Requeued(key));
        // Third attempt hits the bound and stays failed.
        assert_eq!(worker.process_one().await.unwrap(), ProcessOutcome::Failed(key));

        let item = store.get(key).await.unwrap().unwrap();
        assert_eq!(item.status, events2chart_core::ItemStatus::Failed);
        assert_eq!(item.attempts, 3);
        assert!(item.last_error.as_deref().unwrap().contains("connection refused"));

        // Nothing left to claim.
        assert_eq!(worker.process_one().await.unwrap(), ProcessOutcome::Idle);
    }

    #[tokio::test]
    async fn rejections_are_never_retried() {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(FailingBackend {
            transient: Mutex::new(false),
        });
        let key = seed(&store).await;

        let worker = QueueWorker::new(Arc::clone(&store), backend, settings(5));
        assert_eq!(worker.process_one().await.unwrap(), ProcessOutcome::Failed(key));

        let item = store.get(key).await.unwrap().unwrap();
        assert_eq!(item.status, events2chart_core::ItemStatus::Failed);
        assert_eq!(item.attempts, 1);
    }

    #[tokio::test]
    async fn empty_queue_is_idle() {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(MemoryBackend::new("timestamp"));
        let worker = QueueWorker::new(store, backend, settings(3));
        assert_eq!(worker.process_one().await.unwrap(), ProcessOutcome::Idle);
    }
}
