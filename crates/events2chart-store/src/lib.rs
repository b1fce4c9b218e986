// Shared synchronized store boundary.
//
// The store is the single source of truth for both pipeline stages: a queue
// partition of work items and a cache partition of append-only buckets,
// namespaced by metric. All mutation goes through its atomic primitives
// (append, compare-and-swap advance, remove); readers never mutate.
//
// Components receive a store handle at construction rather than reaching
// for a process-global, so tests can substitute fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use events2chart_core::{Bucket, ItemKey, ItemStatus, Payload, WorkItem};
use tokio::sync::broadcast;

mod error;
pub mod memory;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;

/// Durable queue partition: ordered, uniquely-keyed work items with atomic
/// per-item state transitions.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Append a new pending work item; the store assigns the key.
    async fn append(
        &self,
        event_type: &str,
        payload: Payload,
        created_at: DateTime<Utc>,
    ) -> Result<ItemKey>;

    /// Claim the oldest pending item for `owner`.
    ///
    /// Scans pending items oldest-first and compare-and-swaps
    /// `pending -> claimed`, stamping the owner and claim time. A lost swap
    /// silently moves on to the next candidate, so at most one concurrent
    /// claimant can win any given item. Returns `None` when nothing is
    /// claimable.
    async fn claim(&self, owner: &str) -> Result<Option<WorkItem>>;

    /// Compare-and-swap the item's status from `from` to `to`.
    ///
    /// Succeeds only if the current status equals `from` and the transition
    /// is allowed by the status lattice; refreshes `status_changed_at`.
    /// Returns `false` on a lost swap (expected control flow, not an error).
    async fn advance(&self, key: ItemKey, from: ItemStatus, to: ItemStatus) -> Result<bool>;

    /// Compare-and-swap to `failed`, recording the error text and
    /// incrementing the attempt count.
    async fn fail(&self, key: ItemKey, from: ItemStatus, error: &str) -> Result<bool>;

    /// Compare-and-swap back to `pending` (requeue), clearing the claim
    /// owner and incrementing the attempt count.
    async fn release(&self, key: ItemKey, from: ItemStatus) -> Result<bool>;

    /// Remove an item. Idempotent: removing an already-removed key is fine,
    /// a crashed worker may retry the removal after re-forwarding.
    async fn remove(&self, key: ItemKey) -> Result<()>;

    async fn get(&self, key: ItemKey) -> Result<Option<WorkItem>>;

    /// Items currently claimed or processing, for the claim reaper.
    async fn claimed_items(&self) -> Result<Vec<WorkItem>>;

    async fn pending_count(&self) -> Result<usize>;
}

/// Cache partition: append-only, time-ordered buckets per metric.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Append one bucket; insertion order equals time order because the
    /// poller only ever appends forward-moving windows.
    async fn append_bucket(&self, bucket: &Bucket) -> Result<()>;

    /// The last `n` buckets for `metric`, oldest first.
    async fn last_buckets(&self, metric: &str, n: usize) -> Result<Vec<Bucket>>;

    async fn bucket_count(&self, metric: &str) -> Result<usize>;

    /// Subscribe to bucket appends for `metric`, limited to the last entry:
    /// the first delivery replays the newest existing bucket (if any), then
    /// every subsequent append arrives in order.
    async fn subscribe(&self, metric: &str) -> Result<BucketSubscription>;
}

/// A live feed of buckets for one metric.
///
/// Delivery order matches append order. The replayed head and the broadcast
/// receiver are snapshotted under the same store lock, so no append can
/// fall between them.
pub struct BucketSubscription {
    replay: Option<Bucket>,
    rx: broadcast::Receiver<Bucket>,
}

impl BucketSubscription {
    pub(crate) fn new(replay: Option<Bucket>, rx: broadcast::Receiver<Bucket>) -> Self {
        Self { replay, rx }
    }

    /// The bucket the first call to [`next`](Self::next) will deliver, when
    /// it is a replay of an existing entry.
    pub fn pending_replay(&self) -> Option<&Bucket> {
        self.replay.as_ref()
    }

    /// Wait for the next bucket.
    pub async fn next(&mut self) -> Result<Bucket> {
        if let Some(bucket) = self.replay.take() {
            return Ok(bucket);
        }
        loop {
            match self.rx.recv().await {
                Ok(bucket) => return Ok(bucket),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // A consumer this far behind has already lost real-time
                    // value; resume from the stream head.
                    tracing::warn!(skipped, "bucket subscription lagged, entries dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(StoreError::SubscriptionClosed)
                }
            }
        }
    }
}
