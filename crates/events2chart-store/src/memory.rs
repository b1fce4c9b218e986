//! In-process store implementation.
//!
//! One `MemoryStore` can back any number of producers, workers, pollers and
//! assemblers in the same process: the queue partition linearizes status
//! transitions under a mutex (the compare-and-swap primitive), and each
//! metric's bucket log pairs an append-only vector with a broadcast channel
//! for "bucket added" notifications.
//!
//! Buckets are held as opaque JSON strings and decoded on read. The store
//! never interprets bucket structure, mirroring how an external store is
//! only trusted with an encoded value, not with structured keys.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use events2chart_core::{Bucket, ItemKey, ItemStatus, Payload, WorkItem};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::error::{Result, StoreError};
use crate::{BucketSubscription, CacheStore, QueueStore};

const NOTIFY_CAPACITY: usize = 1024;

#[derive(Default)]
struct QueueState {
    next_key: ItemKey,
    items: BTreeMap<ItemKey, WorkItem>,
}

struct MetricLog {
    entries: Vec<String>,
    notify: broadcast::Sender<Bucket>,
}

impl MetricLog {
    fn new() -> Self {
        let (notify, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self {
            entries: Vec::new(),
            notify,
        }
    }
}

/// Shared in-memory store covering both partitions.
#[derive(Default)]
pub struct MemoryStore {
    queue: Mutex<QueueState>,
    cache: Mutex<HashMap<String, MetricLog>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn update_item<F>(&self, key: ItemKey, from: ItemStatus, to: ItemStatus, apply: F) -> Result<bool>
    where
        F: FnOnce(&mut WorkItem),
    {
        let mut queue = self.queue.lock();
        let item = queue
            .items
            .get_mut(&key)
            .ok_or(StoreError::ItemNotFound(key))?;
        if item.status != from || !from.can_advance_to(to) {
            return Ok(false);
        }
        item.status = to;
        item.status_changed_at = Utc::now();
        apply(item);
        Ok(true)
    }
}

#[async_trait]
impl QueueStore for MemoryStore {
    async fn append(
        &self,
        event_type: &str,
        payload: Payload,
        created_at: DateTime<Utc>,
    ) -> Result<ItemKey> {
        let mut queue = self.queue.lock();
        queue.next_key += 1;
        let key = queue.next_key;
        queue
            .items
            .insert(key, WorkItem::new(key, event_type.to_string(), payload, created_at));
        Ok(key)
    }

    async fn claim(&self, owner: &str) -> Result<Option<WorkItem>> {
        let mut queue = self.queue.lock();
        // Keys are monotonic, so ascending key order is creation order:
        // oldest pending first bounds worst-case staleness.
        let candidate = queue
            .items
            .values_mut()
            .find(|item| item.status == ItemStatus::Pending);
        let Some(item) = candidate else {
            return Ok(None);
        };
        item.status = ItemStatus::Claimed;
        item.status_changed_at = Utc::now();
        item.claim_owner = Some(owner.to_string());
        item.claimed_at = Some(item.status_changed_at);
        Ok(Some(item.clone()))
    }

    async fn advance(&self, key: ItemKey, from: ItemStatus, to: ItemStatus) -> Result<bool> {
        self.update_item(key, from, to, |_| {})
    }

    async fn fail(&self, key: ItemKey, from: ItemStatus, error: &str) -> Result<bool> {
        self.update_item(key, from, ItemStatus::Failed, |item| {
            item.last_error = Some(error.to_string());
            item.attempts += 1;
        })
    }

    async fn release(&self, key: ItemKey, from: ItemStatus) -> Result<bool> {
        self.update_item(key, from, ItemStatus::Pending, |item| {
            item.claim_owner = None;
            item.claimed_at = None;
            item.attempts += 1;
        })
    }

    async fn remove(&self, key: ItemKey) -> Result<()> {
        self.queue.lock().items.remove(&key);
        Ok(())
    }

    async fn get(&self, key: ItemKey) -> Result<Option<WorkItem>> {
        Ok(self.queue.lock().items.get(&key).cloned())
    }

    async fn claimed_items(&self) -> Result<Vec<WorkItem>> {
        Ok(self
            .queue
            .lock()
            .items
            .values()
            .filter(|item| {
                matches!(item.status, ItemStatus::Claimed | ItemStatus::Processing)
            })
            .cloned()
            .collect())
    }

    async fn pending_count(&self) -> Result<usize> {
        Ok(self
            .queue
            .lock()
            .items
            .values()
            .filter(|item| item.status == ItemStatus::Pending)
            .count())
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn append_bucket(&self, bucket: &Bucket) -> Result<()> {
        let encoded = serde_json::to_string(bucket)?;
        let mut cache = self.cache.lock();
        let log = cache
            .entry(bucket.metric.clone())
            .or_insert_with(MetricLog::new);
        log.entries.push(encoded);
        // No receivers yet is fine; priming reads catch up later.
        let _ = log.notify.send(bucket.clone());
        Ok(())
    }

    async fn last_buckets(&self, metric: &str, n: usize) -> Result<Vec<Bucket>> {
        let cache = self.cache.lock();
        let Some(log) = cache.get(metric) else {
            return Ok(Vec::new());
        };
        let skip = log.entries.len().saturating_sub(n);
        log.entries[skip..]
            .iter()
            .map(|encoded| serde_json::from_str(encoded).map_err(StoreError::from))
            .collect()
    }

    async fn bucket_count(&self, metric: &str) -> Result<usize> {
        Ok(self
            .cache
            .lock()
            .get(metric)
            .map(|log| log.entries.len())
            .unwrap_or(0))
    }

    async fn subscribe(&self, metric: &str) -> Result<BucketSubscription> {
        let mut cache = self.cache.lock();
        let log = cache.entry(metric.to_string()).or_insert_with(MetricLog::new);
        // Snapshot the newest entry and the receiver under the same lock, so
        // appends can neither be missed nor delivered twice.
        let replay = match log.entries.last() {
            Some(encoded) => Some(serde_json::from_str(encoded)?),
            None => None,
        };
        Ok(BucketSubscription::new(replay, log.notify.subscribe()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use events2chart_core::GroupValue;
    use std::sync::Arc;

    fn payload() -> Payload {
        let mut map = Payload::new();
        map.insert("cost".to_string(), serde_json::json!(10.0));
        map
    }

    fn bucket(metric: &str, start_secs: i64) -> Bucket {
        let start = Utc.timestamp_opt(start_secs, 0).unwrap();
        Bucket {
            metric: metric.to_string(),
            window_start: start,
            window_end: start + Duration::seconds(10),
            groups: vec![GroupValue::new("Female", 1.0)],
        }
    }

    #[tokio::test]
    async fn keys_are_monotonic_and_claims_come_oldest_first() {
        let store = MemoryStore::new();
        let k1 = store.append("Purchases", payload(), Utc::now()).await.unwrap();
        let k2 = store.append("Purchases", payload(), Utc::now()).await.unwrap();
        assert!(k2 > k1);

        let claimed = store.claim("w1").await.unwrap().unwrap();
        assert_eq!(claimed.key, k1);
        assert_eq!(claimed.status, ItemStatus::Claimed);
        assert_eq!(claimed.claim_owner.as_deref(), Some("w1"));
    }

    #[tokio::test]
    async fn concurrent_claims_on_one_item_have_exactly_one_winner() {
        let store = Arc::new(MemoryStore::new());
        store.append("Purchases", payload(), Utc::now()).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.claim(&format!("worker-{i}")).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn advance_is_compare_and_swap() {
        let store = MemoryStore::new();
        let key = store.append("Purchases", payload(), Utc::now()).await.unwrap();
        store.claim("w1").await.unwrap().unwrap();

        assert!(store.advance(key, ItemStatus::Claimed, ItemStatus::Processing).await.unwrap());
        // Stale swap: the item is no longer claimed.
        assert!(!store.advance(key, ItemStatus::Claimed, ItemStatus::Processing).await.unwrap());
        // Disallowed transition.
        assert!(!store.advance(key, ItemStatus::Processing, ItemStatus::Claimed).await.unwrap());
    }

    #[tokio::test]
    async fn fail_records_error_and_bumps_attempts() {
        let store = MemoryStore::new();
        let key = store.append("Purchases", payload(), Utc::now()).await.unwrap();
        store.claim("w1").await.unwrap();
        store.advance(key, ItemStatus::Claimed, ItemStatus::Processing).await.unwrap();
        assert!(store.fail(key, ItemStatus::Processing, "backend said no").await.unwrap());

        let item = store.get(key).await.unwrap().unwrap();
        assert_eq!(item.status, ItemStatus::Failed);
        assert_eq!(item.attempts, 1);
        assert_eq!(item.last_error.as_deref(), Some("backend said no"));

        assert!(store.release(key, ItemStatus::Failed).await.unwrap());
        let item = store.get(key).await.unwrap().unwrap();
        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(item.attempts, 2);
        assert!(item.claim_owner.is_none());
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let store = MemoryStore::new();
        let key = store.append("Purchases", payload(), Utc::now()).await.unwrap();
        store.remove(key).await.unwrap();
        store.remove(key).await.unwrap();
        assert!(store.get(key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn last_buckets_returns_tail_oldest_first() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.append_bucket(&bucket("m", 100 + i * 10)).await.unwrap();
        }
        let last = store.last_buckets("m", 3).await.unwrap();
        assert_eq!(last.len(), 3);
        assert_eq!(last[0].window_start.timestamp(), 120);
        assert_eq!(last[2].window_start.timestamp(), 140);
        assert_eq!(store.bucket_count("m").await.unwrap(), 5);
        assert!(store.last_buckets("other", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn subscription_replays_newest_then_streams_appends() {
        let store = MemoryStore::new();
        store.append_bucket(&bucket("m", 100)).await.unwrap();
        store.append_bucket(&bucket("m", 110)).await.unwrap();

        let mut sub = store.subscribe("m").await.unwrap();
        assert_eq!(sub.pending_replay().unwrap().window_start.timestamp(), 110);

        store.append_bucket(&bucket("m", 120)).await.unwrap();

        assert_eq!(sub.next().await.unwrap().window_start.timestamp(), 110);
        assert_eq!(sub.next().await.unwrap().window_start.timestamp(), 120);
    }

    #[tokio::test]
    async fn subscription_on_empty_metric_has_no_replay() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe("m").await.unwrap();
        assert!(sub.pending_replay().is_none());

        store.append_bucket(&bucket("m", 100)).await.unwrap();
        assert_eq!(sub.next().await.unwrap().window_start.timestamp(), 100);
    }
}
