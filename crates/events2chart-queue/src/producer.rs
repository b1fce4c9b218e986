//! Event producer: appends new work items to the queue partition.

use std::sync::Arc;

use chrono::Utc;
use events2chart_core::ItemKey;
use events2chart_store::QueueStore;
use tracing::debug;

use crate::error::ProduceError;

/// Appends business events to the durable queue. Any number of producers
/// may share one store.
pub struct EventProducer<S: ?Sized> {
    store: Arc<S>,
}

impl<S: QueueStore + ?Sized> EventProducer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Queue one event for delivery to the analytics backend.
    ///
    /// The payload must be a JSON object; its shape is otherwise
    /// caller-defined. Returns the store-assigned item key.
    pub async fn publish(
        &self,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<ItemKey, ProduceError> {
        if event_type.is_empty() {
            return Err(ProduceError::EmptyEventType);
        }
        let serde_json::Value::Object(payload) = payload else {
            return Err(ProduceError::PayloadNotObject);
        };

        let key = self.store.append(event_type, payload, Utc::now()).await?;
        debug!(item_key = key, event_type, "event queued");
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use events2chart_core::ItemStatus;
    use events2chart_store::MemoryStore;

    #[tokio::test]
    async fn publish_appends_a_pending_item() {
        let store = Arc::new(MemoryStore::new());
        let producer = EventProducer::new(Arc::clone(&store));

        let key = producer
            .publish("Purchases", serde_json::json!({"cost": 10.0}))
            .await
            .unwrap();

        let item = store.get(key).await.unwrap().unwrap();
        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(item.event_type, "Purchases");
        assert_eq!(item.attempts, 0);
    }

    #[tokio::test]
    async fn publish_rejects_non_object_payloads() {
        let store = Arc::new(MemoryStore::new());
        let producer = EventProducer::new(store);

        let err = producer
            .publish("Purchases", serde_json::json!([1, 2, 3]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProduceError::PayloadNotObject));

        let err = producer
            .publish("", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProduceError::EmptyEventType));
    }
}
