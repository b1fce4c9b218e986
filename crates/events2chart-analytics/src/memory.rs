//! In-memory analytics backend with real aggregation.
//!
//! Used by the integration tests and the demo mode. Events become visible
//! to queries only after a configurable ingestion lag, mimicking the
//! indexing delay of a hosted backend that the poller's delay allowance
//! exists to absorb.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use events2chart_core::{AggregateFunction, GroupValue};
use parking_lot::Mutex;

use crate::error::{BackendError, Result};
use crate::{AggregateQuery, AnalyticsBackend};

struct RecordedEvent {
    event_type: String,
    payload: serde_json::Value,
    timestamp: DateTime<Utc>,
    visible_at: DateTime<Utc>,
}

pub struct MemoryBackend {
    timestamp_field: String,
    ingestion_lag: Duration,
    events: Mutex<Vec<RecordedEvent>>,
}

impl MemoryBackend {
    pub fn new(timestamp_field: impl Into<String>) -> Self {
        Self {
            timestamp_field: timestamp_field.into(),
            ingestion_lag: Duration::zero(),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Delay before recorded events become query-visible.
    pub fn with_ingestion_lag(mut self, lag: Duration) -> Self {
        self.ingestion_lag = lag;
        self
    }

    pub fn recorded_count(&self) -> usize {
        self.events.lock().len()
    }

    /// Recorded payloads for one event type, in arrival order.
    pub fn recorded_payloads(&self, event_type: &str) -> Vec<serde_json::Value> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .map(|e| e.payload.clone())
            .collect()
    }
}

/// Resolve a dotted path (`customer.gender`) inside a JSON object.
fn lookup_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn numeric(value: &serde_json::Value) -> Option<f64> {
    value.as_f64()
}

#[async_trait]
impl AnalyticsBackend for MemoryBackend {
    async fn record_event(&self, event_type: &str, payload: &serde_json::Value) -> Result<()> {
        if !payload.is_object() {
            return Err(BackendError::Rejected("payload must be a JSON object".to_string()));
        }
        let Some(raw_ts) = lookup_path(payload, &self.timestamp_field).and_then(|v| v.as_str())
        else {
            return Err(BackendError::Rejected(format!(
                "payload missing timestamp field '{}'",
                self.timestamp_field
            )));
        };
        let timestamp = DateTime::parse_from_rfc3339(raw_ts)
            .map_err(|e| BackendError::Rejected(format!("invalid timestamp '{raw_ts}': {e}")))?
            .with_timezone(&Utc);

        self.events.lock().push(RecordedEvent {
            event_type: event_type.to_string(),
            payload: payload.clone(),
            timestamp,
            visible_at: Utc::now() + self.ingestion_lag,
        });
        Ok(())
    }

    async fn aggregate(&self, query: &AggregateQuery) -> Result<Vec<GroupValue>> {
        let now = Utc::now();
        let events = self.events.lock();

        // (group key, count, sum) in first-seen order.
        let mut groups: Vec<(String, u64, f64)> = Vec::new();
        for event in events.iter() {
            if event.event_type != query.event_type
                || event.visible_at > now
                || !query.window.contains(event.timestamp)
            {
                continue;
            }
            let Some(group_key) = lookup_path(&event.payload, &query.group_by)
                .and_then(|v| v.as_str())
                .map(str::to_string)
            else {
                continue;
            };

            let target = match (&query.function, &query.target_field) {
                (AggregateFunction::Count, _) => 0.0,
                (_, Some(field)) => match lookup_path(&event.payload, field).and_then(numeric) {
                    Some(v) => v,
                    None => continue,
                },
                (_, None) => {
                    return Err(BackendError::Rejected(format!(
                        "{} requires a target field",
                        query.function
                    )))
                }
            };

            match groups.iter_mut().find(|(key, _, _)| *key == group_key) {
                Some((_, count, sum)) => {
                    *count += 1;
                    *sum += target;
                }
                None => groups.push((group_key, 1, target)),
            }
        }

        Ok(groups
            .into_iter()
            .map(|(key, count, sum)| {
                let value = match query.function {
                    AggregateFunction::Count => count as f64,
                    AggregateFunction::Sum => sum,
                    AggregateFunction::Average => sum / count as f64,
                };
                GroupValue::new(key, value)
            })
            .collect())
    }
}
