//! Cache poller: windowed aggregate queries on a fixed cadence.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use events2chart_analytics::{AggregateQuery, AnalyticsBackend};
use events2chart_core::{backfill, Bucket, MetricSpec, PollWindow};
use events2chart_store::CacheStore;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::PollError;

#[derive(Debug, Clone)]
pub struct PollSettings {
    /// Poll cadence; also the bucket window length.
    pub interval: Duration,
    /// Ingestion delay allowance: how far behind wall clock the queried
    /// window sits. Must exceed the backend's typical event-visibility
    /// latency or buckets will systematically undercount.
    pub ingestion_delay: Duration,
}

/// What one poll cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Appended(Bucket),
    /// The current window was already appended (ticks bunched up after a
    /// stall). Expected control flow, not an error.
    StaleWindow,
}

/// Appends one backfilled bucket per interval to the cache partition.
///
/// Exactly one poller must run per metric: appends are idempotent by
/// window only within a single poller, so concurrent pollers for the same
/// metric would double-insert. That is deployment discipline, not locking.
pub struct CachePoller<B: ?Sized, S: ?Sized> {
    backend: Arc<B>,
    store: Arc<S>,
    metric: MetricSpec,
    settings: PollSettings,
    last_window_start: Option<DateTime<Utc>>,
}

impl<B, S> CachePoller<B, S>
where
    B: AnalyticsBackend + ?Sized,
    S: CacheStore + ?Sized,
{
    pub fn new(backend: Arc<B>, store: Arc<S>, metric: MetricSpec, settings: PollSettings) -> Self {
        Self {
            backend,
            store,
            metric,
            settings,
            last_window_start: None,
        }
    }

    fn chrono_interval(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.settings.interval.as_millis() as i64)
    }

    /// Run one poll cycle for the window current at `now`.
    ///
    /// On backend or store failure the caller drops the cycle: the next
    /// window is computed from wall clock, so one failure costs one missing
    /// bucket, never a backlog of retries.
    pub async fn poll_once(&mut self, now: DateTime<Utc>) -> Result<PollOutcome, PollError> {
        let delay = chrono::Duration::milliseconds(self.settings.ingestion_delay.as_millis() as i64);
        let window = PollWindow::current(now, delay, self.chrono_interval());

        if self.last_window_start.is_some_and(|last| window.start <= last) {
            debug!(metric = %self.metric.name, %window, "window already cached, skipping");
            return Ok(PollOutcome::StaleWindow);
        }

        let query = AggregateQuery {
            event_type: self.metric.event_type.clone(),
            function: self.metric.function,
            target_field: self.metric.target_field.clone(),
            group_by: self.metric.group_by.clone(),
            window,
        };
        let groups = self.backend.aggregate(&query).await?;

        // An entirely empty result still yields an all-zero bucket;
        // omitting it would desynchronize per-step assembly downstream.
        let groups = backfill(groups, &self.metric.categories);
        let bucket = Bucket {
            metric: self.metric.name.clone(),
            window_start: window.start,
            window_end: window.end,
            groups,
        };
        self.store.append_bucket(&bucket).await?;
        self.last_window_start = Some(window.start);

        info!(
            metric = %self.metric.name,
            window_start = %bucket.window_start.to_rfc3339(),
            groups = bucket.groups.len(),
            "bucket appended"
        );
        Ok(PollOutcome::Appended(bucket))
    }

    /// Poll on the configured cadence until shutdown.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            metric = %self.metric.name,
            interval_secs = self.settings.interval.as_secs(),
            delay_secs = self.settings.ingestion_delay.as_secs(),
            "cache poller started"
        );
        let mut ticker = tokio::time::interval(self.settings.interval);
        // A missed window is gone for good; catching up would append
        // buckets for windows that already passed.
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            match self.poll_once(Utc::now()).await {
                Ok(PollOutcome::Appended(_)) | Ok(PollOutcome::StaleWindow) => {}
                Err(err) => {
                    warn!(metric = %self.metric.name, error = %err, "poll cycle dropped");
                }
            }
        }
        info!(metric = %self.metric.name, "cache poller stopped");
    }
}
