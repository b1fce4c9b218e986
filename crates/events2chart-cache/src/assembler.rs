//! Stream assembler: primes a chart's history, then keeps it current.

use std::sync::Arc;
use std::time::Duration;

use events2chart_core::{bucket_to_step, buckets_to_series, ChartSeries, ChartStep};
use events2chart_store::{BucketSubscription, CacheStore};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::AssembleError;

/// The chart collaborator seam.
///
/// `prime` is called exactly once with the full history (one series per
/// configured category, parallel and complete); `push` is called once per
/// new time step. The consumer is never invoked without a value for every
/// category.
pub trait ChartConsumer: Send {
    fn prime(&mut self, series: &[ChartSeries]);
    fn push(&mut self, step: ChartStep);
}

#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// How many trailing buckets to read when priming (history plus the
    /// seed the subscription replays).
    pub history_size: usize,
    /// How often to re-check the precondition while fewer than two buckets
    /// exist.
    pub wait_backoff: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            history_size: 60,
            wait_backoff: Duration::from_secs(2),
        }
    }
}

struct Primed {
    history: Vec<ChartSeries>,
    subscription: BucketSubscription,
}

/// Feeds one chart consumer from the cache partition, read-only.
///
/// Any number of assemblers may run against the same store; none of them
/// ever contacts the analytics backend.
pub struct StreamAssembler<S: ?Sized> {
    store: Arc<S>,
    metric: String,
    categories: Vec<String>,
    settings: StreamSettings,
}

impl<S: CacheStore + ?Sized> StreamAssembler<S> {
    pub fn new(
        store: Arc<S>,
        metric: impl Into<String>,
        categories: Vec<String>,
        settings: StreamSettings,
    ) -> Self {
        Self {
            store,
            metric: metric.into(),
            categories,
            settings,
        }
    }

    /// One priming attempt.
    ///
    /// Subscribes first, then reads history, excluding every bucket from
    /// the subscription's replayed seed onward. The subscription is scoped
    /// to the last entry and replays it as its first delivery, so excluding
    /// the seed from the one-time read is what prevents the consumer from
    /// seeing that bucket twice. It also means the live stream always opens
    /// with the freshest value.
    async fn try_prime(&self) -> Result<Primed, AssembleError> {
        let subscription = self.store.subscribe(&self.metric).await?;
        let Some(seed_start) = subscription.pending_replay().map(|b| b.window_start) else {
            return Err(AssembleError::NotReady { have: 0 });
        };

        let buckets = self
            .store
            .last_buckets(&self.metric, self.settings.history_size)
            .await?;
        let history: Vec<_> = buckets
            .into_iter()
            .filter(|b| b.window_start < seed_start)
            .collect();
        if history.is_empty() {
            // Only the seed exists; priming alone cannot backfill history.
            return Err(AssembleError::NotReady { have: 1 });
        }

        Ok(Primed {
            history: buckets_to_series(&history, &self.categories),
            subscription,
        })
    }

    /// Prime `consumer` and stream new buckets to it until shutdown.
    ///
    /// Waits for at least two buckets to exist before any consumer call is
    /// made, then delivers history exactly once and every subsequent
    /// bucket exactly once, in window order.
    pub async fn run<C: ChartConsumer>(
        &self,
        consumer: &mut C,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), AssembleError> {
        let mut primed = loop {
            match self.try_prime().await {
                Ok(primed) => break primed,
                Err(AssembleError::NotReady { have }) => {
                    debug!(metric = %self.metric, have, "waiting for enough buckets to stream");
                    tokio::select! {
                        _ = tokio::time::sleep(self.settings.wait_backoff) => {}
                        _ = shutdown.changed() => return Ok(()),
                    }
                }
                Err(err) => return Err(err),
            }
        };

        let history_len = primed
            .history
            .first()
            .map(|s| s.points.len())
            .unwrap_or(0);
        consumer.prime(&primed.history);
        info!(
            metric = %self.metric,
            history_len,
            categories = self.categories.len(),
            "chart primed, streaming live buckets"
        );

        loop {
            tokio::select! {
                next = primed.subscription.next() => {
                    let bucket = next?;
                    consumer.push(bucket_to_step(&bucket, &self.categories));
                }
                _ = shutdown.changed() => break,
            }
        }
        info!(metric = %self.metric, "stream assembler stopped");
        Ok(())
    }
}
