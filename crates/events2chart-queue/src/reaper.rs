//! Claim reaper: crash recovery for stalled workers.
//!
//! Not required for single-worker deployments, but part of the queue
//! contract: items whose claim outlives the liveness timeout are re-exposed
//! to the pool (incrementing their attempt count), so work from a crashed
//! worker is redone rather than abandoned.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use events2chart_store::QueueStore;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::QueueError;

#[derive(Debug, Clone)]
pub struct ReaperSettings {
    /// How long a claim may stand before the item is considered stalled.
    pub liveness_timeout: Duration,
    /// How often to sweep.
    pub sweep_interval: Duration,
    /// Same bound the workers use; a reclaimed item that already exhausted
    /// its attempts is failed instead of requeued.
    pub max_attempts: u32,
}

impl Default for ReaperSettings {
    fn default() -> Self {
        Self {
            liveness_timeout: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(15),
            max_attempts: 5,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub requeued: usize,
    pub failed: usize,
}

pub struct ClaimReaper<S: ?Sized> {
    store: Arc<S>,
    settings: ReaperSettings,
}

impl<S: QueueStore + ?Sized> ClaimReaper<S> {
    pub fn new(store: Arc<S>, settings: ReaperSettings) -> Self {
        Self { store, settings }
    }

    /// Re-expose items whose claim exceeded the liveness timeout.
    pub async fn sweep(&self) -> Result<SweepStats, QueueError> {
        let cutoff = Utc::now()
            - chrono::Duration::milliseconds(self.settings.liveness_timeout.as_millis() as i64);
        let mut stats = SweepStats::default();

        for item in self.store.claimed_items().await? {
            let claim_age_start = item.claimed_at.unwrap_or(item.status_changed_at);
            if claim_age_start > cutoff {
                continue;
            }

            // The owning worker may still race us here; compare-and-swap
            // makes the loser's transition a no-op.
            if item.attempts + 1 < self.settings.max_attempts {
                if self.store.release(item.key, item.status).await? {
                    warn!(
                        item_key = item.key,
                        owner = item.claim_owner.as_deref().unwrap_or("unknown"),
                        attempts = item.attempts + 1,
                        "stale claim reclaimed, item requeued"
                    );
                    stats.requeued += 1;
                }
            } else if self
                .store
                .fail(item.key, item.status, "claim liveness timeout exceeded")
                .await?
            {
                warn!(
                    item_key = item.key,
                    attempts = item.attempts + 1,
                    "stale claim out of attempts, item failed"
                );
                stats.failed += 1;
            }
        }
        Ok(stats)
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            timeout_secs = self.settings.liveness_timeout.as_secs(),
            "claim reaper started"
        );
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.settings.sweep_interval) => {}
                _ = shutdown.changed() => break,
            }
            match self.sweep().await {
                Ok(stats) if stats.requeued > 0 || stats.failed > 0 => {
                    debug!(requeued = stats.requeued, failed = stats.failed, "sweep done");
                }
                Ok(_) => {}
                Err(err) => error!(error = %err, "reaper sweep failed"),
            }
        }
        info!("claim reaper stopped");
    }
}
