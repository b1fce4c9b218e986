//! Error types for the cache pipeline.

use events2chart_analytics::BackendError;
use events2chart_store::StoreError;
use thiserror::Error;

/// A failed poll cycle. The cycle is dropped, never retried: a late bucket
/// is no longer meaningful once its window has passed.
#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum AssembleError {
    /// Fewer than two buckets exist, so priming cannot both backfill
    /// history and seed the live feed. The assembler waits for a later
    /// poll cycle.
    #[error("not enough buckets to start streaming (have {have}, need at least 2)")]
    NotReady { have: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}
