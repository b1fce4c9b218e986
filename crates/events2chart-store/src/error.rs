//! Error types for the shared store boundary.

use events2chart_core::ItemKey;
use thiserror::Error;

/// Errors surfaced by store implementations.
///
/// A lost compare-and-swap is not an error: `advance`/`fail`/`release`
/// return `false` and `claim` moves on to the next candidate.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("work item {0} not found")]
    ItemNotFound(ItemKey),

    /// Buckets cross the store boundary as an opaque encoded value; a
    /// decode failure means the partition holds data this build cannot read.
    #[error("failed to (de)serialize bucket at the store boundary: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("bucket subscription closed")]
    SubscriptionClosed,
}

pub type Result<T> = std::result::Result<T, StoreError>;
