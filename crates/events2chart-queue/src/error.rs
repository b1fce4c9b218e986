//! Error types for the queue pipeline.

use events2chart_store::StoreError;
use thiserror::Error;

/// Errors publishing an event into the queue.
#[derive(Debug, Error)]
pub enum ProduceError {
    #[error("event type must not be empty")]
    EmptyEventType,

    #[error("event payload must be a JSON object")]
    PayloadNotObject,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from the worker/reaper loops.
///
/// Backend failures are not represented here: they are per-item outcomes
/// (the item is failed or requeued) and never abort the loop.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Store(#[from] StoreError),
}
