//! Error taxonomy for the analytics backend boundary.

use thiserror::Error;

/// Failures talking to the analytics backend.
///
/// The transient/rejected split drives retry policy: transient failures are
/// revisited by the normal claim cycle, rejections terminate an item's
/// processing and are surfaced to operators.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Backend unreachable, timed out, or returned a server error.
    #[error("analytics backend unavailable: {0}")]
    Transient(String),

    /// The backend refused the request: malformed payload, bad credentials,
    /// or quota exceeded. Retrying the same request will not help.
    #[error("analytics backend rejected the request: {0}")]
    Rejected(String),
}

impl BackendError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transient(_))
    }
}

pub type Result<T> = std::result::Result<T, BackendError>;
