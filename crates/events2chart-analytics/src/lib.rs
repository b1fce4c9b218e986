// Analytics backend boundary.
//
// The backend is a black box with a narrow contract: a write API that
// accepts (event type, payload with an ISO-8601 timestamp field) and a
// query API that runs a windowed aggregate grouped by one dimension.
// Its query language and storage engine are its own business.

use async_trait::async_trait;
use events2chart_core::{AggregateFunction, GroupValue, PollWindow};

mod error;
pub mod http;
pub mod memory;

pub use error::{BackendError, Result};
pub use http::{HttpAnalyticsClient, HttpBackendSettings};
pub use memory::MemoryBackend;

/// One windowed aggregate query.
#[derive(Debug, Clone)]
pub struct AggregateQuery {
    /// Event collection to aggregate over.
    pub event_type: String,
    pub function: AggregateFunction,
    /// Field the aggregate runs over; ignored for `count`.
    pub target_field: Option<String>,
    /// Dotted path of the group-by dimension, e.g. `customer.gender`.
    pub group_by: String,
    pub window: PollWindow,
}

/// The analytics backend seam.
///
/// Handles are constructed once at process start and passed into each
/// component, so tests can substitute in-memory fakes.
#[async_trait]
pub trait AnalyticsBackend: Send + Sync {
    /// Submit one event to the write API. The payload must already carry
    /// its ISO-8601 timestamp field; transport metadata has been stripped.
    async fn record_event(&self, event_type: &str, payload: &serde_json::Value) -> Result<()>;

    /// Run a windowed aggregate query. Returns ordered (group key, value)
    /// pairs covering only groups that had matching events; backfill to the
    /// full category set is the caller's job.
    async fn aggregate(&self, query: &AggregateQuery) -> Result<Vec<GroupValue>>;
}
