//! Work items: one queued, not-yet-forwarded business event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned key for a work item. Monotonically increasing per store,
/// so iteration order by key equals creation order.
pub type ItemKey = u64;

/// Free-form event payload. Event shapes are caller-defined, so this is an
/// open JSON object rather than a fixed struct.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Payload keys that carry queue transport metadata rather than business
/// data. These are stripped before forwarding to the analytics backend.
pub const TRANSPORT_FIELDS: &[&str] = &["event_type", "status", "created_at", "status_changed_at"];

/// Lifecycle status of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Claimed,
    Processing,
    Succeeded,
    Failed,
}

impl ItemStatus {
    /// Whether a transition from `self` to `to` is allowed.
    ///
    /// Forward progress is monotonic along
    /// `pending -> claimed -> processing -> {succeeded, failed}`. The only
    /// backward edges are requeues to `pending` (worker retry after a
    /// transient failure, or reaper reclaim of a stale claim), which must
    /// increment the attempt count. `succeeded` is terminal.
    pub fn can_advance_to(self, to: ItemStatus) -> bool {
        use ItemStatus::*;
        matches!(
            (self, to),
            (Pending, Claimed)
                | (Claimed, Processing)
                | (Claimed, Pending)
                | (Claimed, Failed)
                | (Processing, Succeeded)
                | (Processing, Failed)
                | (Processing, Pending)
                | (Failed, Pending)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Succeeded | ItemStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Claimed => "claimed",
            ItemStatus::Processing => "processing",
            ItemStatus::Succeeded => "succeeded",
            ItemStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One business event awaiting delivery to the analytics backend.
///
/// The key is immutable and unique; the payload is never mutated after
/// creation (the forwarding transform works on a copy). Once claimed, the
/// claiming worker owns all status transitions until the item is released,
/// removed, or reclaimed by the reaper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub key: ItemKey,
    pub event_type: String,
    pub payload: Payload,
    pub created_at: DateTime<Utc>,
    pub status: ItemStatus,
    pub status_changed_at: DateTime<Utc>,
    pub claim_owner: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl WorkItem {
    pub fn new(key: ItemKey, event_type: String, payload: Payload, created_at: DateTime<Utc>) -> Self {
        Self {
            key,
            event_type,
            payload,
            created_at,
            status: ItemStatus::Pending,
            status_changed_at: created_at,
            claim_owner: None,
            claimed_at: None,
            attempts: 0,
            last_error: None,
        }
    }
}
