//! Aggregate buckets: one immutable result for one fixed time window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One (group key, aggregate value) pair inside a bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupValue {
    pub key: String,
    pub value: f64,
}

impl GroupValue {
    pub fn new(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// One aggregate result for one time window of one metric.
///
/// Buckets are append-only: corrections are new buckets, never updates.
/// Consecutive buckets for the same metric have non-decreasing window
/// starts spaced by the configured poll interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub metric: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub groups: Vec<GroupValue>,
}

impl Bucket {
    pub fn value_for(&self, category: &str) -> Option<f64> {
        self.groups
            .iter()
            .find(|g| g.key == category)
            .map(|g| g.value)
    }
}

/// Backfill a query result to the full configured category set.
///
/// The analytics backend only returns groups that had matching events, but
/// chart consumers need one value per category per time step to keep all
/// series aligned. Result entries keep their query order; absent categories
/// are appended as zero-valued entries in configured order. Running this on
/// an already-complete result is a no-op.
pub fn backfill(result: Vec<GroupValue>, categories: &[String]) -> Vec<GroupValue> {
    let mut groups = result;
    for category in categories {
        if !groups.iter().any(|g| &g.key == category) {
            groups.push(GroupValue::new(category.clone(), 0.0));
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories() -> Vec<String> {
        vec!["Female".to_string(), "Male".to_string()]
    }

    #[test]
    fn backfill_synthesizes_zero_for_missing_categories() {
        let result = vec![GroupValue::new("Male", 42.5)];
        let filled = backfill(result, &categories());
        assert_eq!(
            filled,
            vec![GroupValue::new("Male", 42.5), GroupValue::new("Female", 0.0)]
        );
    }

    #[test]
    fn backfill_of_empty_result_yields_all_zeros() {
        let filled = backfill(Vec::new(), &categories());
        assert_eq!(
            filled,
            vec![GroupValue::new("Female", 0.0), GroupValue::new("Male", 0.0)]
        );
    }

    #[test]
    fn backfill_is_idempotent_on_complete_results() {
        let complete = vec![GroupValue::new("Male", 1.0), GroupValue::new("Female", 2.0)];
        let filled = backfill(complete.clone(), &categories());
        assert_eq!(filled, complete);
        let twice = backfill(filled.clone(), &categories());
        assert_eq!(twice, filled);
    }

    #[test]
    fn value_for_finds_group_by_category() {
        let bucket = Bucket {
            metric: "purchases".to_string(),
            window_start: Utc::now(),
            window_end: Utc::now(),
            groups: vec![GroupValue::new("Female", 10.0)],
        };
        assert_eq!(bucket.value_for("Female"), Some(10.0));
        assert_eq!(bucket.value_for("Male"), None);
    }
}
