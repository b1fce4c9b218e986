//! Metric definitions: what the cache poller asks the analytics backend.

use serde::{Deserialize, Serialize};

/// Aggregate function applied to the target field over a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    Count,
    Sum,
    Average,
}

impl AggregateFunction {
    pub fn as_str(self) -> &'static str {
        match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Average => "average",
        }
    }
}

impl std::fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cached metric: which events to aggregate, how, and the fixed
/// category set the group-by dimension is expected to take.
///
/// The category set drives backfill: every bucket carries one value per
/// category, present in the query result or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSpec {
    /// Cache partition name, e.g. `purchases_by_gender`.
    pub name: String,
    /// Backend event collection to query, e.g. `Purchases`.
    pub event_type: String,
    pub function: AggregateFunction,
    /// Field the aggregate runs over; unused for `count`.
    #[serde(default)]
    pub target_field: Option<String>,
    /// Dotted path of the group-by dimension, e.g. `customer.gender`.
    pub group_by: String,
    pub categories: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_function_parses_from_lowercase() {
        let f: AggregateFunction = serde_json::from_str("\"average\"").unwrap();
        assert_eq!(f, AggregateFunction::Average);
        assert_eq!(f.as_str(), "average");
    }

    #[test]
    fn metric_spec_round_trips_through_toml_style_json() {
        let spec: MetricSpec = serde_json::from_value(serde_json::json!({
            "name": "purchases_by_gender",
            "event_type": "Purchases",
            "function": "average",
            "target_field": "cost",
            "group_by": "customer.gender",
            "categories": ["Female", "Male"],
        }))
        .unwrap();
        assert_eq!(spec.function, AggregateFunction::Average);
        assert_eq!(spec.categories.len(), 2);
    }
}
