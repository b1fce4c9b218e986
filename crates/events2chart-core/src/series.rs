//! Chart-facing views of buckets: derived, never persisted.

use chrono::{DateTime, Utc};

use crate::bucket::Bucket;

/// One ordered sequence of (timestamp, value) points for one category.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub category: String,
    pub points: Vec<(DateTime<Utc>, f64)>,
}

/// One time step across all categories, in configured category order.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartStep {
    pub timestamp: DateTime<Utc>,
    pub values: Vec<f64>,
}

/// Convert one bucket into a chart step, one value per configured category.
///
/// Buckets appended by the poller are already backfilled; the zero default
/// here only covers buckets written before a category was added to the
/// configuration.
pub fn bucket_to_step(bucket: &Bucket, categories: &[String]) -> ChartStep {
    ChartStep {
        timestamp: bucket.window_start,
        values: categories
            .iter()
            .map(|c| bucket.value_for(c).unwrap_or(0.0))
            .collect(),
    }
}

/// Convert ordered buckets into parallel per-category series suitable for
/// priming a chart.
pub fn buckets_to_series(buckets: &[Bucket], categories: &[String]) -> Vec<ChartSeries> {
    categories
        .iter()
        .map(|category| ChartSeries {
            category: category.clone(),
            points: buckets
                .iter()
                .map(|b| (b.window_start, b.value_for(category).unwrap_or(0.0)))
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::GroupValue;
    use chrono::TimeZone;

    fn bucket(start_secs: i64, groups: Vec<GroupValue>) -> Bucket {
        let start = Utc.timestamp_opt(start_secs, 0).unwrap();
        Bucket {
            metric: "purchases_by_gender".to_string(),
            window_start: start,
            window_end: start + chrono::Duration::seconds(10),
            groups,
        }
    }

    fn categories() -> Vec<String> {
        vec!["Female".to_string(), "Male".to_string()]
    }

    #[test]
    fn step_values_follow_configured_category_order() {
        let b = bucket(
            100,
            vec![GroupValue::new("Male", 42.5), GroupValue::new("Female", 7.0)],
        );
        let step = bucket_to_step(&b, &categories());
        assert_eq!(step.values, vec![7.0, 42.5]);
        assert_eq!(step.timestamp, b.window_start);
    }

    #[test]
    fn series_are_parallel_and_complete() {
        let buckets = vec![
            bucket(100, vec![GroupValue::new("Female", 1.0), GroupValue::new("Male", 2.0)]),
            bucket(110, vec![GroupValue::new("Female", 3.0), GroupValue::new("Male", 4.0)]),
        ];
        let series = buckets_to_series(&buckets, &categories());
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].category, "Female");
        assert_eq!(series[0].points[1].1, 3.0);
        assert_eq!(series[1].points[0].1, 2.0);
        assert_eq!(series[0].points.len(), series[1].points.len());
    }

    #[test]
    fn missing_category_defaults_to_zero() {
        let b = bucket(100, vec![GroupValue::new("Male", 5.0)]);
        let step = bucket_to_step(&b, &categories());
        assert_eq!(step.values, vec![0.0, 5.0]);
    }
}
