// Shared data model for the events2chart pipeline.
//
// Everything here is pure data and pure transforms: work items and their
// status lattice, aggregate buckets, chart series, poll-window math.
// No I/O happens in this crate.

pub mod bucket;
pub mod item;
pub mod metric;
pub mod series;
pub mod window;

pub use bucket::{backfill, Bucket, GroupValue};
pub use item::{ItemKey, ItemStatus, Payload, WorkItem, TRANSPORT_FIELDS};
pub use metric::{AggregateFunction, MetricSpec};
pub use series::{bucket_to_step, buckets_to_series, ChartSeries, ChartStep};
pub use window::PollWindow;
