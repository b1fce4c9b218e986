// Cache-refresh pipeline: poller and stream assembler.
//
// The poller turns the backend's slow, delayed aggregate queries into a
// gap-free, append-only time series in the cache partition; assemblers
// stream that series to any number of chart consumers without ever
// touching the analytics backend.

mod assembler;
mod error;
mod poller;

pub use assembler::{ChartConsumer, StreamAssembler, StreamSettings};
pub use error::{AssembleError, PollError};
pub use poller::{CachePoller, PollOutcome, PollSettings};
