// Durable event queue: producer, worker, and claim reaper.
//
// Producers append work items to the queue partition; workers claim them
// via compare-and-swap, forward the transformed payload to the analytics
// backend, and remove them on acknowledgment. The reaper re-exposes items
// whose claim outlived its liveness timeout, which is how crash recovery
// works without external coordination.

mod error;
mod forwarding;
mod producer;
mod reaper;
mod worker;

pub use error::{ProduceError, QueueError};
pub use forwarding::forwarded_payload;
pub use producer::EventProducer;
pub use reaper::{ClaimReaper, ReaperSettings, SweepStats};
pub use worker::{ProcessOutcome, QueueWorker, WorkerSettings};
