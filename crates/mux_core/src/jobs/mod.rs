//! Job queue: specs, persistence, and background processing.

mod processor;
mod queue;
mod types;
mod worker;

pub use processor::{JobResult, QueueProcessor};
pub use queue::JobQueue;
pub use types::{JobKind, JobSpec, JobStatus, QueueEntry};
pub use worker::{QueueWorker, WorkerEvent};
