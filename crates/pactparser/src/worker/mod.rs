//! Dispatch collaborator: a pool of OS threads that invoke the orchestrator
//! for each enqueued job, at least once.

pub mod job;
pub mod pool;

pub use job::{Job, JobResult};
pub use pool::{execute_with_retry, RetryPolicy, WorkerPool};

use crate::error::WorkerError;

/// Fire-and-forget hand-off from the submission path.
pub trait Dispatcher: Send + Sync {
    fn enqueue(&self, job: Job) -> Result<(), WorkerError>;
}
