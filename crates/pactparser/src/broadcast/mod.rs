//! Live progress events for observers that prefer push over polling.

pub mod job_progress;

pub use job_progress::{JobProgressBroadcaster, JobProgressEvent, JobProgressTracker};
