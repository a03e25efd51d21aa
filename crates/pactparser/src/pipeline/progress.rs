use crate::broadcast::job_progress::JobProgressTracker;
use crate::job::Checkpoint;

/// Events emitted by the pipeline. Each one follows the store write it
/// describes.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Checkpoint(Checkpoint),
    Completed { score: f64, gap_count: usize },
    Failed { error: String },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests and callers that only poll the store.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Bridges pipeline events to the broadcast channel.
pub struct BroadcastProgress {
    tracker: JobProgressTracker,
}

impl BroadcastProgress {
    pub fn new(tracker: JobProgressTracker) -> Self {
        Self { tracker }
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Checkpoint(checkpoint) => self.tracker.checkpoint(checkpoint),
            ProgressEvent::Completed { score, gap_count } => {
                self.tracker.completed(score, gap_count)
            }
            ProgressEvent::Failed { error } => self.tracker.failed(&error),
        }
    }
}
