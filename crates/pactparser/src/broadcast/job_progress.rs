//! Job progress broadcaster for push-style status streaming.
//!
//! Events mirror the store writes: one per checkpoint plus one terminal
//! event. Observers that miss events can always fall back to polling the
//! job store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::job::{Checkpoint, JobStatus};

/// Progress event for a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressEvent {
    pub job_id: String,
    /// Original upload name.
    pub filename: String,
    pub status: JobStatus,
    pub progress_percentage: u8,
    /// Human-readable description of the current activity.
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Set on completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    /// Set on completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap_count: Option<usize>,
    /// Set on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobProgressEvent {
    fn base(job_id: &str, filename: &str, status: JobStatus, progress: u8, message: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            filename: filename.to_string(),
            status,
            progress_percentage: progress,
            message: message.to_string(),
            timestamp: Utc::now(),
            confidence_score: None,
            gap_count: None,
            error: None,
        }
    }

    /// A worker has dequeued the job; the record is still `pending`.
    pub fn picked_up(job_id: &str, filename: &str) -> Self {
        Self::base(job_id, filename, JobStatus::Pending, 0, "Job picked up by a worker")
    }

    pub fn checkpoint(job_id: &str, filename: &str, checkpoint: Checkpoint) -> Self {
        Self::base(
            job_id,
            filename,
            JobStatus::Processing,
            checkpoint.progress(),
            checkpoint.message(),
        )
    }

    pub fn completed(job_id: &str, filename: &str, score: f64, gap_count: usize) -> Self {
        let mut event = Self::base(
            job_id,
            filename,
            JobStatus::Completed,
            Checkpoint::Complete.progress(),
            Checkpoint::Complete.message(),
        );
        event.confidence_score = Some(score);
        event.gap_count = Some(gap_count);
        event
    }

    pub fn failed(job_id: &str, filename: &str, error: &str) -> Self {
        let mut event = Self::base(job_id, filename, JobStatus::Failed, 0, "Processing failed");
        event.error = Some(error.to_string());
        event
    }
}

/// Broadcasts job progress events to any number of subscribers.
#[derive(Clone)]
pub struct JobProgressBroadcaster {
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: JobProgressEvent) {
        // No active receivers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.sender.subscribe()
    }

    /// Creates a tracker for one job and announces that a worker took it.
    pub fn start_job(&self, job_id: &str, filename: &str) -> JobProgressTracker {
        let tracker = JobProgressTracker::new(job_id, filename, Arc::clone(&self.sender));
        tracker.send(JobProgressEvent::picked_up(job_id, filename));
        tracker
    }
}

impl Default for JobProgressBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Publishes events for a single job.
pub struct JobProgressTracker {
    job_id: String,
    filename: String,
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressTracker {
    pub fn new(
        job_id: &str,
        filename: &str,
        sender: Arc<broadcast::Sender<JobProgressEvent>>,
    ) -> Self {
        Self {
            job_id: job_id.to_string(),
            filename: filename.to_string(),
            sender,
        }
    }

    fn send(&self, event: JobProgressEvent) {
        let _ = self.sender.send(event);
    }

    pub fn checkpoint(&self, checkpoint: Checkpoint) {
        self.send(JobProgressEvent::checkpoint(
            &self.job_id,
            &self.filename,
            checkpoint,
        ));
    }

    pub fn completed(&self, score: f64, gap_count: usize) {
        self.send(JobProgressEvent::completed(
            &self.job_id,
            &self.filename,
            score,
            gap_count,
        ));
    }

    pub fn failed(&self, error: &str) {
        self.send(JobProgressEvent::failed(&self.job_id, &self.filename, error));
    }
}
