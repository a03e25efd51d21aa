use std::path::PathBuf;

use crate::job::JobStatus;
use crate::pipeline::JobOutcome;

/// Unit of dispatch: one stored document awaiting orchestration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    pub document_path: PathBuf,
    /// Original upload name, for progress events and logs.
    pub filename: String,
}

impl Job {
    pub fn new(id: impl Into<String>, document_path: PathBuf, filename: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            document_path,
            filename: filename.into(),
        }
    }
}

/// What a worker reports after it is done with a job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    pub job_id: String,
    pub filename: String,
    pub success: bool,
    /// Final record status, when the worker knows it.
    pub status: Option<JobStatus>,
    pub confidence_score: Option<f64>,
    pub gap_count: usize,
    pub error: Option<String>,
    /// Invocations of the orchestrator, including the first.
    pub attempts: u32,
}

impl JobResult {
    pub fn from_outcome(job: &Job, outcome: &JobOutcome, attempts: u32) -> Self {
        let base = Self {
            job_id: job.id.clone(),
            filename: job.filename.clone(),
            success: false,
            status: None,
            confidence_score: None,
            gap_count: 0,
            error: None,
            attempts,
        };

        match outcome {
            JobOutcome::Completed { score, gaps } => Self {
                success: true,
                status: Some(JobStatus::Completed),
                confidence_score: Some(*score),
                gap_count: gaps.len(),
                ..base
            },
            JobOutcome::Failed { error } => Self {
                status: Some(JobStatus::Failed),
                error: Some(error.clone()),
                ..base
            },
            JobOutcome::AlreadyTerminal(status) => Self {
                success: *status == JobStatus::Completed,
                status: Some(*status),
                ..base
            },
        }
    }

    /// The orchestrator never finished. `status` reflects the best-effort
    /// failure write, if it went through.
    pub fn dispatch_failure(
        job: &Job,
        error: impl Into<String>,
        attempts: u32,
        status: Option<JobStatus>,
    ) -> Self {
        Self {
            job_id: job.id.clone(),
            filename: job.filename.clone(),
            success: false,
            status,
            confidence_score: None,
            gap_count: 0,
            error: Some(error.into()),
            attempts,
        }
    }
}
