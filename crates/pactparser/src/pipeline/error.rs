use thiserror::Error;

use crate::error::{ExtractionError, IntelligenceError, StoreError};

/// Business faults raised while a job runs. Each one ends the job with a
/// `failed` record whose `error_message` is this error's `Display` text.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Text extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Structured extraction failed: {0}")]
    Intelligence(#[from] IntelligenceError),

    #[error("Storage failed: {0}")]
    Storage(#[from] StoreError),
}

/// Faults in running the job unit itself. These never reach the record
/// directly; the worker retries them.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Failed to load job record: {0}")]
    Lookup(#[source] StoreError),

    #[error("Failed to write terminal state: {0}")]
    TerminalWrite(#[source] StoreError),

    #[error("Job execution panicked: {0}")]
    Panicked(String),

    #[error("Job not found: {0}")]
    UnknownJob(String),
}

impl DispatchError {
    /// A job id with no record will not appear on a later attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, DispatchError::UnknownJob(_))
    }
}
