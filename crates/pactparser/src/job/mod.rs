//! Job Record: one submitted document and its lifecycle state.
//!
//! Records are created `pending` by the submission path and afterwards only
//! changed through [`JobPatch`] values written by the orchestrator. A patch
//! is a field-level update: fields it does not mention are left untouched,
//! so duplicate or concurrent writes for the same job converge instead of
//! clobbering each other.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scoring::CompletenessReport;

// ─── Status ─────────────────────────────────────────────────────────────────

/// Lifecycle status. `pending -> processing -> completed | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Completed and failed records are never mutated again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

// ─── Checkpoints ────────────────────────────────────────────────────────────

/// Fixed progress checkpoints. Each one is persisted before the unit of work
/// it announces starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Checkpoint {
    Started,
    ExtractingText,
    ExtractingStructure,
    Scoring,
    /// Only reached through the terminal success write.
    Complete,
}

impl Checkpoint {
    /// Checkpoints written while the job is `processing`, in order.
    pub const PROCESSING: [Checkpoint; 4] = [
        Checkpoint::Started,
        Checkpoint::ExtractingText,
        Checkpoint::ExtractingStructure,
        Checkpoint::Scoring,
    ];

    pub fn progress(&self) -> u8 {
        match self {
            Checkpoint::Started => 10,
            Checkpoint::ExtractingText => 30,
            Checkpoint::ExtractingStructure => 70,
            Checkpoint::Scoring => 90,
            Checkpoint::Complete => 100,
        }
    }

    /// Short human-readable description used in progress events.
    pub fn message(&self) -> &'static str {
        match self {
            Checkpoint::Started => "Processing started",
            Checkpoint::ExtractingText => "Extracting text from document",
            Checkpoint::ExtractingStructure => "Extracting contract data",
            Checkpoint::Scoring => "Scoring completeness",
            Checkpoint::Complete => "Processing complete",
        }
    }
}

// ─── Record ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    /// Original upload name.
    pub filename: String,
    /// Where the uploaded document is stored.
    pub storage_path: PathBuf,
    pub status: JobStatus,
    pub progress_percentage: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap_analysis: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// A freshly submitted record.
    pub fn pending(id: impl Into<String>, filename: impl Into<String>, storage_path: PathBuf) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            filename: filename.into(),
            storage_path,
            status: JobStatus::Pending,
            progress_percentage: 0,
            extracted_data: None,
            confidence_score: None,
            gap_analysis: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a field-level update and refreshes `updated_at`.
    pub fn apply(&mut self, patch: &JobPatch, now: DateTime<Utc>) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(progress) = patch.progress_percentage {
            self.progress_percentage = progress;
        }
        patch.extracted_data.apply_to(&mut self.extracted_data);
        patch.confidence_score.apply_to(&mut self.confidence_score);
        patch.gap_analysis.apply_to(&mut self.gap_analysis);
        patch.error_message.apply_to(&mut self.error_message);
        self.updated_at = now;
    }

    /// Returns a description of the first violated lifecycle invariant.
    pub fn invariant_violation(&self) -> Option<&'static str> {
        let has_results = self.extracted_data.is_some()
            || self.confidence_score.is_some()
            || self.gap_analysis.is_some();

        match self.status {
            JobStatus::Pending | JobStatus::Processing if has_results => {
                Some("results populated before completion")
            }
            JobStatus::Pending | JobStatus::Processing if self.error_message.is_some() => {
                Some("error message populated before failure")
            }
            JobStatus::Completed if self.error_message.is_some() => {
                Some("completed record carries an error message")
            }
            JobStatus::Completed if self.confidence_score.is_none() => {
                Some("completed record has no confidence score")
            }
            JobStatus::Completed if self.progress_percentage != 100 => {
                Some("completed record is not at 100%")
            }
            JobStatus::Failed if has_results => Some("failed record carries results"),
            JobStatus::Failed if self.progress_percentage != 0 => {
                Some("failed record progress was not reset")
            }
            _ if self.progress_percentage > 100 => Some("progress above 100%"),
            _ => None,
        }
    }
}

// ─── Patches ────────────────────────────────────────────────────────────────

/// Update for one optional field.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Patch<T> {
    #[default]
    Keep,
    Set(T),
    Clear,
}

impl<T: Clone> Patch<T> {
    fn apply_to(&self, field: &mut Option<T>) {
        match self {
            Patch::Keep => {}
            Patch::Set(value) => *field = Some(value.clone()),
            Patch::Clear => *field = None,
        }
    }
}

/// Field-level update for a job record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub progress_percentage: Option<u8>,
    pub extracted_data: Patch<Value>,
    pub confidence_score: Patch<f64>,
    pub gap_analysis: Patch<Vec<String>>,
    pub error_message: Patch<String>,
}

impl JobPatch {
    /// Progress write: `{status=processing, progress_percentage}`.
    pub fn checkpoint(checkpoint: Checkpoint) -> Self {
        Self {
            status: Some(JobStatus::Processing),
            progress_percentage: Some(checkpoint.progress()),
            ..Default::default()
        }
    }

    /// Terminal success write. The only write that populates results.
    pub fn completed(extracted_data: Value, report: &CompletenessReport) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress_percentage: Some(Checkpoint::Complete.progress()),
            extracted_data: Patch::Set(extracted_data),
            confidence_score: Patch::Set(report.score),
            gap_analysis: Patch::Set(report.gaps.clone()),
            error_message: Patch::Clear,
        }
    }

    /// Terminal failure write. Progress is reset to 0 and no partial results
    /// survive.
    pub fn failed(error_message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            progress_percentage: Some(0),
            extracted_data: Patch::Clear,
            confidence_score: Patch::Clear,
            gap_analysis: Patch::Clear,
            error_message: Patch::Set(error_message.into()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_some_and(|s| s.is_terminal())
    }
}
