use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, info_span, warn};

use crate::intelligence::IntelligenceClient;
use crate::job::{Checkpoint, JobPatch, JobStatus};
use crate::processor::TextExtractor;
use crate::sanitize;
use crate::scoring::{self, CompletenessReport};
use crate::store::JobStore;
use crate::worker::job::Job;

use super::error::{DispatchError, PipelineError};
use super::progress::{ProgressEvent, ProgressReporter};

/// How one invocation of [`Pipeline::run`] ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed { score: f64, gaps: Vec<String> },
    Failed { error: String },
    /// The record was already terminal; nothing was written.
    AlreadyTerminal(JobStatus),
}

/// The job orchestrator. Holds no per-job state; one instance is shared by
/// every worker.
pub struct Pipeline {
    store: Arc<dyn JobStore>,
    extractor: Arc<dyn TextExtractor>,
    intelligence: Arc<dyn IntelligenceClient>,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn JobStore>,
        extractor: Arc<dyn TextExtractor>,
        intelligence: Arc<dyn IntelligenceClient>,
    ) -> Self {
        Self {
            store,
            extractor,
            intelligence,
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Runs every stage for one job and performs its terminal write.
    ///
    /// Business faults become a `failed` record and `Ok(JobOutcome::Failed)`.
    /// `Err` is reserved for faults that left the record without a terminal
    /// state.
    pub fn run(
        &self,
        job: &Job,
        progress: &dyn ProgressReporter,
    ) -> Result<JobOutcome, DispatchError> {
        let filename = sanitize::redact_path(&job.document_path);
        let _pipeline_span = info_span!("pipeline",
            job_id = %job.id,
            filename = %filename,
            path_hash = %sanitize::hash_path(&job.document_path),
        )
        .entered();

        let record = self
            .store
            .find_by_id(&job.id)
            .map_err(DispatchError::Lookup)?
            .ok_or_else(|| DispatchError::UnknownJob(job.id.clone()))?;

        if record.status.is_terminal() {
            debug!(status = %record.status, "Job already terminal, skipping");
            return Ok(JobOutcome::AlreadyTerminal(record.status));
        }

        // A re-invoked job resumes from its last persisted checkpoint value
        // so that observers never see progress go backwards.
        let floor = record.progress_percentage;

        match self.process(job, floor, progress) {
            Ok((extracted, report)) => {
                let score = report.score;
                let gaps = report.gaps.clone();
                if let Err(e) = self.write_completed(job, extracted, &report) {
                    return self.fail(job, e.into(), progress);
                }
                info!(score, gap_count = gaps.len(), "Job completed");
                progress.report(ProgressEvent::Completed {
                    score,
                    gap_count: gaps.len(),
                });
                Ok(JobOutcome::Completed { score, gaps })
            }
            Err(e) => self.fail(job, e, progress),
        }
    }

    /// Writes a `failed` record unless the job already reached a terminal
    /// state. Returns whether a write happened.
    pub fn fail_unless_terminal(&self, job_id: &str, message: &str) -> Result<bool, DispatchError> {
        let record = self
            .store
            .find_by_id(job_id)
            .map_err(DispatchError::Lookup)?
            .ok_or_else(|| DispatchError::UnknownJob(job_id.to_string()))?;
        if record.status.is_terminal() {
            return Ok(false);
        }
        self.store
            .upsert_by_id(job_id, &JobPatch::failed(message))
            .map_err(DispatchError::TerminalWrite)?;
        Ok(true)
    }

    fn process(
        &self,
        job: &Job,
        floor: u8,
        progress: &dyn ProgressReporter,
    ) -> Result<(Value, CompletenessReport), PipelineError> {
        self.checkpoint(job, Checkpoint::Started, floor, progress)?;

        let text = {
            let _step = info_span!("extract_text").entered();
            self.checkpoint(job, Checkpoint::ExtractingText, floor, progress)?;
            self.step_extract_text(job)?
        };

        let extracted = {
            let _step = info_span!("extract_structure").entered();
            self.checkpoint(job, Checkpoint::ExtractingStructure, floor, progress)?;
            self.step_extract_structure(&text)?
        };

        let report = {
            let _step = info_span!("score").entered();
            self.checkpoint(job, Checkpoint::Scoring, floor, progress)?;
            self.step_score(&extracted)
        };

        Ok((extracted, report))
    }

    /// Persists `{status=processing, progress}` before the stage runs.
    /// Checkpoints below `floor` were already passed by an earlier attempt
    /// and are not written again.
    fn checkpoint(
        &self,
        job: &Job,
        checkpoint: Checkpoint,
        floor: u8,
        progress: &dyn ProgressReporter,
    ) -> Result<(), PipelineError> {
        if checkpoint.progress() < floor {
            debug!(
                checkpoint = checkpoint.progress(),
                floor, "Skipping checkpoint below resume floor"
            );
            return Ok(());
        }
        self.store
            .upsert_by_id(&job.id, &JobPatch::checkpoint(checkpoint))?;
        progress.report(ProgressEvent::Checkpoint(checkpoint));
        Ok(())
    }

    fn step_extract_text(&self, job: &Job) -> Result<String, PipelineError> {
        let text = self.extractor.extract_text(&job.document_path)?;
        debug!(chars = text.chars().count(), "Text extracted");
        Ok(text)
    }

    fn step_extract_structure(&self, text: &str) -> Result<Value, PipelineError> {
        Ok(self.intelligence.extract_structured(text)?)
    }

    fn step_score(&self, extracted: &Value) -> CompletenessReport {
        let report = scoring::assess(extracted);
        if !report.structurally_valid {
            warn!(gap = ?report.gaps.first(), "Extracted data failed structural validation");
        }
        report
    }

    fn write_completed(
        &self,
        job: &Job,
        extracted: Value,
        report: &CompletenessReport,
    ) -> Result<(), crate::error::StoreError> {
        self.store
            .upsert_by_id(&job.id, &JobPatch::completed(extracted, report))
    }

    fn fail(
        &self,
        job: &Job,
        error: PipelineError,
        progress: &dyn ProgressReporter,
    ) -> Result<JobOutcome, DispatchError> {
        let message = error.to_string();
        warn!(error = %message, "Job failed");

        self.store
            .upsert_by_id(&job.id, &JobPatch::failed(&message))
            .map_err(DispatchError::TerminalWrite)?;

        progress.report(ProgressEvent::Failed {
            error: message.clone(),
        });
        Ok(JobOutcome::Failed { error: message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::error::{ExtractionError, IntelligenceError, StoreError};
    use crate::job::JobRecord;
    use crate::pipeline::progress::NoopProgress;
    use crate::scoring::gaps;
    use crate::store::{JobFilter, JobPage, SqliteJobStore};
    use serde_json::json;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    /// `None` behaves like a scanned document without a text layer.
    struct FixedText(Option<String>);

    impl TextExtractor for FixedText {
        fn extract_text(&self, _path: &Path) -> Result<String, ExtractionError> {
            self.0.clone().ok_or(ExtractionError::EmptyContent)
        }
    }

    /// `None` behaves like a reply without content.
    struct FixedReply(Option<Value>);

    impl IntelligenceClient for FixedReply {
        fn extract_structured(&self, _text: &str) -> Result<Value, IntelligenceError> {
            self.0.clone().ok_or(IntelligenceError::EmptyResponse)
        }
    }

    /// Records every patch and can be told to reject a given write.
    struct RecordingStore {
        inner: SqliteJobStore,
        patches: Mutex<Vec<JobPatch>>,
        fail_write: Option<usize>,
    }

    impl RecordingStore {
        fn new(fail_write: Option<usize>) -> Self {
            Self {
                inner: SqliteJobStore::new(Database::open_in_memory().unwrap()),
                patches: Mutex::new(Vec::new()),
                fail_write,
            }
        }

        fn progress_writes(&self) -> Vec<u8> {
            self.patches
                .lock()
                .unwrap()
                .iter()
                .filter_map(|p| p.progress_percentage)
                .collect()
        }
    }

    impl JobStore for RecordingStore {
        fn insert(&self, record: &JobRecord) -> Result<(), StoreError> {
            self.inner.insert(record)
        }

        fn upsert_by_id(&self, job_id: &str, patch: &JobPatch) -> Result<(), StoreError> {
            let mut patches = self.patches.lock().unwrap();
            if self.fail_write == Some(patches.len()) {
                patches.push(JobPatch::default());
                return Err(StoreError::JobNotFound("simulated write failure".to_string()));
            }
            patches.push(patch.clone());
            self.inner.upsert_by_id(job_id, patch)
        }

        fn find_by_id(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError> {
            self.inner.find_by_id(job_id)
        }

        fn find_many(
            &self,
            filter: &JobFilter,
            page: u32,
            page_size: u32,
        ) -> Result<JobPage, StoreError> {
            self.inner.find_many(filter, page, page_size)
        }

        fn count_by_status(&self) -> Result<HashMap<JobStatus, u64>, StoreError> {
            self.inner.count_by_status()
        }
    }

    fn complete_contract() -> Value {
        json!({
            "parties": [
                { "legal_name": "Acme Corp", "role": "Customer" },
                { "legal_name": "Globex LLC", "role": "Vendor" }
            ],
            "financial_details": {
                "total_contract_value": 1000,
                "line_items": [{ "description": "Platform licence", "total_price": 1000 }]
            },
            "payment_structure": { "payment_terms": "Net 30", "payment_schedule": "Monthly" },
            "service_level_agreements": {
                "sla_details": [{ "metric": "Uptime", "commitment": "99.9%" }]
            },
            "account_info": { "billing_contact_email": "billing@acme.example" }
        })
    }

    fn setup(
        store: Arc<RecordingStore>,
        text: Option<&str>,
        reply: Option<Value>,
    ) -> (Pipeline, Job) {
        let job = Job::new("job-1", PathBuf::from("uploads/job-1.pdf"), "msa.pdf");
        store
            .insert(&JobRecord::pending(&job.id, &job.filename, job.document_path.clone()))
            .unwrap();
        let pipeline = Pipeline::new(
            store,
            Arc::new(FixedText(text.map(str::to_string))),
            Arc::new(FixedReply(reply)),
        );
        (pipeline, job)
    }

    #[test]
    fn test_successful_run_writes_checkpoints_in_order() {
        let store = Arc::new(RecordingStore::new(None));
        let (pipeline, job) = setup(
            Arc::clone(&store),
            Some("contract text"),
            Some(complete_contract()),
        );

        let outcome = pipeline.run(&job, &NoopProgress).unwrap();
        assert_eq!(
            outcome,
            JobOutcome::Completed {
                score: 100.0,
                gaps: vec![]
            }
        );
        assert_eq!(store.progress_writes(), vec![10, 30, 70, 90, 100]);

        let record = store.find_by_id("job-1").unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.confidence_score, Some(100.0));
        assert_eq!(record.gap_analysis, Some(vec![]));
        assert!(record.invariant_violation().is_none());
    }

    #[test]
    fn test_extraction_failure_resets_progress() {
        let store = Arc::new(RecordingStore::new(None));
        let (pipeline, job) = setup(
            Arc::clone(&store),
            None,
            Some(complete_contract()),
        );

        let outcome = pipeline.run(&job, &NoopProgress).unwrap();
        assert!(matches!(outcome, JobOutcome::Failed { .. }));
        assert_eq!(store.progress_writes(), vec![10, 30, 0]);

        let record = store.find_by_id("job-1").unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.progress_percentage, 0);
        assert_eq!(
            record.error_message.as_deref(),
            Some("Text extraction failed: Document is empty or text extraction failed")
        );
        assert!(record.extracted_data.is_none());
        assert!(record.invariant_violation().is_none());
    }

    #[test]
    fn test_intelligence_failure_after_seventy() {
        let store = Arc::new(RecordingStore::new(None));
        let (pipeline, job) = setup(
            Arc::clone(&store),
            Some("contract text"),
            None,
        );

        let outcome = pipeline.run(&job, &NoopProgress).unwrap();
        match outcome {
            JobOutcome::Failed { error } => assert!(error.starts_with("Structured extraction failed")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(store.progress_writes(), vec![10, 30, 70, 0]);
    }

    #[test]
    fn test_structurally_invalid_data_still_completes() {
        let store = Arc::new(RecordingStore::new(None));
        let (pipeline, job) = setup(
            Arc::clone(&store),
            Some("contract text"),
            Some(json!({ "parties": [{ "legal_name": 42 }] })),
        );

        let outcome = pipeline.run(&job, &NoopProgress).unwrap();
        match outcome {
            JobOutcome::Completed { score, gaps: found } => {
                assert_eq!(score, 0.0);
                assert_eq!(found.len(), 1);
                assert!(found[0].starts_with(gaps::STRUCTURAL_PARSE_FAILURE));
            }
            other => panic!("expected completion, got {:?}", other),
        }
    }

    #[test]
    fn test_checkpoint_write_failure_becomes_failed_record() {
        // Second write (progress 30) is rejected.
        let store = Arc::new(RecordingStore::new(Some(1)));
        let (pipeline, job) = setup(
            Arc::clone(&store),
            Some("contract text"),
            Some(complete_contract()),
        );

        let outcome = pipeline.run(&job, &NoopProgress).unwrap();
        match outcome {
            JobOutcome::Failed { error } => assert!(error.starts_with("Storage failed")),
            other => panic!("expected failure, got {:?}", other),
        }
        let record = store.find_by_id("job-1").unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.progress_percentage, 0);
    }

    #[test]
    fn test_failed_terminal_write_is_dispatch_error() {
        // Writes: 10, 30 (then extraction fails), failed-write rejected.
        let store = Arc::new(RecordingStore::new(Some(2)));
        let (pipeline, job) = setup(
            Arc::clone(&store),
            None,
            Some(complete_contract()),
        );

        let result = pipeline.run(&job, &NoopProgress);
        assert!(matches!(result, Err(DispatchError::TerminalWrite(_))));

        let record = store.find_by_id("job-1").unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Processing);
        assert_eq!(record.progress_percentage, 30);
    }

    #[test]
    fn test_terminal_record_is_not_touched_again() {
        let store = Arc::new(RecordingStore::new(None));
        let (pipeline, job) = setup(
            Arc::clone(&store),
            Some("contract text"),
            Some(complete_contract()),
        );

        pipeline.run(&job, &NoopProgress).unwrap();
        let before = store.find_by_id("job-1").unwrap().unwrap();
        let writes = store.progress_writes().len();

        let outcome = pipeline.run(&job, &NoopProgress).unwrap();
        assert_eq!(outcome, JobOutcome::AlreadyTerminal(JobStatus::Completed));
        assert_eq!(store.progress_writes().len(), writes);
        assert_eq!(store.find_by_id("job-1").unwrap().unwrap(), before);
    }

    #[test]
    fn test_resumed_job_never_moves_progress_backwards() {
        let store = Arc::new(RecordingStore::new(None));
        let (pipeline, job) = setup(
            Arc::clone(&store),
            Some("contract text"),
            Some(complete_contract()),
        );
        store
            .inner
            .upsert_by_id(&job.id, &JobPatch::checkpoint(Checkpoint::ExtractingStructure))
            .unwrap();

        pipeline.run(&job, &NoopProgress).unwrap();
        assert_eq!(store.progress_writes(), vec![70, 90, 100]);
    }

    #[test]
    fn test_unknown_job() {
        let store = Arc::new(RecordingStore::new(None));
        let pipeline = Pipeline::new(
            store,
            Arc::new(FixedText(Some("text".to_string()))),
            Arc::new(FixedReply(Some(json!({})))),
        );
        let job = Job::new("missing", PathBuf::from("uploads/missing.pdf"), "x.pdf");

        let result = pipeline.run(&job, &NoopProgress);
        assert!(matches!(result, Err(DispatchError::UnknownJob(_))));
    }

    #[test]
    fn test_fail_unless_terminal() {
        let store = Arc::new(RecordingStore::new(None));
        let (pipeline, job) = setup(
            Arc::clone(&store),
            Some("contract text"),
            Some(complete_contract()),
        );

        assert!(pipeline.fail_unless_terminal(&job.id, "Dispatch failed").unwrap());
        assert!(!pipeline.fail_unless_terminal(&job.id, "Dispatch failed again").unwrap());

        let record = store.find_by_id("job-1").unwrap().unwrap();
        assert_eq!(record.error_message.as_deref(), Some("Dispatch failed"));
    }
}
