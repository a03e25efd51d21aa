//! Test harness for isolated end-to-end runs.
//!
//! Each harness owns a temporary directory holding the SQLite database, the
//! uploads directory and any input documents, so tests never share state.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use pactparser::broadcast::JobProgressBroadcaster;
use pactparser::db::Database;
use pactparser::intelligence::IntelligenceClient;
use pactparser::job::JobRecord;
use pactparser::pipeline::Pipeline;
use pactparser::processor::pdf::render_text_pdf;
use pactparser::processor::ProcessorRegistry;
use pactparser::service::ContractService;
use pactparser::store::{JobStore, SqliteJobStore};
use pactparser::worker::{Dispatcher, JobResult, RetryPolicy, WorkerPool};

/// Upper bound for any single wait on the worker pool.
pub const RESULT_TIMEOUT: Duration = Duration::from_secs(20);

pub struct TestHarness {
    temp_dir: TempDir,
    pub input_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub db_path: PathBuf,
    pub store: Arc<SqliteJobStore>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let input_dir = base.join("input");
        let uploads_dir = base.join("uploads");
        std::fs::create_dir_all(&input_dir).expect("Failed to create input dir");

        let db_path = base.join("data").join("pactparser.db");
        let db = Database::open(&db_path).expect("Failed to open database");

        Self {
            temp_dir,
            input_dir,
            uploads_dir,
            db_path,
            store: Arc::new(SqliteJobStore::new(db)),
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// A PDF with one page per entry of `pages`.
    pub fn pdf_bytes(&self, pages: &[&str]) -> Vec<u8> {
        render_text_pdf(pages).expect("Failed to render PDF")
    }

    pub fn write_pdf(&self, filename: &str, pages: &[&str]) -> PathBuf {
        let path = self.input_dir.join(filename);
        std::fs::write(&path, self.pdf_bytes(pages)).expect("Failed to write input PDF");
        path
    }

    pub fn store(&self) -> Arc<dyn JobStore> {
        Arc::clone(&self.store) as Arc<dyn JobStore>
    }

    /// Pipeline with the real text extractor and the given model.
    pub fn pipeline(&self, model: Arc<dyn IntelligenceClient>) -> Arc<Pipeline> {
        Arc::new(Pipeline::new(
            self.store(),
            Arc::new(ProcessorRegistry::new()),
            model,
        ))
    }

    pub fn pool(
        &self,
        pipeline: Arc<Pipeline>,
        workers: usize,
        retry: RetryPolicy,
        broadcaster: Option<JobProgressBroadcaster>,
    ) -> Arc<WorkerPool> {
        Arc::new(
            WorkerPool::with_progress(pipeline, workers, retry, broadcaster)
                .expect("Failed to start worker pool"),
        )
    }

    pub fn service(&self, dispatcher: Arc<dyn Dispatcher>) -> ContractService {
        ContractService::new(self.store(), dispatcher, &self.uploads_dir)
    }

    pub fn record(&self, job_id: &str) -> JobRecord {
        self.store
            .find_by_id(job_id)
            .expect("Failed to read job store")
            .expect("Job record missing")
    }

    /// Opens a second handle on the same database file.
    pub fn reopen_store(&self) -> SqliteJobStore {
        let db = Database::open(&self.db_path).expect("Failed to reopen database");
        SqliteJobStore::new(db)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Fast retries so exhaustion tests finish quickly.
pub fn quick_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        backoff: Duration::from_millis(5),
    }
}

/// Collects `count` results, failing the test if the pool stalls.
pub fn wait_for_results(pool: &WorkerPool, count: usize) -> Vec<JobResult> {
    let deadline = Instant::now() + RESULT_TIMEOUT;
    let mut results = Vec::with_capacity(count);

    while results.len() < count {
        let remaining = deadline.saturating_duration_since(Instant::now());
        assert!(
            !remaining.is_zero(),
            "timed out with {} of {} results",
            results.len(),
            count
        );
        if let Some(result) = pool.recv_result_timeout(remaining.min(Duration::from_millis(200))) {
            results.push(result);
        }
    }

    results
}

pub fn stop(pool: &WorkerPool) {
    pool.shutdown();
    pool.wait();
}
