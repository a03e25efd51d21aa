//! Submission and query surface.
//!
//! Submission stores the upload, creates a `pending` record and hands the
//! job to the dispatcher without waiting for any processing. Queries only
//! read the job store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::ServiceError;
use crate::job::{JobPatch, JobRecord, JobStatus};
use crate::sanitize;
use crate::store::{JobFilter, JobStore};
use crate::worker::{Dispatcher, Job};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submission {
    pub job_id: String,
    pub filename: String,
    pub status: JobStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusView {
    pub job_id: String,
    pub status: JobStatus,
    pub progress_percentage: u8,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractSummary {
    pub job_id: String,
    pub filename: String,
    pub status: JobStatus,
    pub confidence_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractList {
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
    pub items: Vec<ContractSummary>,
}

/// A stored upload ready to be streamed back.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub path: PathBuf,
    pub filename: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub filter: JobFilter,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

pub struct ContractService {
    store: Arc<dyn JobStore>,
    dispatcher: Arc<dyn Dispatcher>,
    uploads_dir: PathBuf,
}

impl ContractService {
    pub fn new(
        store: Arc<dyn JobStore>,
        dispatcher: Arc<dyn Dispatcher>,
        uploads_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            uploads_dir: uploads_dir.into(),
        }
    }

    pub fn submit(&self, filename: &str, bytes: &[u8]) -> Result<Submission, ServiceError> {
        let filename = sanitize::redact_path(Path::new(filename));

        let mime = mime_guess::from_path(&filename).first_or_octet_stream();
        if mime != mime_guess::mime::APPLICATION_PDF {
            return Err(ServiceError::UnsupportedFileType(mime.to_string()));
        }
        if !bytes.starts_with(PDF_MAGIC) {
            return Err(ServiceError::InvalidDocument(filename));
        }

        let job_id = uuid::Uuid::new_v4().to_string();
        let storage_path = self.uploads_dir.join(format!("{}.pdf", job_id));
        self.write_upload(&storage_path, bytes)?;

        let record = JobRecord::pending(&job_id, &filename, storage_path.clone());
        self.store.insert(&record)?;

        let job = Job::new(&job_id, storage_path, &filename);
        if let Err(e) = self.dispatcher.enqueue(job) {
            warn!(job_id = %job_id, "Dispatch failed: {}", e);
            if let Err(write_err) = self
                .store
                .upsert_by_id(&job_id, &JobPatch::failed(format!("Dispatch failed: {}", e)))
            {
                warn!(job_id = %job_id, "Could not mark undispatched job failed: {}", write_err);
            }
            return Err(e.into());
        }

        info!(job_id = %job_id, filename = %filename, bytes = bytes.len(), "Contract submitted");

        Ok(Submission {
            job_id,
            filename,
            status: record.status,
        })
    }

    pub fn status(&self, job_id: &str) -> Result<StatusView, ServiceError> {
        let record = self.find(job_id)?;
        Ok(StatusView {
            job_id: record.id,
            status: record.status,
            progress_percentage: record.progress_percentage,
            error_message: record.error_message,
        })
    }

    /// The full record, available only once the job completed.
    pub fn contract(&self, job_id: &str) -> Result<JobRecord, ServiceError> {
        let record = self.find(job_id)?;
        if record.status != JobStatus::Completed {
            return Err(ServiceError::NotReady(record.status));
        }
        Ok(record)
    }

    pub fn list(&self, query: &ListQuery) -> Result<ContractList, ServiceError> {
        let page = query.page.unwrap_or(DEFAULT_PAGE);
        let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        validate_query(&query.filter, page, page_size)?;

        let result = self.store.find_many(&query.filter, page, page_size)?;
        let items = result
            .items
            .into_iter()
            .map(|record| ContractSummary {
                job_id: record.id,
                filename: record.filename,
                status: record.status,
                confidence_score: record.confidence_score,
                created_at: record.created_at,
            })
            .collect();

        Ok(ContractList {
            total_count: result.total,
            page,
            page_size,
            items,
        })
    }

    pub fn document(&self, job_id: &str) -> Result<StoredDocument, ServiceError> {
        let record = self.find(job_id)?;
        if !record.storage_path.is_file() {
            return Err(ServiceError::NotFound(format!(
                "document for contract {}",
                job_id
            )));
        }

        let mime_type = mime_guess::from_path(&record.filename)
            .first_or_octet_stream()
            .to_string();
        Ok(StoredDocument {
            path: record.storage_path,
            filename: record.filename,
            mime_type,
        })
    }

    fn find(&self, job_id: &str) -> Result<JobRecord, ServiceError> {
        self.store
            .find_by_id(job_id)?
            .ok_or_else(|| ServiceError::NotFound(job_id.to_string()))
    }

    fn write_upload(&self, path: &Path, bytes: &[u8]) -> Result<(), ServiceError> {
        let to_error = |source: std::io::Error| ServiceError::StoreUpload {
            path: path.to_path_buf(),
            source,
        };
        std::fs::create_dir_all(&self.uploads_dir).map_err(to_error)?;
        std::fs::write(path, bytes).map_err(to_error)
    }
}

fn validate_query(filter: &JobFilter, page: u32, page_size: u32) -> Result<(), ServiceError> {
    if page < 1 {
        return Err(ServiceError::InvalidQuery("page must be at least 1".to_string()));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(ServiceError::InvalidQuery(format!(
            "page_size must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }

    for score in [filter.min_score, filter.max_score].into_iter().flatten() {
        if !(0.0..=100.0).contains(&score) {
            return Err(ServiceError::InvalidQuery(format!(
                "score bound {} is outside 0-100",
                score
            )));
        }
    }
    if let (Some(min), Some(max)) = (filter.min_score, filter.max_score) {
        if min > max {
            return Err(ServiceError::InvalidQuery(
                "min_score is greater than max_score".to_string(),
            ));
        }
    }
    if let (Some(from), Some(to)) = (filter.created_after, filter.created_before) {
        if from > to {
            return Err(ServiceError::InvalidQuery(
                "created_after is later than created_before".to_string(),
            ));
        }
    }
    Ok(())
}
