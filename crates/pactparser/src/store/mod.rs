//! Job Store: the persistence boundary for job records.
//!
//! The orchestrator only ever writes through [`JobStore::upsert_by_id`],
//! which applies a field-level [`JobPatch`] to one record. The SQLite
//! implementation turns every patch into a single `UPDATE`, so concurrent
//! writes to different jobs cannot interleave and duplicate writes to the
//! same job converge.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::db::contract_repo::{self, ColumnValue, ContractFilter, ContractRow, ContractUpdate};
use crate::db::{Database, DatabaseError};
use crate::error::StoreError;
use crate::job::{JobPatch, JobRecord, JobStatus, Patch};

/// Listing filter. All conditions are ANDed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    /// Case-insensitive substring of the original filename.
    pub filename_contains: Option<String>,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

/// One page of a listing, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct JobPage {
    pub items: Vec<JobRecord>,
    /// Matching records across all pages.
    pub total: u64,
}

pub trait JobStore: Send + Sync {
    /// Persists a new record. Fails if the id already exists.
    fn insert(&self, record: &JobRecord) -> Result<(), StoreError>;

    /// Applies `patch` to the record with `job_id`, refreshing `updated_at`.
    /// Returns [`StoreError::JobNotFound`] when there is no such record.
    fn upsert_by_id(&self, job_id: &str, patch: &JobPatch) -> Result<(), StoreError>;

    fn find_by_id(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError>;

    /// Filtered listing sorted by `created_at` descending. `page` is 1-based.
    fn find_many(&self, filter: &JobFilter, page: u32, page_size: u32)
        -> Result<JobPage, StoreError>;

    fn count_by_status(&self) -> Result<HashMap<JobStatus, u64>, StoreError>;
}

/// Fixed-width UTC timestamps so that text comparison in SQL is
/// chronological.
pub(crate) fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(id: &str, column: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            id: id.to_string(),
            reason: format!("{column} '{raw}': {e}"),
        })
}

// ─── SQLite ─────────────────────────────────────────────────────────────────

/// [`JobStore`] backed by the `contracts` table.
#[derive(Clone)]
pub struct SqliteJobStore {
    db: Database,
}

impl SqliteJobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn to_row(record: &JobRecord) -> Result<ContractRow, StoreError> {
        Ok(ContractRow {
            id: record.id.clone(),
            filename: record.filename.clone(),
            storage_path: record.storage_path.to_string_lossy().into_owned(),
            status: record.status.as_str().to_string(),
            progress_percentage: i64::from(record.progress_percentage),
            extracted_data: record
                .extracted_data
                .as_ref()
                .map(|v| encode_json("extracted_data", v))
                .transpose()?,
            confidence_score: record.confidence_score,
            gap_analysis: record
                .gap_analysis
                .as_ref()
                .map(|g| encode_json("gap_analysis", g))
                .transpose()?,
            error_message: record.error_message.clone(),
            created_at: format_timestamp(record.created_at),
            updated_at: format_timestamp(record.updated_at),
        })
    }

    fn from_row(row: ContractRow) -> Result<JobRecord, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            id: row.id.clone(),
            reason,
        };

        let status: JobStatus = row.status.parse().map_err(|e| corrupt(format!("{e}")))?;
        let progress_percentage = u8::try_from(row.progress_percentage)
            .ok()
            .filter(|p| *p <= 100)
            .ok_or_else(|| corrupt(format!("progress {}", row.progress_percentage)))?;
        let extracted_data = row
            .extracted_data
            .as_deref()
            .map(serde_json::from_str::<Value>)
            .transpose()
            .map_err(|e| corrupt(format!("extracted_data: {e}")))?;
        let gap_analysis = row
            .gap_analysis
            .as_deref()
            .map(serde_json::from_str::<Vec<String>>)
            .transpose()
            .map_err(|e| corrupt(format!("gap_analysis: {e}")))?;
        let created_at = parse_timestamp(&row.id, "created_at", &row.created_at)?;
        let updated_at = parse_timestamp(&row.id, "updated_at", &row.updated_at)?;

        Ok(JobRecord {
            id: row.id,
            filename: row.filename,
            storage_path: PathBuf::from(row.storage_path),
            status,
            progress_percentage,
            extracted_data,
            confidence_score: row.confidence_score,
            gap_analysis,
            error_message: row.error_message,
            created_at,
            updated_at,
        })
    }

    fn to_update(patch: &JobPatch) -> Result<ContractUpdate, StoreError> {
        Ok(ContractUpdate {
            status: patch.status.map(|s| s.as_str().to_string()),
            progress_percentage: patch.progress_percentage.map(i64::from),
            extracted_data: column(&patch.extracted_data, |v| {
                Ok(ColumnValue::Text(encode_json("extracted_data", v)?))
            })?,
            confidence_score: column(&patch.confidence_score, |n| Ok(ColumnValue::Real(*n)))?,
            gap_analysis: column(&patch.gap_analysis, |g| {
                Ok(ColumnValue::Text(encode_json("gap_analysis", g)?))
            })?,
            error_message: column(&patch.error_message, |m| Ok(ColumnValue::Text(m.clone())))?,
        })
    }
}

fn encode_json<T: serde::Serialize>(column: &'static str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value)
        .map_err(|source| StoreError::Database(DatabaseError::Json { column, source }))
}

fn column<T>(
    patch: &Patch<T>,
    encode: impl Fn(&T) -> Result<ColumnValue, StoreError>,
) -> Result<Option<ColumnValue>, StoreError> {
    match patch {
        Patch::Keep => Ok(None),
        Patch::Set(value) => encode(value).map(Some),
        Patch::Clear => Ok(Some(ColumnValue::Null)),
    }
}

impl JobStore for SqliteJobStore {
    fn insert(&self, record: &JobRecord) -> Result<(), StoreError> {
        contract_repo::insert(&self.db, &Self::to_row(record)?)?;
        log::debug!("Inserted job {} ({})", record.id, record.status);
        Ok(())
    }

    fn upsert_by_id(&self, job_id: &str, patch: &JobPatch) -> Result<(), StoreError> {
        let update = Self::to_update(patch)?;
        let updated_at = format_timestamp(Utc::now());

        if !contract_repo::update_fields(&self.db, job_id, &update, &updated_at)? {
            return Err(StoreError::JobNotFound(job_id.to_string()));
        }

        log::debug!(
            "Updated job {}: status={:?} progress={:?}",
            job_id,
            patch.status,
            patch.progress_percentage
        );
        Ok(())
    }

    fn find_by_id(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError> {
        contract_repo::find_by_id(&self.db, job_id)?
            .map(Self::from_row)
            .transpose()
    }

    fn find_many(
        &self,
        filter: &JobFilter,
        page: u32,
        page_size: u32,
    ) -> Result<JobPage, StoreError> {
        let page = page.max(1);
        let page_size = page_size.max(1);

        let row_filter = ContractFilter {
            status: filter.status.map(|s| s.as_str().to_string()),
            filename_contains: filter.filename_contains.clone(),
            min_score: filter.min_score,
            max_score: filter.max_score,
            created_from: filter.created_after.map(format_timestamp),
            created_to: filter.created_before.map(format_timestamp),
            limit: Some(u64::from(page_size)),
            offset: Some(u64::from(page - 1) * u64::from(page_size)),
        };

        let (rows, total) = contract_repo::query(&self.db, &row_filter)?;
        let items = rows
            .into_iter()
            .map(Self::from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(JobPage { items, total })
    }

    fn count_by_status(&self) -> Result<HashMap<JobStatus, u64>, StoreError> {
        JobStatus::ALL
            .into_iter()
            .map(|status| -> Result<_, StoreError> {
                let count = contract_repo::count_by_status(&self.db, status.as_str())?;
                Ok((status, count))
            })
            .collect()
    }
}
