//! Row-level SQL for the `contracts` table.
//!
//! Rows carry plain column values; JSON columns (`extracted_data`,
//! `gap_analysis`) are stored as text. Conversion to domain types lives in
//! the store layer.

use rusqlite::types::{ToSql, ToSqlOutput};
use rusqlite::{params, Row};

use super::{Database, DatabaseError};

#[derive(Debug, Clone, PartialEq)]
pub struct ContractRow {
    pub id: String,
    pub filename: String,
    pub storage_path: String,
    pub status: String,
    pub progress_percentage: i64,
    pub extracted_data: Option<String>,
    pub confidence_score: Option<f64>,
    pub gap_analysis: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ContractRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            filename: row.get("filename")?,
            storage_path: row.get("storage_path")?,
            status: row.get("status")?,
            progress_percentage: row.get("progress_percentage")?,
            extracted_data: row.get("extracted_data")?,
            confidence_score: row.get("confidence_score")?,
            gap_analysis: row.get("gap_analysis")?,
            error_message: row.get("error_message")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// New value for one nullable column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Text(String),
    Real(f64),
    Null,
}

impl ToSql for ColumnValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            ColumnValue::Text(s) => ToSqlOutput::from(s.as_str()),
            ColumnValue::Real(n) => ToSqlOutput::from(*n),
            ColumnValue::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
        })
    }
}

/// Column assignments for a partial update. Only listed columns are
/// written; `updated_at` is always refreshed.
#[derive(Debug, Clone, Default)]
pub struct ContractUpdate {
    pub status: Option<String>,
    pub progress_percentage: Option<i64>,
    pub extracted_data: Option<ColumnValue>,
    pub confidence_score: Option<ColumnValue>,
    pub gap_analysis: Option<ColumnValue>,
    pub error_message: Option<ColumnValue>,
}

/// Listing filter. String bounds compare lexicographically, which matches
/// chronological order for the fixed-width RFC 3339 timestamps we store.
#[derive(Debug, Default, Clone)]
pub struct ContractFilter {
    pub status: Option<String>,
    /// Case-insensitive substring of the original filename.
    pub filename_contains: Option<String>,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
    pub created_from: Option<String>,
    pub created_to: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

pub fn insert(db: &Database, row: &ContractRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO contracts (id, filename, storage_path, status, progress_percentage,
             extracted_data, confidence_score, gap_analysis, error_message, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                row.id,
                row.filename,
                row.storage_path,
                row.status,
                row.progress_percentage,
                row.extracted_data,
                row.confidence_score,
                row.gap_analysis,
                row.error_message,
                row.created_at,
                row.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Applies `update` to the row with `id` in a single statement. Returns
/// false when no such row exists.
pub fn update_fields(
    db: &Database,
    id: &str,
    update: &ContractUpdate,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    let mut assignments: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(id.to_string())];

    let mut assign = |column: &str, value: Box<dyn ToSql>| {
        values.push(value);
        assignments.push(format!("{column} = ?{}", values.len()));
    };

    if let Some(ref status) = update.status {
        assign("status", Box::new(status.clone()));
    }
    if let Some(progress) = update.progress_percentage {
        assign("progress_percentage", Box::new(progress));
    }
    if let Some(ref value) = update.extracted_data {
        assign("extracted_data", Box::new(value.clone()));
    }
    if let Some(ref value) = update.confidence_score {
        assign("confidence_score", Box::new(value.clone()));
    }
    if let Some(ref value) = update.gap_analysis {
        assign("gap_analysis", Box::new(value.clone()));
    }
    if let Some(ref value) = update.error_message {
        assign("error_message", Box::new(value.clone()));
    }
    assign("updated_at", Box::new(updated_at.to_string()));

    let sql = format!(
        "UPDATE contracts SET {} WHERE id = ?1",
        assignments.join(", ")
    );

    db.with_conn(|conn| {
        let params_ref: Vec<&dyn ToSql> = values.iter().map(|p| p.as_ref()).collect();
        let changed = conn.execute(&sql, params_ref.as_slice())?;
        Ok(changed > 0)
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<ContractRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM contracts WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], ContractRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Filtered, newest-first listing. Returns (rows, total matching rows).
pub fn query(
    db: &Database,
    filter: &ContractFilter,
) -> Result<(Vec<ContractRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(ref status) = filter.status {
            conditions.push(format!("status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.clone()));
        }
        if let Some(ref needle) = filter.filename_contains {
            conditions.push(format!(
                "filename LIKE ?{} ESCAPE '\\'",
                param_values.len() + 1
            ));
            param_values.push(Box::new(format!("%{}%", escape_like(needle))));
        }
        if let Some(min) = filter.min_score {
            conditions.push(format!("confidence_score >= ?{}", param_values.len() + 1));
            param_values.push(Box::new(min));
        }
        if let Some(max) = filter.max_score {
            conditions.push(format!("confidence_score <= ?{}", param_values.len() + 1));
            param_values.push(Box::new(max));
        }
        if let Some(ref from) = filter.created_from {
            conditions.push(format!("created_at >= ?{}", param_values.len() + 1));
            param_values.push(Box::new(from.clone()));
        }
        if let Some(ref to) = filter.created_to {
            conditions.push(format!("created_at <= ?{}", param_values.len() + 1));
            param_values.push(Box::new(to.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM contracts {}", where_clause);
        let params_ref: Vec<&dyn ToSql> = param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        let query_sql = format!(
            "SELECT * FROM contracts {} ORDER BY created_at DESC, id DESC LIMIT ?{} OFFSET ?{}",
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn ToSql> = param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<ContractRow> = stmt
            .query_map(params_ref.as_slice(), ContractRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}

pub fn count_by_status(db: &Database, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM contracts WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
