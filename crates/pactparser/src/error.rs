use std::path::PathBuf;
use thiserror::Error;

use crate::job::JobStatus;

#[derive(Error, Debug)]
pub enum PactParserError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Intelligence error: {0}")]
    Intelligence(#[from] IntelligenceError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] crate::telemetry::TelemetryError),

    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Faults of the text-extraction collaborator.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Could not read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not read PDF: {0}")]
    Pdf(String),

    #[error("Document is empty or text extraction failed")]
    EmptyContent,
}

/// Faults of the intelligence collaborator.
#[derive(Error, Debug)]
pub enum IntelligenceError {
    #[error("Intelligence service request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Intelligence service returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Intelligence service response contained no message content")]
    EmptyResponse,

    #[error("Failed to parse structured data from response: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("Intelligence service is not configured: {0}")]
    NotConfigured(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] crate::db::DatabaseError),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Corrupt job record '{id}': {reason}")]
    Corrupt { id: String, reason: String },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker pool is shutting down")]
    ShuttingDown,

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,
}

/// Errors surfaced to callers of the submission and query surface.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid file type '{0}'. Only PDF documents are accepted.")]
    UnsupportedFileType(String),

    #[error("File '{0}' is not a valid PDF document")]
    InvalidDocument(String),

    #[error("Contract not found: {0}")]
    NotFound(String),

    #[error("Contract is still {0}. Data not available.")]
    NotReady(JobStatus),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Failed to store upload '{path}': {source}")]
    StoreUpload {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to dispatch job: {0}")]
    Dispatch(#[from] WorkerError),
}

pub type Result<T> = std::result::Result<T, PactParserError>;
