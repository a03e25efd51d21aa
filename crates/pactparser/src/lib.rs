pub mod broadcast;
pub mod config;
pub mod contract;
pub mod db;
pub mod error;
pub mod intelligence;
pub mod job;
pub mod pipeline;
pub mod processor;
pub mod sanitize;
pub mod scoring;
pub mod secrets;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod worker;

pub use broadcast::{JobProgressBroadcaster, JobProgressEvent};
pub use config::{load_config, Config};
pub use contract::ExtractedContract;
pub use error::{
    ConfigError, ExtractionError, IntelligenceError, PactParserError, Result, ServiceError,
    StoreError, WorkerError,
};
pub use intelligence::{ChatCompletionsClient, IntelligenceClient};
pub use job::{Checkpoint, JobPatch, JobRecord, JobStatus};
pub use pipeline::{JobOutcome, Pipeline};
pub use processor::{ProcessorRegistry, TextExtractor};
pub use scoring::{assess, CompletenessReport};
pub use service::ContractService;
pub use store::{JobFilter, JobStore, SqliteJobStore};
pub use worker::{Dispatcher, Job, JobResult, WorkerPool};
