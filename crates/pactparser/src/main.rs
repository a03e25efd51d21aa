use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use pactparser::broadcast::JobProgressBroadcaster;
use pactparser::config::{load_config, validate_config, Config};
use pactparser::db::Database;
use pactparser::error::{ConfigError, PactParserError, Result, WorkerError};
use pactparser::intelligence::ChatCompletionsClient;
use pactparser::job::JobStatus;
use pactparser::pipeline::Pipeline;
use pactparser::processor::ProcessorRegistry;
use pactparser::service::{ContractService, ListQuery};
use pactparser::store::{JobFilter, JobStore, SqliteJobStore};
use pactparser::telemetry;
use pactparser::worker::{Dispatcher, Job, JobResult, RetryPolicy, WorkerPool};

#[derive(Parser, Debug)]
#[command(
    name = "pactparser",
    about = "Extract, structure and score commercial contracts",
    version
)]
struct Cli {
    /// Path to a JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit PDF contracts and wait until each reaches a terminal state
    Process(ProcessArgs),
    /// Show the status and progress of a job
    Status { job_id: String },
    /// Show the extracted data of a completed contract
    Show { job_id: String },
    /// List contracts, newest first
    List(ListArgs),
    /// Print the stored location of an uploaded document
    Document { job_id: String },
}

#[derive(Args, Debug)]
struct ProcessArgs {
    /// PDF files to submit
    #[arg(required = true)]
    files: Vec<PathBuf>,
    /// Print per-checkpoint progress events on stderr
    #[arg(long)]
    progress: bool,
}

#[derive(Args, Debug)]
struct ListArgs {
    #[arg(long)]
    status: Option<JobStatus>,
    /// Case-insensitive filename substring
    #[arg(long)]
    filename: Option<String>,
    #[arg(long)]
    min_score: Option<f64>,
    #[arg(long)]
    max_score: Option<f64>,
    /// RFC 3339 timestamp
    #[arg(long)]
    created_after: Option<DateTime<Utc>>,
    /// RFC 3339 timestamp
    #[arg(long)]
    created_before: Option<DateTime<Utc>>,
    #[arg(long)]
    page: Option<u32>,
    #[arg(long)]
    page_size: Option<u32>,
}

/// Query commands never enqueue work.
struct ReadOnly;

impl Dispatcher for ReadOnly {
    fn enqueue(&self, _job: Job) -> std::result::Result<(), WorkerError> {
        Err(WorkerError::ShuttingDown)
    }
}

fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let config = Config::default();
            validate_config(&config)?;
            config
        }
    };

    telemetry::init(&config.log)?;
    info!("pactparser v{}", env!("CARGO_PKG_VERSION"));

    let store = open_store(&config)?;

    match cli.command {
        Command::Process(args) => process(&config, store, args),
        Command::Status { job_id } => {
            let service = ContractService::new(store, Arc::new(ReadOnly), config.uploads_path());
            print_json(&service.status(&job_id)?)
        }
        Command::Show { job_id } => {
            let service = ContractService::new(store, Arc::new(ReadOnly), config.uploads_path());
            print_json(&service.contract(&job_id)?)
        }
        Command::List(args) => {
            let service = ContractService::new(store, Arc::new(ReadOnly), config.uploads_path());
            let query = ListQuery {
                filter: JobFilter {
                    status: args.status,
                    filename_contains: args.filename,
                    min_score: args.min_score,
                    max_score: args.max_score,
                    created_after: args.created_after,
                    created_before: args.created_before,
                },
                page: args.page,
                page_size: args.page_size,
            };
            print_json(&service.list(&query)?)
        }
        Command::Document { job_id } => {
            let service = ContractService::new(store, Arc::new(ReadOnly), config.uploads_path());
            let document = service.document(&job_id)?;
            println!(
                "{}\t{}\t{}",
                document.path.display(),
                document.mime_type,
                document.filename
            );
            Ok(())
        }
    }
}

fn open_store(config: &Config) -> Result<Arc<dyn JobStore>> {
    let path = config.resolved_database_path().ok_or_else(|| ConfigError::Validation {
        message: "Could not determine a database location; set database_path".to_string(),
    })?;
    let db = Database::open(&path)?;
    Ok(Arc::new(SqliteJobStore::new(db)))
}

fn process(config: &Config, store: Arc<dyn JobStore>, args: ProcessArgs) -> Result<()> {
    let api_key = config.intelligence.api_key_source().resolve()?;
    let intelligence = ChatCompletionsClient::from_config(&config.intelligence, api_key)?;

    let pipeline = Arc::new(Pipeline::new(
        Arc::clone(&store),
        Arc::new(ProcessorRegistry::new()),
        Arc::new(intelligence),
    ));

    let broadcaster = JobProgressBroadcaster::default();
    let printer = args.progress.then(|| spawn_progress_printer(&broadcaster));

    let pool = Arc::new(WorkerPool::with_progress(
        pipeline,
        config.worker_count,
        RetryPolicy::from_config(&config.dispatch),
        Some(broadcaster.clone()),
    )?);

    {
        let pool = Arc::clone(&pool);
        if let Err(e) = ctrlc::set_handler(move || pool.shutdown()) {
            warn!("Could not install Ctrl-C handler: {}", e);
        }
    }

    let service = ContractService::new(
        store,
        Arc::clone(&pool) as Arc<dyn Dispatcher>,
        config.uploads_path(),
    );

    let mut submitted = 0usize;
    let mut rejected = 0usize;
    for path in &args.files {
        let bytes = std::fs::read(path).map_err(|source| PactParserError::Io {
            path: path.clone(),
            source,
        })?;
        match service.submit(&display_name(path), &bytes) {
            Ok(submission) => {
                info!(job_id = %submission.job_id, "Queued {}", submission.filename);
                submitted += 1;
            }
            Err(e) => {
                warn!("Rejected {}: {}", path.display(), e);
                rejected += 1;
            }
        }
    }

    let mut results: Vec<JobResult> = Vec::with_capacity(submitted);
    while results.len() < submitted && !pool.is_shutdown() {
        if let Some(result) = pool.recv_result_timeout(Duration::from_millis(200)) {
            results.push(result);
        }
    }

    pool.shutdown();
    pool.wait();
    while let Some(result) = pool.try_recv_result() {
        results.push(result);
    }
    drop(broadcaster);
    if let Some(handle) = printer {
        let _ = handle.join();
    }

    let unfinished = submitted - results.len();
    if unfinished > 0 {
        warn!("{} job(s) left pending after interrupt", unfinished);
    }

    print_json(&ProcessSummary {
        submitted,
        rejected,
        unfinished,
        results: results.iter().map(ResultLine::from).collect(),
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Streams progress events to stderr until every sender is gone.
fn spawn_progress_printer(broadcaster: &JobProgressBroadcaster) -> std::thread::JoinHandle<()> {
    let mut rx = broadcaster.subscribe();
    std::thread::spawn(move || loop {
        match rx.blocking_recv() {
            Ok(event) => eprintln!(
                "[{:>3}%] {} {} {}",
                event.progress_percentage, event.filename, event.status, event.message
            ),
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                eprintln!("(skipped {} progress events)", skipped);
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    })
}

#[derive(Serialize)]
struct ProcessSummary {
    submitted: usize,
    rejected: usize,
    unfinished: usize,
    results: Vec<ResultLine>,
}

#[derive(Serialize)]
struct ResultLine {
    job_id: String,
    filename: String,
    status: Option<JobStatus>,
    confidence_score: Option<f64>,
    gap_count: usize,
    error: Option<String>,
    attempts: u32,
}

impl From<&JobResult> for ResultLine {
    fn from(result: &JobResult) -> Self {
        Self {
            job_id: result.job_id.clone(),
            filename: result.filename.clone(),
            status: result.status,
            confidence_score: result.confidence_score,
            gap_count: result.gap_count,
            error: result.error.clone(),
            attempts: result.attempts,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
