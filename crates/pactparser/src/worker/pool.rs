use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info, warn};

use crate::broadcast::JobProgressBroadcaster;
use crate::config::DispatchConfig;
use crate::error::WorkerError;
use crate::job::JobStatus;
use crate::pipeline::{
    BroadcastProgress, DispatchError, JobOutcome, NoopProgress, Pipeline, ProgressEvent,
    ProgressReporter,
};
use crate::worker::job::{Job, JobResult};
use crate::worker::Dispatcher;

/// Re-invocation policy for dispatch faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Re-invocations after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each one after.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.backoff.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&DispatchConfig::default())
    }
}

pub struct WorkerPool {
    job_sender: Sender<Job>,
    result_receiver: Receiver<JobResult>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(
        pipeline: Arc<Pipeline>,
        worker_count: usize,
        retry: RetryPolicy,
    ) -> Result<Self, WorkerError> {
        Self::with_progress(pipeline, worker_count, retry, None)
    }

    /// Creates a worker pool that also publishes progress events.
    pub fn with_progress(
        pipeline: Arc<Pipeline>,
        worker_count: usize,
        retry: RetryPolicy,
        broadcaster: Option<JobProgressBroadcaster>,
    ) -> Result<Self, WorkerError> {
        if worker_count == 0 {
            return Err(WorkerError::SpawnFailed(
                "worker_count must be > 0".to_string(),
            ));
        }
        // Both unbounded: submission never waits on a busy worker, and a
        // worker never waits on a caller that is not draining results.
        let (job_sender, job_receiver) = unbounded::<Job>();
        let (result_sender, result_receiver) = unbounded::<JobResult>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_pipeline = Arc::clone(&pipeline);
            let worker_broadcaster = broadcaster.clone();

            let spawned = thread::Builder::new()
                .name(format!("pactparser-worker-{}", worker_id))
                .spawn(move || {
                    run_worker(
                        worker_id,
                        job_rx,
                        result_tx,
                        shutdown_flag,
                        worker_pipeline,
                        retry,
                        worker_broadcaster,
                    );
                });

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    // Stop the workers that did start before bailing out.
                    shutdown.store(true, Ordering::Relaxed);
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(WorkerError::SpawnFailed(e.to_string()));
                }
            }
        }

        info!("Started {} workers", worker_count);

        Ok(Self {
            job_sender,
            result_receiver,
            workers: Mutex::new(workers),
            shutdown,
        })
    }

    pub fn submit(&self, job: Job) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ShuttingDown);
        }

        self.job_sender
            .send(job)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    pub fn try_recv_result(&self) -> Option<JobResult> {
        self.result_receiver.try_recv().ok()
    }

    pub fn recv_result(&self) -> Option<JobResult> {
        self.result_receiver.recv().ok()
    }

    pub fn recv_result_timeout(&self, timeout: Duration) -> Option<JobResult> {
        self.result_receiver.recv_timeout(timeout).ok()
    }

    /// Stops workers after their current job. Queued jobs stay `pending`.
    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Joins all workers. Call after [`WorkerPool::shutdown`].
    pub fn wait(&self) {
        let workers = match self.workers.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };

        for (i, worker) in workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

impl Dispatcher for WorkerPool {
    fn enqueue(&self, job: Job) -> Result<(), WorkerError> {
        self.submit(job)
    }
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<Job>,
    result_sender: Sender<JobResult>,
    shutdown: Arc<AtomicBool>,
    pipeline: Arc<Pipeline>,
    retry: RetryPolicy,
    broadcaster: Option<JobProgressBroadcaster>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(job) => {
                debug!("Worker {} processing job {}", worker_id, job.id);

                let result = match broadcaster {
                    Some(ref broadcaster) => {
                        let progress =
                            BroadcastProgress::new(broadcaster.start_job(&job.id, &job.filename));
                        execute_with_retry(&pipeline, &job, retry, &progress)
                    }
                    None => execute_with_retry(&pipeline, &job, retry, &NoopProgress),
                };

                if let Err(e) = result_sender.send(result) {
                    error!("Worker {} failed to send result: {}", worker_id, e);
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

/// Invokes the orchestrator until it returns an outcome, re-invoking on
/// retryable dispatch faults. When the budget is spent the job is marked
/// failed, best effort.
pub fn execute_with_retry(
    pipeline: &Pipeline,
    job: &Job,
    retry: RetryPolicy,
    progress: &dyn ProgressReporter,
) -> JobResult {
    let max_attempts = retry.max_attempts();
    let mut last_error = String::new();

    for attempt in 1..=max_attempts {
        match run_once(pipeline, job, progress) {
            Ok(outcome) => return JobResult::from_outcome(job, &outcome, attempt),
            Err(e) if !e.is_retryable() => {
                error!("Job {} cannot be dispatched: {}", job.id, e);
                return JobResult::dispatch_failure(job, e.to_string(), attempt, None);
            }
            Err(e) => {
                warn!(
                    "Job {} attempt {}/{} failed: {}",
                    job.id, attempt, max_attempts, e
                );
                last_error = e.to_string();
                if attempt < max_attempts {
                    thread::sleep(retry.delay_after(attempt));
                }
            }
        }
    }

    let message = format!(
        "Dispatch failed after {} attempts: {}",
        max_attempts, last_error
    );
    let status = match pipeline.fail_unless_terminal(&job.id, &message) {
        Ok(true) => {
            progress.report(ProgressEvent::Failed {
                error: message.clone(),
            });
            Some(JobStatus::Failed)
        }
        Ok(false) => None,
        Err(e) => {
            error!("Job {} left without terminal state: {}", job.id, e);
            None
        }
    };

    JobResult::dispatch_failure(job, message, max_attempts, status)
}

fn run_once(
    pipeline: &Pipeline,
    job: &Job,
    progress: &dyn ProgressReporter,
) -> Result<JobOutcome, DispatchError> {
    match panic::catch_unwind(AssertUnwindSafe(|| pipeline.run(job, progress))) {
        Ok(result) => result,
        Err(payload) => Err(DispatchError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
