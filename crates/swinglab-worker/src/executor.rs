//! Job executor.

use std::sync::Arc;
use std::time::{Duration, Instant};

use swinglab_models::JobStatus;
use tokio::sync::{watch, Semaphore};
use tracing::{error, info, warn};

use crate::error::{WorkerError, WorkerResult};
use crate::job::AnalysisJob;
use crate::metrics::{record_completed, record_failed};
use crate::processor::JobProcessor;
use crate::queue::{JobReceiver, JobTable};

/// Pulls jobs off the queue and runs up to `max_concurrent_jobs` at a time.
pub struct JobExecutor {
    processor: Arc<JobProcessor>,
    table: JobTable,
    receiver: JobReceiver,
    job_semaphore: Arc<Semaphore>,
    max_concurrent_jobs: usize,
    job_timeout: Duration,
    shutdown_timeout: Duration,
}

impl JobExecutor {
    pub fn new(processor: JobProcessor, table: JobTable, receiver: JobReceiver) -> Self {
        let config = processor.config();
        let max_concurrent_jobs = config.max_concurrent_jobs.max(1);
        let job_timeout = config.job_timeout;
        let shutdown_timeout = config.shutdown_timeout;

        Self {
            processor: Arc::new(processor),
            table,
            receiver,
            job_semaphore: Arc::new(Semaphore::new(max_concurrent_jobs)),
            max_concurrent_jobs,
            job_timeout,
            shutdown_timeout,
        }
    }

    /// Run until `shutdown` flips to true or every queue handle is dropped,
    /// then wait up to the shutdown timeout for in-flight jobs.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> WorkerResult<()> {
        info!(
            "Starting job executor with {} max concurrent jobs",
            self.max_concurrent_jobs
        );

        loop {
            let job = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                    continue;
                }
                job = self.receiver.recv() => match job {
                    Some(job) => job,
                    None => {
                        info!("Job queue closed, stopping executor");
                        break;
                    }
                },
            };

            let permit = Arc::clone(&self.job_semaphore)
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::processing_failed("Semaphore closed"))?;
            let processor = Arc::clone(&self.processor);
            let table = self.table.clone();
            let timeout = self.job_timeout;

            tokio::spawn(async move {
                let _permit = permit;
                execute_job(processor, table, job, timeout).await;
            });
        }

        info!("Waiting for in-flight jobs to complete...");
        let drained = tokio::time::timeout(
            self.shutdown_timeout,
            self.job_semaphore.acquire_many(self.max_concurrent_jobs as u32),
        )
        .await;
        if drained.is_err() {
            warn!("Shutdown timeout reached with jobs still running");
        }

        info!("Job executor stopped");
        Ok(())
    }
}

async fn execute_job(processor: Arc<JobProcessor>, table: JobTable, job: AnalysisJob, timeout: Duration) {
    if table.is_cancelled(&job.id) {
        info!(job_id = %job.id, "Skipping cancelled job");
        return;
    }
    let Some(mut cancel) = table.cancel_signal(&job.id) else {
        warn!(job_id = %job.id, "Job missing from table");
        return;
    };

    let started = Instant::now();
    let result = tokio::select! {
        r = tokio::time::timeout(timeout, processor.process(&job, &table)) => {
            r.unwrap_or_else(|_| Err(WorkerError::Timeout(timeout.as_secs())))
        }
        _ = cancelled(&mut cancel) => Err(WorkerError::Cancelled),
    };

    match result {
        Ok(()) => {
            table.set_status(&job.id, JobStatus::Completed, None);
            record_completed(started.elapsed().as_secs_f64());
            info!(job_id = %job.id, "Job completed successfully");
        }
        Err(WorkerError::Cancelled) => {
            info!(job_id = %job.id, "Job stopped after cancellation");
        }
        Err(e) => {
            error!(job_id = %job.id, error = %e, "Job failed");
            table.set_status(&job.id, JobStatus::Failed, Some(e.to_string()));
            record_failed(failure_reason(&e));
        }
    }
}

async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn failure_reason(e: &WorkerError) -> &'static str {
    match e {
        WorkerError::Timeout(_) => "timeout",
        WorkerError::DownloadFailed(_) | WorkerError::DownloadStatus { .. } => "download",
        WorkerError::CallbackFailed { .. } => "callback",
        WorkerError::InvalidJob(_) => "invalid",
        WorkerError::Vision(_) | WorkerError::ProcessingFailed(_) => "analysis",
        WorkerError::Http(_) => "http",
        _ => "other",
    }
}
