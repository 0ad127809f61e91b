//! Download, analyze and report one job.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use swinglab_models::JobStatus;
use swinglab_vision::VideoAnalyzer;
use tracing::Instrument;

use crate::callback::{post_callback, CallbackPayload};
use crate::coaching::Coach;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::job::AnalysisJob;
use crate::logging::JobLogger;
use crate::metrics::record_download;
use crate::queue::JobTable;
use crate::retry::{retry_async_if, RetryConfig};
use crate::storage::{download_video, resolve_video_url, video_filename};

/// Everything a job needs, shared by all running jobs.
pub struct JobProcessor {
    config: WorkerConfig,
    http: Client,
    analyzer: Arc<VideoAnalyzer>,
    coach: Option<Coach>,
    download_retry: RetryConfig,
    callback_retry: RetryConfig,
}

impl JobProcessor {
    pub fn new(config: WorkerConfig, analyzer: Arc<VideoAnalyzer>) -> WorkerResult<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            config,
            http,
            analyzer,
            coach: None,
            download_retry: RetryConfig::new("video_download")
                .with_base_delay(Duration::from_millis(500)),
            callback_retry: RetryConfig::new("analysis_callback")
                .with_max_retries(2)
                .with_base_delay(Duration::from_millis(500)),
        })
    }

    pub fn with_coach(mut self, coach: Coach) -> Self {
        self.coach = Some(coach);
        self
    }

    /// Override backoff delays.
    pub fn with_retry_delays(mut self, base: Duration) -> Self {
        self.download_retry = self.download_retry.with_base_delay(base);
        self.callback_retry = self.callback_retry.with_base_delay(base);
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run the job to the point of a successful callback.
    ///
    /// Status moves through downloading, processing and saving; the caller
    /// records the terminal status.
    pub async fn process(&self, job: &AnalysisJob, table: &JobTable) -> WorkerResult<()> {
        let logger = JobLogger::new(&job.id, job.request.session_id.as_deref());
        let span = logger.create_span();
        self.run(job, table, &logger).instrument(span).await
    }

    async fn run(&self, job: &AnalysisJob, table: &JobTable, logger: &JobLogger) -> WorkerResult<()> {
        let request = &job.request;
        logger.log_start("analysis job");

        table.set_status(&job.id, JobStatus::Downloading, None);
        let url = resolve_video_url(&self.config.storage_url, request)?;
        let filename = video_filename(request, &url);
        logger.log_progress(&format!("downloading {url}"));

        let timeout = self.config.download_timeout;
        let bytes = retry_async_if(
            &self.download_retry,
            || download_video(&self.http, &url, timeout),
            WorkerError::is_retryable,
        )
        .await
        .into_result()?;
        record_download(bytes.len());
        let video = Arc::new(bytes);

        table.set_status(&job.id, JobStatus::Processing, None);
        logger.log_progress(&format!("analyzing {} bytes as {filename}", video.len()));

        let analysis = {
            let analyzer = Arc::clone(&self.analyzer);
            let video = Arc::clone(&video);
            let filename = filename.clone();
            tokio::task::spawn_blocking(move || analyzer.analyze_video(&video, &filename))
                .await
                .map_err(|e| WorkerError::processing_failed(format!("Analysis task failed: {e}")))??
        };

        if analysis.contact_frame.is_none() {
            logger.log_warning("no contact frame detected");
        }

        let coaching = match &self.coach {
            Some(coach) => coach.feedback(Arc::clone(&video), &filename, logger).await,
            None => None,
        };

        table.set_status(&job.id, JobStatus::Saving, None);
        let payload = CallbackPayload {
            session_id: request.session_id.as_deref(),
            video_url: request.video_url.as_deref(),
            video_file_name: &filename,
            analysis: &analysis,
            coaching: coaching.as_ref(),
        };

        retry_async_if(
            &self.callback_retry,
            || {
                post_callback(
                    &self.http,
                    &request.callback_url,
                    request.auth_header.as_deref(),
                    &payload,
                    timeout,
                )
            },
            WorkerError::is_retryable,
        )
        .await
        .into_result()?;

        logger.log_completion(&format!("{} frames analyzed", analysis.frames.len()));
        Ok(())
    }
}
