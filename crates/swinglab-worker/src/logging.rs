//! Structured job logging.

use tracing::{error, info, warn, Span};

/// Job-scoped logger carrying the job and session ids on every event.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    session_id: String,
}

impl JobLogger {
    pub fn new(job_id: &str, session_id: Option<&str>) -> Self {
        Self {
            job_id: job_id.to_string(),
            session_id: session_id.unwrap_or("-").to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(job_id = %self.job_id, session_id = %self.session_id, "Job started: {}", message);
    }

    pub fn log_progress(&self, message: &str) {
        info!(job_id = %self.job_id, session_id = %self.session_id, "Job progress: {}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, session_id = %self.session_id, "Job warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(job_id = %self.job_id, session_id = %self.session_id, "Job error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(job_id = %self.job_id, session_id = %self.session_id, "Job completed: {}", message);
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn create_span(&self) -> Span {
        tracing::info_span!("analysis_job", job_id = %self.job_id, session_id = %self.session_id)
    }
}
