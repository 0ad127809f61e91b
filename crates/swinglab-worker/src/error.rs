//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Storage returned {status} for {url}")]
    DownloadStatus { status: u16, url: String },

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Callback failed: {status} {body}")]
    CallbackFailed { status: u16, body: String },

    #[error("Job timed out after {0} seconds")]
    Timeout(u64),

    #[error("Job cancelled")]
    Cancelled,

    #[error("Job queue is full")]
    QueueFull,

    #[error("Job queue is closed")]
    QueueClosed,

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Vision error: {0}")]
    Vision(#[from] swinglab_vision::VisionError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn invalid_job(msg: impl Into<String>) -> Self {
        Self::InvalidJob(msg.into())
    }

    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }

    pub fn processing_failed(msg: impl Into<String>) -> Self {
        Self::ProcessingFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::DownloadFailed(_) | WorkerError::Timeout(_) => true,
            WorkerError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            WorkerError::DownloadStatus { status, .. } | WorkerError::CallbackFailed { status, .. } => {
                *status >= 500 || *status == 429
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(WorkerError::download_failed("reset").is_retryable());
        assert!(WorkerError::Timeout(60).is_retryable());
        assert!(WorkerError::CallbackFailed {
            status: 502,
            body: String::new()
        }
        .is_retryable());
        assert!(!WorkerError::CallbackFailed {
            status: 401,
            body: String::new()
        }
        .is_retryable());
        assert!(!WorkerError::DownloadStatus {
            status: 404,
            url: "http://storage/a.mp4".to_string()
        }
        .is_retryable());
        assert!(!WorkerError::invalid_job("no url").is_retryable());
        assert!(!WorkerError::Cancelled.is_retryable());
    }
}
