//! ML client error types.

use thiserror::Error;

pub type MlResult<T> = Result<T, MlError>;

#[derive(Debug, Error)]
pub enum MlError {
    #[error("OPENROUTER_API_KEY not set")]
    NotConfigured,

    #[error("Rate limited by model provider")]
    RateLimited,

    #[error("Request failed with {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Image encoding failed: {0}")]
    Encode(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MlError {
    pub fn is_retryable(&self) -> bool {
        match self {
            MlError::RateLimited | MlError::Network(_) => true,
            MlError::RequestFailed { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(MlError::RateLimited.is_retryable());
        assert!(MlError::RequestFailed {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!MlError::RequestFailed {
            status: 401,
            body: String::new()
        }
        .is_retryable());
        assert!(!MlError::NotConfigured.is_retryable());
    }
}
