//! Error types for sensor operations.

use thiserror::Error;

/// Result type for sensor operations.
pub type SensorResult<T> = Result<T, SensorError>;

/// Errors that can occur while talking to the motion sensor.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("Scan failed: {0}")]
    Scan(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Connection timed out after {0} seconds")]
    ConnectTimeout(u64),

    #[error("GATT operation failed: {0}")]
    Gatt(String),

    #[error("Device disconnected")]
    Disconnected,

    #[error("Swing detection already running for session {0}")]
    AlreadyRunning(String),

    #[error("Swing detection not running for session {0}")]
    NotRunning(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {endpoint}")]
    Status { endpoint: String, status: u16 },
}

impl SensorError {
    pub fn scan(message: impl Into<String>) -> Self {
        Self::Scan(message.into())
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect(message.into())
    }

    pub fn gatt(message: impl Into<String>) -> Self {
        Self::Gatt(message.into())
    }
}
