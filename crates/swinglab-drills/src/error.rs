//! Error types for drill operations.

use thiserror::Error;

/// Result type for drill operations.
pub type DrillResult<T> = Result<T, DrillError>;

#[derive(Debug, Error)]
pub enum DrillError {
    #[error("Drill not found: {0}")]
    NotFound(String),

    #[error("Invalid drill: {0}")]
    Validation(String),

    #[error("Empty update for drill {0}")]
    EmptyUpdate(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl DrillError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// True when the caller sent something unusable, as opposed to a store fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            DrillError::NotFound(_) | DrillError::Validation(_) | DrillError::EmptyUpdate(_)
        )
    }
}
