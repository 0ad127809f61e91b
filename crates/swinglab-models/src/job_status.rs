//! Analysis job status for the worker's job table.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Analysis job lifecycle.
///
/// `Queued → Downloading → Processing → Saving → Completed`, with `Failed`
/// or `Cancelled` reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting for a worker slot
    #[default]
    Queued,
    /// Fetching the video from storage
    Downloading,
    /// Running the analysis pipeline
    Processing,
    /// Posting results to the callback
    Saving,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Downloading => "downloading",
            JobStatus::Processing => "processing",
            JobStatus::Saving => "saving",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of one job in the job table.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusEntry {
    pub id: String,
    pub status: JobStatus,
    pub session_id: Option<String>,
    pub video_url: Option<String>,
    pub video_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobStatusEntry {
    pub fn new(
        id: impl Into<String>,
        session_id: Option<String>,
        video_url: Option<String>,
        video_path: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: JobStatus::Queued,
            session_id,
            video_url,
            video_path,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `status`, recording an error message if given.
    pub fn transition(&mut self, status: JobStatus, error: Option<String>) {
        self.status = status;
        self.updated_at = Utc::now();
        if error.is_some() {
            self.error = error;
        }
    }
}
