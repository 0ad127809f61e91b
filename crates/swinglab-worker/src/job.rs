//! Analysis job requests.

use serde::{Deserialize, Serialize};

use crate::error::{WorkerError, WorkerResult};

/// A request to analyze one uploaded swing video and post the result back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    /// Absolute URL, or a `/api/storage/...` path on the storage server
    #[serde(default)]
    pub video_url: Option<String>,
    /// Path relative to the storage server's `/api/storage/` root
    #[serde(default)]
    pub video_path: Option<String>,
    #[serde(default)]
    pub callback_url: String,
    /// Forwarded verbatim as the callback's `Authorization` header
    #[serde(default, skip_serializing)]
    pub auth_header: Option<String>,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().map_or(false, |v| !v.trim().is_empty())
}

impl JobRequest {
    pub fn validate(&self) -> WorkerResult<()> {
        if self.callback_url.trim().is_empty() {
            return Err(WorkerError::invalid_job("Missing callbackUrl"));
        }
        if !present(&self.video_url) && !present(&self.video_path) {
            return Err(WorkerError::invalid_job("Missing videoUrl or videoPath"));
        }
        Ok(())
    }
}

/// A validated request with its assigned id.
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    pub id: String,
    pub request: JobRequest,
}
