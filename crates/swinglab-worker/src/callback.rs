//! Posting analysis results back to the web app.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use swinglab_vision::VideoAnalysis;
use tracing::debug;

use crate::coaching::CoachingFeedback;
use crate::error::{WorkerError, WorkerResult};

const MAX_ERROR_BODY: usize = 500;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload<'a> {
    pub session_id: Option<&'a str>,
    pub video_url: Option<&'a str>,
    pub video_file_name: &'a str,
    pub analysis: &'a VideoAnalysis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coaching: Option<&'a CoachingFeedback>,
}

/// POST the payload. Any status of 300 or above is a failure.
pub async fn post_callback(
    client: &Client,
    url: &str,
    auth_header: Option<&str>,
    payload: &CallbackPayload<'_>,
    timeout: Duration,
) -> WorkerResult<()> {
    let mut request = client.post(url).timeout(timeout).json(payload);
    if let Some(auth) = auth_header.filter(|a| !a.is_empty()) {
        request = request.header(reqwest::header::AUTHORIZATION, auth);
    }

    let response = request.send().await?;
    let status = response.status();
    debug!(url, status = status.as_u16(), "Callback response");

    if status.as_u16() >= 300 {
        let body = response.text().await.unwrap_or_default();
        return Err(WorkerError::CallbackFailed {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY).collect(),
        });
    }
    Ok(())
}
