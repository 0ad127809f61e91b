//! Forwards detected swings to the web app.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use swinglab_models::SwingEvent;
use tracing::{info, warn};

use crate::debug::DebugState;
use crate::error::{SensorError, SensorResult};

pub const SWINGS_PATH: &str = "/api/blast/swings";
pub const STOP_PATH: &str = "/api/videos/stop";

#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Base URL of the web app
    pub api_url: String,
    pub timeout: Duration,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

impl SinkConfig {
    /// Load from `NEXTJS_API_URL`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_url: std::env::var("NEXTJS_API_URL").unwrap_or(defaults.api_url),
            ..defaults
        }
    }
}

/// Receives swings as they are detected.
///
/// Implementations must not fail the caller; errors are theirs to log.
#[async_trait]
pub trait SwingReporter: Send + Sync {
    async fn report(&self, event: &SwingEvent);
}

/// HTTP reporter: posts the swing, then asks the app to stop recording.
pub struct SwingSink {
    client: Client,
    config: SinkConfig,
    debug: Arc<DebugState>,
}

impl SwingSink {
    pub fn new(config: SinkConfig, debug: Arc<DebugState>) -> SensorResult<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config,
            debug,
        })
    }

    pub async fn post_swing(&self, event: &SwingEvent) -> SensorResult<()> {
        self.post(SWINGS_PATH, event).await
    }

    pub async fn post_stop(&self, session_id: &str) -> SensorResult<()> {
        self.post(STOP_PATH, &json!({ "sessionId": session_id })).await
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> SensorResult<()> {
        let url = format!("{}{}", self.config.api_url.trim_end_matches('/'), path);

        let response = match self.client.post(&url).json(body).send().await {
            Ok(r) => r,
            Err(e) => {
                self.debug.record_api_call(&url, false, None, Some(e.to_string()));
                return Err(e.into());
            }
        };

        let status = response.status();
        self.debug
            .record_api_call(&url, status.is_success(), Some(status.as_u16()), None);

        if status.is_success() {
            Ok(())
        } else {
            Err(SensorError::Status {
                endpoint: url,
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait]
impl SwingReporter for SwingSink {
    async fn report(&self, event: &SwingEvent) {
        match self.post_swing(event).await {
            Ok(()) => info!(session_id = %event.session_id, "Swing sent"),
            Err(e) => warn!(session_id = %event.session_id, error = %e, "Failed to send swing"),
        }

        match self.post_stop(&event.session_id).await {
            Ok(()) => info!(session_id = %event.session_id, "Stop signal sent"),
            Err(e) => warn!(session_id = %event.session_id, error = %e, "Failed to send stop signal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn event() -> SwingEvent {
        SwingEvent {
            t_start: 1.0,
            t_peak: 1.1,
            t_end: 1.25,
            duration_ms: 250,
            omega_peak_dps: 900.0,
            bat_speed_mph: 26.4,
            attack_angle_deg: 0.0,
            timestamp: Utc::now(),
            session_id: "sess-1".into(),
        }
    }

    fn sink(server: &MockServer, debug: Arc<DebugState>) -> SwingSink {
        let config = SinkConfig {
            api_url: server.uri(),
            ..Default::default()
        };
        SwingSink::new(config, debug).unwrap()
    }

    #[tokio::test]
    async fn test_report_posts_swing_then_stop() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SWINGS_PATH))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(STOP_PATH))
            .and(body_json(json!({ "sessionId": "sess-1" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let debug = Arc::new(DebugState::new());
        sink(&server, debug.clone()).report(&event()).await;

        let calls = debug.snapshot(0).api_calls;
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.success && c.status_code == Some(200)));
    }

    #[tokio::test]
    async fn test_swing_body_uses_session_id_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SWINGS_PATH))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let debug = Arc::new(DebugState::new());
        sink(&server, debug).post_swing(&event()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["sessionId"], "sess-1");
        assert_eq!(body["duration_ms"], 250);
    }

    #[tokio::test]
    async fn test_failures_recorded_not_propagated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let debug = Arc::new(DebugState::new());
        let sink = sink(&server, debug.clone());

        let err = sink.post_stop("sess-1").await.unwrap_err();
        assert!(matches!(err, SensorError::Status { status: 500, .. }));

        sink.report(&event()).await;
        let calls = debug.snapshot(0).api_calls;
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|c| !c.success));
    }
}
