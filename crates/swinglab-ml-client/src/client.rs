//! OpenRouter chat-completions client.

use metrics::counter;
use reqwest::{Client, StatusCode};
use tracing::{debug, error, info, warn};

use crate::config::OpenRouterConfig;
use crate::encode::jpeg_data_url;
use crate::error::{MlError, MlResult};
use crate::types::{ChatRequest, ChatResponse, ContentPart, FrameFeedback, ImageUrl, Message, MessageContent};

pub mod names {
    pub const REQUESTS_TOTAL: &str = "openrouter_requests_total";
    pub const RATE_LIMITED_TOTAL: &str = "openrouter_rate_limited_total";
}

const FRAME_MAX_TOKENS: u32 = 300;
const RECOMMENDATION_MAX_TOKENS: u32 = 200;

pub const NO_FRAMES_MESSAGE: &str =
    "Unable to analyze video. Please ensure the video contains a clear view of the baseball swing.";
pub const NO_SUCCESSFUL_FRAMES_MESSAGE: &str =
    "Unable to analyze video frames. Please ensure the video quality is good and the swing is clearly visible.";

fn frame_prompt(frame_index: usize) -> String {
    format!(
        "Analyze this baseball swing frame (frame {frame_index}). \n\
         Focus on:\n\
         1. Body position and posture\n\
         2. Hip rotation and weight transfer\n\
         3. Shoulder alignment and rotation\n\
         4. Bat position and angle\n\
         5. Overall swing mechanics\n\n\
         Provide a brief analysis (2-3 sentences) of what you observe in this frame."
    )
}

fn summary_prompt(combined: &str) -> String {
    format!(
        "Based on the following frame-by-frame analysis of a baseball swing, provide a concise, \
         actionable recommendation (2-3 sentences) for improving the swing:\n\n\
         {combined}\n\n\
         Provide a clear, specific recommendation focusing on the most important areas for improvement."
    )
}

/// Swing-frame commentary from a vision-capable chat model.
pub struct OpenRouterClient {
    http: Client,
    config: OpenRouterConfig,
}

impl OpenRouterClient {
    pub fn new(config: OpenRouterConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        if config.is_configured() {
            info!(model = %config.model, endpoint = %config.endpoint(), "OpenRouter client initialized");
        } else {
            warn!("OPENROUTER_API_KEY not set; frame feedback is disabled");
        }

        Ok(Self { http, config })
    }

    pub fn from_env() -> MlResult<Self> {
        Self::new(OpenRouterConfig::from_env())
    }

    pub fn config(&self) -> &OpenRouterConfig {
        &self.config
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// Describe one JPEG frame.
    ///
    /// `Ok(None)` when rate limited or when the model returned no choices.
    pub async fn analyze_frame(
        &self,
        jpeg_base64: &str,
        frame_index: usize,
    ) -> MlResult<Option<FrameFeedback>> {
        let content = MessageContent::Parts(vec![
            ContentPart::Text {
                text: frame_prompt(frame_index),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: jpeg_data_url(jpeg_base64),
                },
            },
        ]);

        debug!(frame = frame_index, model = %self.config.model, "Requesting frame analysis");

        match self.complete(content, FRAME_MAX_TOKENS).await {
            Ok(Some(text)) => {
                info!(frame = frame_index, len = text.len(), "Frame analyzed");
                Ok(Some(FrameFeedback {
                    frame_index,
                    analysis: text,
                    success: true,
                }))
            }
            Ok(None) => {
                warn!(frame = frame_index, "Model returned no choices");
                Ok(None)
            }
            Err(MlError::RateLimited) => {
                warn!(frame = frame_index, "Rate limit exceeded for OpenRouter API");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Summarize frame analyses into one recommendation.
    ///
    /// Never fails: falls back to the first analysis, or to a fixed message
    /// when there is nothing to summarize.
    pub async fn generate_recommendation(&self, analyses: &[FrameFeedback]) -> String {
        if analyses.is_empty() {
            return NO_FRAMES_MESSAGE.to_string();
        }

        let texts: Vec<&str> = analyses
            .iter()
            .filter(|a| a.success)
            .map(|a| a.analysis.as_str())
            .collect();
        let Some(first) = texts.first().map(|t| t.to_string()) else {
            return NO_SUCCESSFUL_FRAMES_MESSAGE.to_string();
        };

        let prompt = summary_prompt(&texts.join("\n\n"));
        match self
            .complete(MessageContent::Text(prompt), RECOMMENDATION_MAX_TOKENS)
            .await
        {
            Ok(Some(text)) => text.trim().to_string(),
            Ok(None) => first,
            Err(e) => {
                error!(error = %e, "Error generating recommendation");
                first
            }
        }
    }

    async fn complete(&self, content: MessageContent, max_tokens: u32) -> MlResult<Option<String>> {
        let api_key = self.config.api_key.as_deref().ok_or(MlError::NotConfigured)?;

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![Message::user(content)],
            max_tokens,
        };

        let response = self
            .http
            .post(self.config.endpoint())
            .bearer_auth(api_key)
            .header("HTTP-Referer", &self.config.referer)
            .header("X-Title", &self.config.title)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        counter!(names::REQUESTS_TOTAL, "status" => status.as_u16().to_string()).increment(1);

        if status == StatusCode::TOO_MANY_REQUESTS {
            counter!(names::RATE_LIMITED_TOTAL).increment(1);
            return Err(MlError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(500).collect();
            error!(status = status.as_u16(), body = %body, "OpenRouter API error response");
            return Err(MlError::RequestFailed {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| MlError::InvalidResponse(e.to_string()))?;

        Ok(parsed.choices.into_iter().next().map(|c| c.message.content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenRouterClient {
        OpenRouterClient::new(OpenRouterConfig {
            api_key: Some("test-key".to_string()),
            base_url: format!("{}/api/v1", server.uri()),
            ..Default::default()
        })
        .unwrap()
    }

    fn completion(text: &str) -> Value {
        json!({"choices": [{"message": {"role": "assistant", "content": text}}]})
    }

    fn feedback(text: &str, success: bool) -> FrameFeedback {
        FrameFeedback {
            frame_index: 0,
            analysis: text.to_string(),
            success,
        }
    }

    async fn last_body(server: &MockServer) -> Value {
        let requests = server.received_requests().await.unwrap();
        serde_json::from_slice(&requests.last().unwrap().body).unwrap()
    }

    #[tokio::test]
    async fn test_analyze_frame_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .and(header("X-Title", "Baseball Trainer"))
            .and(header("HTTP-Referer", "https://baseballtrainer.app"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Hips open early.")))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = client.analyze_frame("QUJD", 12).await.unwrap().unwrap();
        assert_eq!(result.frame_index, 12);
        assert_eq!(result.analysis, "Hips open early.");
        assert!(result.success);

        let body = last_body(&server).await;
        assert_eq!(body["max_tokens"], 300);
        assert_eq!(body["model"], "anthropic/claude-3.5-sonnet");
        let parts = body["messages"][0]["content"].as_array().unwrap();
        assert!(parts[0]["text"].as_str().unwrap().contains("(frame 12)"));
        assert_eq!(parts[1]["image_url"]["url"], "data:image/jpeg;base64,QUJD");
    }

    #[tokio::test]
    async fn test_analyze_frame_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.analyze_frame("QUJD", 0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_analyze_frame_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        match client.analyze_frame("QUJD", 0).await {
            Err(MlError::RequestFailed { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "upstream down");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_analyze_frame_without_key() {
        let client = OpenRouterClient::new(OpenRouterConfig::default()).unwrap();
        assert!(matches!(
            client.analyze_frame("QUJD", 0).await,
            Err(MlError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_recommendation_summarizes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion("  Stay closed longer.\n")),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let rec = client
            .generate_recommendation(&[feedback("a", true), feedback("skip", false), feedback("b", true)])
            .await;
        assert_eq!(rec, "Stay closed longer.");

        let body = last_body(&server).await;
        assert_eq!(body["max_tokens"], 200);
        let prompt = body["messages"][0]["content"].as_str().unwrap();
        assert!(prompt.contains("a\n\nb"));
        assert!(!prompt.contains("skip"));
    }

    #[tokio::test]
    async fn test_recommendation_fallbacks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.generate_recommendation(&[]).await, NO_FRAMES_MESSAGE);
        assert_eq!(
            client.generate_recommendation(&[feedback("x", false)]).await,
            NO_SUCCESSFUL_FRAMES_MESSAGE
        );
        assert_eq!(
            client
                .generate_recommendation(&[feedback("first", true), feedback("second", true)])
                .await,
            "first"
        );
    }
}
