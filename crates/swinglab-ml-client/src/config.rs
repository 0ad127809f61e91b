//! OpenRouter client configuration.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    pub api_key: Option<String>,
    pub model: String,
    /// API root, without the `/chat/completions` suffix
    pub base_url: String,
    /// Sent as `HTTP-Referer`
    pub referer: String,
    /// Sent as `X-Title`
    pub title: String,
    pub timeout: Duration,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "anthropic/claude-3.5-sonnet".to_string(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            referer: "https://baseballtrainer.app".to_string(),
            title: "Baseball Trainer".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl OpenRouterConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("OPENROUTER_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            model: std::env::var("OPENROUTER_MODEL").unwrap_or(defaults.model),
            base_url: std::env::var("OPENROUTER_BASE_URL").unwrap_or(defaults.base_url),
            referer: std::env::var("OPENROUTER_REFERER").unwrap_or(defaults.referer),
            ..defaults
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}
