//! LLM coaching feedback for swing frames.
//!
//! Talks to an OpenAI-compatible chat-completions endpoint (OpenRouter by
//! default) to describe individual frames and summarize them into one
//! recommendation.

pub mod client;
pub mod config;
pub mod encode;
pub mod error;
pub mod types;

pub use client::OpenRouterClient;
pub use config::OpenRouterConfig;
pub use encode::encode_frame_jpeg;
pub use error::{MlError, MlResult};
pub use types::FrameFeedback;
