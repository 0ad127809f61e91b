//! Swing video analysis worker.
//!
//! Jobs arrive as JSON commands, are queued in-process, and run with bounded
//! concurrency: download the video, analyze it, optionally collect LLM
//! coaching feedback, then post the result to the job's callback URL.

pub mod callback;
pub mod coaching;
pub mod commands;
pub mod config;
pub mod error;
pub mod executor;
pub mod job;
pub mod logging;
pub mod metrics;
pub mod processor;
pub mod queue;
pub mod retry;
pub mod storage;

pub use coaching::{Coach, CoachingFeedback};
pub use commands::{handle_command, handle_line, WorkerCommand};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use job::{AnalysisJob, JobRequest};
pub use logging::JobLogger;
pub use processor::JobProcessor;
pub use queue::{JobQueue, JobReceiver, JobTable};
pub use retry::{retry_async, retry_async_if, RetryConfig, RetryResult};
