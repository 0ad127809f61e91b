//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use swinglab_vision::{AnalyzerConfig, ModelPaths, ProcessingMode};

pub const DEFAULT_STORAGE_URL: &str = "http://localhost:5003";

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Jobs that may wait for a slot before enqueue is refused
    pub queue_capacity: usize,
    /// Whole-job timeout
    pub job_timeout: Duration,
    /// Video download and callback request timeout
    pub download_timeout: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Base URL for `videoPath` and `/api/storage/...` references
    pub storage_url: String,
    /// Analyze every Nth frame
    pub sample_rate: usize,
    pub max_frames: Option<usize>,
    pub yolo_model_path: Option<PathBuf>,
    pub pose_model_path: Option<PathBuf>,
    /// Frames sent for LLM feedback, when a key is configured
    pub coaching_frames: usize,
    /// Spacing between feedback frames
    pub coaching_sample_rate: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            queue_capacity: 32,
            job_timeout: Duration::from_secs(600),
            download_timeout: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(30),
            storage_url: DEFAULT_STORAGE_URL.to_string(),
            sample_rate: 1,
            max_frames: None,
            yolo_model_path: None,
            pose_model_path: None,
            coaching_frames: 5,
            coaching_sample_rate: 10,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: env_parse("WORKER_MAX_CONCURRENT_JOBS")
                .unwrap_or(defaults.max_concurrent_jobs)
                .max(1),
            queue_capacity: env_parse("WORKER_QUEUE_CAPACITY")
                .unwrap_or(defaults.queue_capacity)
                .max(1),
            job_timeout: env_parse("WORKER_JOB_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.job_timeout),
            download_timeout: env_parse("WORKER_DOWNLOAD_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.download_timeout),
            shutdown_timeout: env_parse("WORKER_SHUTDOWN_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
            storage_url: std::env::var("STORAGE_SERVER_URL")
                .or_else(|_| std::env::var("NGROK_STORAGE_SERVER_URL"))
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.storage_url),
            sample_rate: env_parse("VIDEO_SAMPLE_RATE").unwrap_or(defaults.sample_rate).max(1),
            max_frames: env_parse("VIDEO_MAX_FRAMES"),
            yolo_model_path: std::env::var("YOLO_MODEL_PATH").ok().map(PathBuf::from),
            pose_model_path: std::env::var("POSE_MODEL_PATH").ok().map(PathBuf::from),
            coaching_frames: env_parse("COACHING_MAX_FRAMES").unwrap_or(defaults.coaching_frames),
            coaching_sample_rate: env_parse("COACHING_SAMPLE_RATE")
                .unwrap_or(defaults.coaching_sample_rate)
                .max(1),
        }
    }

    pub fn analyzer_config(&self) -> AnalyzerConfig {
        let mode = if self.sample_rate > 1 {
            ProcessingMode::Sampled {
                sample_rate: self.sample_rate,
            }
        } else {
            ProcessingMode::Full
        };
        AnalyzerConfig {
            mode,
            max_frames: self.max_frames,
            ..Default::default()
        }
    }

    pub fn model_paths(&self) -> ModelPaths {
        ModelPaths {
            yolo: self.yolo_model_path.clone(),
            pose: self.pose_model_path.clone(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.queue_capacity, 32);
        assert_eq!(config.job_timeout, Duration::from_secs(600));
        assert_eq!(config.download_timeout, Duration::from_secs(60));
        assert_eq!(config.storage_url, "http://localhost:5003");
        assert_eq!(config.analyzer_config().mode, ProcessingMode::Full);
    }

    #[test]
    fn test_sampled_mode() {
        let config = WorkerConfig {
            sample_rate: 3,
            max_frames: Some(90),
            ..Default::default()
        };
        let analyzer = config.analyzer_config();
        assert_eq!(analyzer.mode, ProcessingMode::Sampled { sample_rate: 3 });
        assert_eq!(analyzer.max_frames, Some(90));
    }
}
