//! Optional LLM feedback on sampled frames of the video.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use image::RgbImage;
use serde::Serialize;
use swinglab_ml_client::{encode_frame_jpeg, FrameFeedback, OpenRouterClient};
use swinglab_vision::{FrameSource, FrameSourceFactory, VisionResult};
use tracing::warn;

use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;

/// Per-frame commentary plus one overall recommendation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachingFeedback {
    pub frames: Vec<FrameFeedback>,
    pub recommendation: String,
}

/// Every `every`-th frame from 0, at most `max`.
pub fn sample_frames(
    source: &mut dyn FrameSource,
    every: usize,
    max: usize,
) -> VisionResult<Vec<(usize, RgbImage)>> {
    let every = every.max(1);
    let mut out = Vec::new();
    while out.len() < max {
        let Some((idx, frame)) = source.next_frame()? else {
            break;
        };
        if idx % every == 0 {
            out.push((idx, frame));
        }
    }
    Ok(out)
}

pub struct Coach {
    client: Arc<OpenRouterClient>,
    sources: Arc<dyn FrameSourceFactory>,
    every: usize,
    max_frames: usize,
}

impl Coach {
    pub fn new(
        client: Arc<OpenRouterClient>,
        sources: Arc<dyn FrameSourceFactory>,
        every: usize,
        max_frames: usize,
    ) -> Self {
        Self {
            client,
            sources,
            every,
            max_frames,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_configured() && self.max_frames > 0
    }

    /// Feedback for the video, or `None` when disabled or nothing could be sampled.
    ///
    /// Frame-level request failures are logged and skipped.
    pub async fn feedback(
        &self,
        video: Arc<Vec<u8>>,
        filename: &str,
        logger: &JobLogger,
    ) -> Option<CoachingFeedback> {
        if !self.is_enabled() {
            return None;
        }

        let frames = match self.encoded_frames(video, filename).await {
            Ok(frames) if !frames.is_empty() => frames,
            Ok(_) => return None,
            Err(e) => {
                logger.log_warning(&format!("Frame sampling for feedback failed: {e}"));
                return None;
            }
        };

        let mut analyses = Vec::with_capacity(frames.len());
        for (idx, jpeg) in &frames {
            match self.client.analyze_frame(jpeg, *idx).await {
                Ok(Some(feedback)) => analyses.push(feedback),
                Ok(None) => {}
                Err(e) => warn!(frame = idx, error = %e, "Frame feedback failed"),
            }
        }

        let recommendation = self.client.generate_recommendation(&analyses).await;
        Some(CoachingFeedback {
            frames: analyses,
            recommendation,
        })
    }

    async fn encoded_frames(&self, video: Arc<Vec<u8>>, filename: &str) -> WorkerResult<Vec<(usize, String)>> {
        let sources = Arc::clone(&self.sources);
        let suffix = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_else(|| ".mp4".to_string());
        let (every, max) = (self.every, self.max_frames);

        tokio::task::spawn_blocking(move || -> WorkerResult<Vec<(usize, String)>> {
            let mut file = tempfile::Builder::new()
                .prefix("coach-")
                .suffix(&suffix)
                .tempfile()?;
            file.write_all(&video)?;
            file.flush()?;

            let mut source = sources.open(file.path())?;
            sample_frames(source.as_mut(), every, max)?
                .into_iter()
                .map(|(idx, frame)| {
                    encode_frame_jpeg(&frame)
                        .map(|b64| (idx, b64))
                        .map_err(|e| WorkerError::processing_failed(e.to_string()))
                })
                .collect()
        })
        .await
        .map_err(|e| WorkerError::processing_failed(format!("Frame sampling task failed: {e}")))?
    }
}
