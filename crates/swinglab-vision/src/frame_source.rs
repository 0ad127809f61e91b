//! Decoded video frames for the analyzer.

use std::collections::VecDeque;
use std::path::Path;

use image::RgbImage;
use swinglab_models::VideoInfo;

use crate::error::VisionResult;

/// A stream of RGB frames with known video properties.
pub trait FrameSource: Send {
    fn info(&self) -> &VideoInfo;

    /// Next frame and its index in the video, `None` at the end.
    fn next_frame(&mut self) -> VisionResult<Option<(usize, RgbImage)>>;
}

/// Opens a video file as a [`FrameSource`].
pub trait FrameSourceFactory: Send + Sync {
    fn open(&self, path: &Path) -> VisionResult<Box<dyn FrameSource>>;
}

/// Frames held in memory. Used for tests and pre-decoded clips.
pub struct InMemoryFrameSource {
    info: VideoInfo,
    frames: VecDeque<RgbImage>,
    next_index: usize,
}

impl InMemoryFrameSource {
    pub fn new(fps: f64, frames: Vec<RgbImage>) -> Self {
        let (width, height) = frames.first().map(|f| f.dimensions()).unwrap_or((0, 0));
        Self {
            info: VideoInfo::new(fps, frames.len(), width, height),
            frames: frames.into(),
            next_index: 0,
        }
    }
}

impl FrameSource for InMemoryFrameSource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn next_frame(&mut self) -> VisionResult<Option<(usize, RgbImage)>> {
        Ok(self.frames.pop_front().map(|frame| {
            let idx = self.next_index;
            self.next_index += 1;
            (idx, frame)
        }))
    }
}

#[cfg(feature = "opencv")]
pub use self::opencv_source::{OpenCvFrameSource, OpenCvFrameSourceFactory};

#[cfg(feature = "opencv")]
mod opencv_source {
    use std::path::Path;

    use image::RgbImage;
    use opencv::core::Mat;
    use opencv::imgproc;
    use opencv::prelude::*;
    use opencv::videoio::{
        VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT, CAP_PROP_FRAME_HEIGHT,
        CAP_PROP_FRAME_WIDTH,
    };
    use swinglab_models::VideoInfo;
    use tracing::debug;

    use super::{FrameSource, FrameSourceFactory};
    use crate::error::{VisionError, VisionResult};

    /// Decodes a video file with OpenCV `VideoCapture`.
    pub struct OpenCvFrameSource {
        cap: VideoCapture,
        info: VideoInfo,
        next_index: usize,
    }

    impl OpenCvFrameSource {
        pub fn open(path: &Path) -> VisionResult<Self> {
            let path_str = path
                .to_str()
                .ok_or_else(|| VisionError::VideoOpen(format!("Non UTF-8 path: {}", path.display())))?;

            let cap = VideoCapture::from_file(path_str, CAP_ANY)
                .map_err(|e| VisionError::VideoOpen(format!("{path_str}: {e}")))?;
            if !cap.is_opened().unwrap_or(false) {
                return Err(VisionError::VideoOpen(format!(
                    "Could not open video file: {path_str}"
                )));
            }

            let fps = cap.get(CAP_PROP_FPS).unwrap_or(0.0);
            let frame_count = cap.get(CAP_PROP_FRAME_COUNT).unwrap_or(0.0).max(0.0) as usize;
            let width = cap.get(CAP_PROP_FRAME_WIDTH).unwrap_or(0.0) as u32;
            let height = cap.get(CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0) as u32;
            let info = VideoInfo::new(fps, frame_count, width, height);

            debug!(fps = info.fps, frame_count, width, height, "Video opened");
            Ok(Self {
                cap,
                info,
                next_index: 0,
            })
        }
    }

    impl FrameSource for OpenCvFrameSource {
        fn info(&self) -> &VideoInfo {
            &self.info
        }

        fn next_frame(&mut self) -> VisionResult<Option<(usize, RgbImage)>> {
            let mut bgr = Mat::default();
            let ok = self
                .cap
                .read(&mut bgr)
                .map_err(|e| VisionError::FrameDecode(e.to_string()))?;
            if !ok || bgr.empty() {
                return Ok(None);
            }

            let mut rgb = Mat::default();
            imgproc::cvt_color(
                &bgr,
                &mut rgb,
                imgproc::COLOR_BGR2RGB,
                0,
                opencv::core::AlgorithmHint::ALGO_HINT_DEFAULT,
            )
            .map_err(|e| VisionError::FrameDecode(format!("BGR2RGB failed: {e}")))?;

            let (w, h) = (rgb.cols() as u32, rgb.rows() as u32);
            let data = rgb
                .data_bytes()
                .map_err(|e| VisionError::FrameDecode(format!("Mat data: {e}")))?
                .to_vec();
            let frame = RgbImage::from_raw(w, h, data)
                .ok_or_else(|| VisionError::FrameDecode("Frame buffer size mismatch".to_string()))?;

            let idx = self.next_index;
            self.next_index += 1;
            Ok(Some((idx, frame)))
        }
    }

    #[derive(Debug, Clone, Default)]
    pub struct OpenCvFrameSourceFactory;

    impl FrameSourceFactory for OpenCvFrameSourceFactory {
        fn open(&self, path: &Path) -> VisionResult<Box<dyn FrameSource>> {
            Ok(Box::new(OpenCvFrameSource::open(path)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_source_indexes_frames() {
        let mut source = InMemoryFrameSource::new(0.0, vec![RgbImage::new(8, 6); 3]);
        assert_eq!(source.info().fps, VideoInfo::DEFAULT_FPS);
        assert_eq!((source.info().width, source.info().height), (8, 6));
        assert_eq!(source.info().frame_count, 3);

        let mut seen = Vec::new();
        while let Some((idx, _)) = source.next_frame().unwrap() {
            seen.push(idx);
        }
        assert_eq!(seen, vec![0, 1, 2]);
    }
}
