//! Per-frame detectors.
//!
//! Each concern sits behind a trait so the analyzer can run with ONNX models,
//! OpenCV fallbacks or test doubles:
//! - [`PoseEstimator`]: 33 pose landmarks
//! - [`PersonDetector`]: person boxes, narrowed to the batter by [`select_batter`]
//! - [`BatDetector`]: bat box and angle
//! - [`BallDetector`]: ball box, center and radius

pub mod ball;
pub mod bat;
pub mod batter;
pub mod pose;
pub mod yolo;

#[cfg(feature = "opencv")]
pub mod opencv_fallback;

use image::RgbImage;
use swinglab_models::{Detection, PoseLandmarks};

use crate::error::VisionResult;

pub use ball::{track_ball, BallDetectorChain};
pub use bat::{bat_angle_from_box, hand_region, line_detection, BatDetectorChain};
pub use batter::{crop_region, select_batter, BatterSelection};
pub use pose::{pose_summary, OrtPoseEstimator, PoseModelConfig, PoseSummary};
pub use yolo::{YoloConfig, YoloDetection, YoloDetector};

/// Estimates body landmarks in an RGB frame.
pub trait PoseEstimator: Send + Sync {
    /// `Ok(None)` when no pose is present.
    fn estimate(&self, frame: &RgbImage) -> VisionResult<Option<PoseLandmarks>>;
}

/// Finds every person in an RGB frame.
pub trait PersonDetector: Send + Sync {
    fn detect_persons(&self, frame: &RgbImage) -> VisionResult<Vec<Detection>>;
}

/// Finds the bat, optionally guided by the batter's pose.
pub trait BatDetector: Send + Sync {
    fn detect_bat(
        &self,
        frame: &RgbImage,
        pose: Option<&PoseLandmarks>,
    ) -> VisionResult<Option<Detection>>;
}

/// Finds the ball.
pub trait BallDetector: Send + Sync {
    fn detect_ball(&self, frame: &RgbImage) -> VisionResult<Option<Detection>>;
}
