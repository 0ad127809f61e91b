//! Pose landmark model over ONNX Runtime and per-frame pose summaries.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::imageops::FilterType;
use image::RgbImage;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use serde::Serialize;
use swinglab_models::pose::{index, LANDMARK_COUNT};
use swinglab_models::{Landmark, PoseLandmarks};
use tracing::info;

use super::PoseEstimator;
use crate::error::{VisionError, VisionResult};
use crate::keypoints::segment_angle;

/// Values per landmark in the model output: x, y, z, visibility, presence.
const LANDMARK_STRIDE: usize = 5;

#[derive(Debug, Clone)]
pub struct PoseModelConfig {
    pub model_path: PathBuf,
    /// Square model input side
    pub input_size: u32,
    /// Minimum pose-flag score to accept a detection
    pub presence_threshold: f32,
    pub landmarks_output: String,
    pub presence_output: String,
}

impl Default for PoseModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/pose_landmark_full.onnx"),
            input_size: 256,
            presence_threshold: 0.5,
            landmarks_output: "Identity".to_string(),
            presence_output: "Identity_1".to_string(),
        }
    }
}

/// BlazePose-style landmark model.
///
/// Runs on the whole frame resized to the model input, NHWC in `[0, 1]`.
pub struct OrtPoseEstimator {
    session: Mutex<Session>,
    config: PoseModelConfig,
}

impl OrtPoseEstimator {
    pub fn load(config: PoseModelConfig) -> VisionResult<Self> {
        if !config.model_path.exists() {
            return Err(VisionError::model_not_found(&config.model_path));
        }
        let session = create_session(&config.model_path)?;
        info!(model_path = %config.model_path.display(), "Pose model loaded");
        Ok(Self {
            session: Mutex::new(session),
            config,
        })
    }

    fn to_tensor(&self, frame: &RgbImage) -> VisionResult<Value> {
        let size = self.config.input_size;
        let resized = image::imageops::resize(frame, size, size, FilterType::Triangle);
        let data: Vec<f32> = resized.as_raw().iter().map(|&v| v as f32 / 255.0).collect();

        let shape = vec![1usize, size as usize, size as usize, 3];
        Tensor::from_array((shape, data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| VisionError::inference(format!("ORT tensor: {e}")))
    }
}

impl PoseEstimator for OrtPoseEstimator {
    fn estimate(&self, frame: &RgbImage) -> VisionResult<Option<PoseLandmarks>> {
        let tensor = self.to_tensor(frame)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| VisionError::internal("ORT session poisoned"))?;
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| VisionError::inference(format!("ORT run failed: {e}")))?;

        let presence = outputs
            .get(self.config.presence_output.as_str())
            .ok_or_else(|| VisionError::inference("Pose model returned no presence score"))?;
        let (_, flag) = presence
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::inference(format!("ORT extract: {e}")))?;
        if flag.first().copied().unwrap_or(0.0) < self.config.presence_threshold {
            return Ok(None);
        }

        let landmarks = outputs
            .get(self.config.landmarks_output.as_str())
            .ok_or_else(|| VisionError::inference("Pose model returned no landmarks"))?;
        let (_, data) = landmarks
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::inference(format!("ORT extract: {e}")))?;

        parse_landmarks(data, self.config.input_size).map(Some)
    }
}

/// Convert raw model output (input-pixel units) into normalized landmarks.
pub fn parse_landmarks(data: &[f32], input_size: u32) -> VisionResult<PoseLandmarks> {
    if data.len() < LANDMARK_COUNT * LANDMARK_STRIDE {
        return Err(VisionError::inference(format!(
            "Pose output too short: {} values",
            data.len()
        )));
    }
    let scale = input_size as f64;
    let landmarks = data
        .chunks_exact(LANDMARK_STRIDE)
        .take(LANDMARK_COUNT)
        .map(|v| {
            Landmark::new(
                v[0] as f64 / scale,
                v[1] as f64 / scale,
                v[2] as f64 / scale,
                sigmoid(v[3] as f64),
            )
        })
        .collect();
    Ok(PoseLandmarks::new(landmarks))
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn create_session(model_path: &Path) -> VisionResult<Session> {
    let model_bytes = std::fs::read(model_path)?;
    Session::builder()
        .map_err(|e| VisionError::inference(format!("ORT session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| VisionError::inference(format!("ORT opt level: {e}")))?
        .commit_from_memory(model_bytes.as_slice())
        .map_err(|e| VisionError::inference(format!("ORT load model: {e}")))
}

/// Swing angles read directly off one pose.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseSummary {
    pub shoulder_angle: Option<f64>,
    /// Forearm direction, right side preferred
    pub hand_angle: Option<f64>,
    pub hip_angle: Option<f64>,
    /// 0.7 hand + 0.3 shoulder
    pub launch_angle: Option<f64>,
    /// Fraction of the eight upper-body and hip points present
    pub confidence: f64,
    pub detected_landmarks: usize,
}

pub fn pose_summary(pose: &PoseLandmarks, (width, height): (u32, u32)) -> PoseSummary {
    let at = |idx: usize| pose.pixel(idx, width, height);
    let segment = |a: usize, b: usize| Some(segment_angle(at(a)?, at(b)?));

    let shoulder_angle = segment(index::LEFT_SHOULDER, index::RIGHT_SHOULDER);
    let hand_angle = segment(index::RIGHT_ELBOW, index::RIGHT_WRIST)
        .or_else(|| segment(index::LEFT_ELBOW, index::LEFT_WRIST));
    let hip_angle = segment(index::LEFT_HIP, index::RIGHT_HIP);
    let launch_angle = match (hand_angle, shoulder_angle) {
        (Some(hand), Some(shoulder)) => Some(hand * 0.7 + shoulder * 0.3),
        _ => None,
    };

    let detected_landmarks = [
        index::LEFT_SHOULDER,
        index::RIGHT_SHOULDER,
        index::LEFT_ELBOW,
        index::RIGHT_ELBOW,
        index::LEFT_WRIST,
        index::RIGHT_WRIST,
        index::LEFT_HIP,
        index::RIGHT_HIP,
    ]
    .iter()
    .filter(|&&i| at(i).is_some())
    .count();

    PoseSummary {
        shoulder_angle,
        hand_angle,
        hip_angle,
        launch_angle,
        confidence: detected_landmarks as f64 / 8.0,
        detected_landmarks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoints::test_support::pose_with;

    #[test]
    fn test_parse_landmarks_normalizes() {
        let mut data = vec![0.0f32; 39 * LANDMARK_STRIDE];
        data[0] = 128.0;
        data[1] = 64.0;
        data[3] = 0.0;
        let pose = parse_landmarks(&data, 256).unwrap();

        assert_eq!(pose.len(), LANDMARK_COUNT);
        let nose = pose.get(index::NOSE).unwrap();
        assert_eq!((nose.x, nose.y), (0.5, 0.25));
        assert!((nose.visibility - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_landmarks_too_short() {
        assert!(parse_landmarks(&[0.0; 10], 256).is_err());
    }

    #[test]
    fn test_pose_summary_angles() {
        let pose = pose_with(&[
            (index::LEFT_SHOULDER, 0.4, 0.3),
            (index::RIGHT_SHOULDER, 0.6, 0.3),
            (index::RIGHT_ELBOW, 0.6, 0.4),
            (index::RIGHT_WRIST, 0.6, 0.5),
        ]);
        let summary = pose_summary(&pose, (100, 100));

        assert_eq!(summary.shoulder_angle, Some(0.0));
        assert_eq!(summary.hand_angle, Some(90.0));
        assert!((summary.launch_angle.unwrap() - 63.0).abs() < 1e-9);
        assert_eq!(summary.detected_landmarks, 8);
        assert_eq!(summary.confidence, 1.0);
    }

    #[test]
    fn test_pose_summary_partial_pose() {
        let pose = PoseLandmarks::new(vec![Landmark::default(); 14]);
        let summary = pose_summary(&pose, (100, 100));
        assert!(summary.hip_angle.is_none());
        assert!(summary.hand_angle.is_none());
        assert_eq!(summary.detected_landmarks, 3);
        assert!(summary.launch_angle.is_none());
    }
}
