//! Lazily loaded, shared model instances.
//!
//! Each model loads at most once per cache. A failed load is remembered as
//! `None` so callers fall back to classical detectors without retrying.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use tracing::{info, warn};

use crate::detectors::{OrtPoseEstimator, PoseModelConfig, YoloConfig, YoloDetector};

const YOLO_CANDIDATES: &[&str] = &[
    "./models/yolov8n.onnx",
    "./backend/models/yolov8n.onnx",
    "/app/models/yolov8n.onnx",
];

const POSE_CANDIDATES: &[&str] = &[
    "./models/pose_landmark_full.onnx",
    "./backend/models/pose_landmark_full.onnx",
    "/app/models/pose_landmark_full.onnx",
];

fn find_default_model_path(candidates: &[&str]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .map(Path::to_path_buf)
}

#[derive(Debug, Clone, Default)]
pub struct ModelPaths {
    /// Falls back to the default search paths when unset
    pub yolo: Option<PathBuf>,
    pub pose: Option<PathBuf>,
    pub yolo_confidence: Option<f32>,
}

#[derive(Default)]
pub struct ModelCache {
    paths: ModelPaths,
    yolo: OnceLock<Option<Arc<YoloDetector>>>,
    pose: OnceLock<Option<Arc<OrtPoseEstimator>>>,
}

impl ModelCache {
    pub fn new(paths: ModelPaths) -> Self {
        Self {
            paths,
            ..Default::default()
        }
    }

    pub fn shared(paths: ModelPaths) -> Arc<Self> {
        Arc::new(Self::new(paths))
    }

    pub fn yolo(&self) -> Option<Arc<YoloDetector>> {
        self.yolo
            .get_or_init(|| {
                let path = self
                    .paths
                    .yolo
                    .clone()
                    .or_else(|| find_default_model_path(YOLO_CANDIDATES))?;
                let mut config = YoloConfig {
                    model_path: path,
                    ..Default::default()
                };
                if let Some(conf) = self.paths.yolo_confidence {
                    config.confidence_threshold = conf;
                }
                match YoloDetector::new(config) {
                    Ok(detector) => {
                        info!("YOLO model loaded and cached");
                        Some(Arc::new(detector))
                    }
                    Err(e) => {
                        warn!(error = %e, "Could not load YOLO model");
                        None
                    }
                }
            })
            .clone()
    }

    pub fn pose(&self) -> Option<Arc<OrtPoseEstimator>> {
        self.pose
            .get_or_init(|| {
                let path = self
                    .paths
                    .pose
                    .clone()
                    .or_else(|| find_default_model_path(POSE_CANDIDATES))?;
                match OrtPoseEstimator::load(PoseModelConfig {
                    model_path: path,
                    ..Default::default()
                }) {
                    Ok(model) => {
                        info!("Pose model loaded and cached");
                        Some(Arc::new(model))
                    }
                    Err(e) => {
                        warn!(error = %e, "Could not load pose model");
                        None
                    }
                }
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_models_cached_as_none() {
        let cache = ModelCache::new(ModelPaths {
            yolo: Some(PathBuf::from("/nonexistent/yolo.onnx")),
            pose: Some(PathBuf::from("/nonexistent/pose.onnx")),
            yolo_confidence: None,
        });
        assert!(cache.yolo().is_none());
        assert!(cache.yolo().is_none());
        assert!(cache.pose().is_none());
    }

    #[test]
    fn test_find_default_model_path() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("m.onnx");
        std::fs::write(&model, b"x").unwrap();
        let model_str = model.to_string_lossy().to_string();

        let found = find_default_model_path(&["/nonexistent/a.onnx", model_str.as_str()]);
        assert_eq!(found, Some(model));
        assert!(find_default_model_path(&["/nonexistent/b.onnx"]).is_none());
    }
}
