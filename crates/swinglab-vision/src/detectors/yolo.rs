//! YOLOv8 object detection over ONNX Runtime.
//!
//! One COCO model serves person, bat and ball detection:
//! - person: class 0
//! - sports ball: class 32
//! - baseball bat: class 34, plus any long thin box

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::imageops::FilterType;
use image::RgbImage;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use swinglab_models::{BoundingBox, Detection, DetectionMethod, ObjectClass, PoseLandmarks};
use tracing::{debug, info};

use super::ball::ball_from_box;
use super::bat::bat_angle_from_box;
use super::{BallDetector, BatDetector, PersonDetector};
use crate::error::{VisionError, VisionResult};

pub const COCO_PERSON: usize = 0;
pub const COCO_SPORTS_BALL: usize = 32;
pub const COCO_BASEBALL_BAT: usize = 34;

const NUM_CLASSES: usize = 80;
/// 4 box values plus one score per class
const NUM_FEATURES: usize = 4 + NUM_CLASSES;

/// Raw detection in frame pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct YoloDetection {
    pub bbox: BoundingBox,
    pub class_id: usize,
    pub confidence: f32,
}

#[derive(Debug, Clone)]
pub struct YoloConfig {
    pub model_path: PathBuf,
    pub confidence_threshold: f32,
    /// IoU above which a same-class box is suppressed
    pub nms_threshold: f32,
    /// Square model input side
    pub input_size: u32,
}

impl Default for YoloConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/yolov8n.onnx"),
            confidence_threshold: 0.5,
            nms_threshold: 0.45,
            input_size: 640,
        }
    }
}

pub struct YoloDetector {
    session: Mutex<Session>,
    config: YoloConfig,
}

impl YoloDetector {
    pub fn new(config: YoloConfig) -> VisionResult<Self> {
        if !config.model_path.exists() {
            return Err(VisionError::model_not_found(&config.model_path));
        }

        let session = Mutex::new(create_session(&config.model_path)?);
        info!(
            model_path = %config.model_path.display(),
            input_size = config.input_size,
            "YOLO detector initialized"
        );

        Ok(Self { session, config })
    }

    pub fn config(&self) -> &YoloConfig {
        &self.config
    }

    /// All detections above the confidence threshold, after NMS.
    pub fn detect(&self, frame: &RgbImage) -> VisionResult<Vec<YoloDetection>> {
        let input = self.preprocess(frame)?;
        let outputs = self.run_inference(input)?;
        let candidates = decode_output(
            &outputs,
            frame.dimensions(),
            self.config.input_size,
            self.config.confidence_threshold,
        )?;
        let detections = non_maximum_suppression(candidates, self.config.nms_threshold);

        debug!(count = detections.len(), "YOLO detection completed");
        Ok(detections)
    }

    /// Resize to the model input and lay out as normalized NCHW.
    fn preprocess(&self, frame: &RgbImage) -> VisionResult<Value> {
        let size = self.config.input_size;
        let resized = image::imageops::resize(frame, size, size, FilterType::Triangle);
        let (w, h) = (size as usize, size as usize);

        let mut chw: Vec<f32> = Vec::with_capacity(3 * h * w);
        for c in 0..3 {
            for y in 0..size {
                for x in 0..size {
                    chw.push(resized.get_pixel(x, y)[c] as f32 / 255.0);
                }
            }
        }

        let shape = vec![1usize, 3, h, w];
        Tensor::from_array((shape, chw.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| VisionError::inference(format!("Failed to create tensor: {e}")))
    }

    fn run_inference(&self, input: Value) -> VisionResult<Vec<f32>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| VisionError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| VisionError::inference(format!("ONNX inference failed: {e}")))?;

        // [1, 84, N]
        let output = outputs
            .get("output0")
            .ok_or_else(|| VisionError::inference("Missing output0 tensor"))?;

        let (_, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::inference(format!("Failed to extract tensor: {e}")))?;

        Ok(data.to_vec())
    }

    fn best_of(&self, frame: &RgbImage, keep: impl Fn(&YoloDetection) -> bool) -> VisionResult<Option<YoloDetection>> {
        Ok(self
            .detect(frame)?
            .into_iter()
            .filter(keep)
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence)))
    }
}

impl PersonDetector for YoloDetector {
    fn detect_persons(&self, frame: &RgbImage) -> VisionResult<Vec<Detection>> {
        Ok(self
            .detect(frame)?
            .into_iter()
            .filter(|d| d.class_id == COCO_PERSON)
            .map(|d| Detection::new(d.bbox, d.confidence as f64, ObjectClass::Person))
            .collect())
    }
}

impl BatDetector for YoloDetector {
    fn detect_bat(
        &self,
        frame: &RgbImage,
        _pose: Option<&PoseLandmarks>,
    ) -> VisionResult<Option<Detection>> {
        let best = self.best_of(frame, |d| {
            d.class_id == COCO_BASEBALL_BAT
                || (d.class_id != COCO_PERSON && bat_angle_from_box(&d.bbox).is_some())
        })?;

        Ok(best.map(|d| {
            let angle = bat_angle_from_box(&d.bbox)
                .unwrap_or_else(|| d.bbox.height().atan2(d.bbox.width()).to_degrees());
            Detection::new(d.bbox, d.confidence as f64, ObjectClass::Bat)
                .with_method(DetectionMethod::Yolo)
                .with_angle(angle)
        }))
    }
}

impl BallDetector for YoloDetector {
    fn detect_ball(&self, frame: &RgbImage) -> VisionResult<Option<Detection>> {
        let best = self.best_of(frame, |d| d.class_id == COCO_SPORTS_BALL)?;
        Ok(best.map(|d| ball_from_box(d.bbox, d.confidence as f64, DetectionMethod::Yolo)))
    }
}

/// Decode a `[1, 84, N]` YOLOv8 output into frame-space boxes.
pub fn decode_output(
    outputs: &[f32],
    frame_size: (u32, u32),
    input_size: u32,
    confidence_threshold: f32,
) -> VisionResult<Vec<YoloDetection>> {
    if outputs.is_empty() || outputs.len() % NUM_FEATURES != 0 {
        return Err(VisionError::inference(format!(
            "Unexpected output size: {} is not a multiple of {NUM_FEATURES}",
            outputs.len()
        )));
    }
    let num_boxes = outputs.len() / NUM_FEATURES;
    let at = |feature: usize, i: usize| outputs[feature * num_boxes + i];

    let (orig_w, orig_h) = (frame_size.0 as f64, frame_size.1 as f64);
    let scale_w = orig_w / input_size as f64;
    let scale_h = orig_h / input_size as f64;

    let mut candidates = Vec::new();
    for i in 0..num_boxes {
        let (mut best_class, mut best_score) = (0usize, 0.0f32);
        for c in 0..NUM_CLASSES {
            let score = at(4 + c, i);
            if score > best_score {
                best_score = score;
                best_class = c;
            }
        }
        if best_score < confidence_threshold {
            continue;
        }

        let (cx, cy) = (at(0, i) as f64, at(1, i) as f64);
        let (w, h) = (at(2, i) as f64, at(3, i) as f64);
        let bbox = BoundingBox::new(
            ((cx - w / 2.0) * scale_w).clamp(0.0, orig_w),
            ((cy - h / 2.0) * scale_h).clamp(0.0, orig_h),
            ((cx + w / 2.0) * scale_w).clamp(0.0, orig_w),
            ((cy + h / 2.0) * scale_h).clamp(0.0, orig_h),
        );

        candidates.push(YoloDetection {
            bbox,
            class_id: best_class,
            confidence: best_score,
        });
    }

    Ok(candidates)
}

/// Greedy per-class NMS, highest confidence first.
pub fn non_maximum_suppression(mut detections: Vec<YoloDetection>, iou_threshold: f32) -> Vec<YoloDetection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<YoloDetection> = Vec::new();
    for det in detections {
        let suppressed = keep.iter().any(|k| {
            k.class_id == det.class_id && k.bbox.iou(&det.bbox) > iou_threshold as f64
        });
        if !suppressed {
            keep.push(det);
        }
    }
    keep
}

fn create_session(model_path: &Path) -> VisionResult<Session> {
    let model_bytes = std::fs::read(model_path)?;

    let builder = Session::builder()
        .map_err(|e| VisionError::inference(format!("Failed to create session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| VisionError::inference(format!("Failed to set optimization level: {e}")))?;

    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if let Ok(cuda_builder) = builder
            .clone()
            .with_execution_providers([CUDAExecutionProvider::default().build()])
        {
            if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                info!("Using CUDA execution provider for object detection");
                return Ok(session);
            }
        }
        debug!("CUDA execution provider not available, using CPU");
    }

    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| VisionError::inference(format!("Failed to load ONNX model: {e}")))
}
