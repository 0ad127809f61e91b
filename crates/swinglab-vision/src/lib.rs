//! Swing video analysis.
//!
//! This crate provides:
//! - Per-class object tracking with Kalman prediction
//! - Bat-ball contact detection
//! - Swing phase segmentation and biomechanics scoring
//! - Form error detection and form metrics
//! - ONNX and OpenCV detectors behind trait seams
//! - [`VideoAnalyzer`], which ties the above together over a whole video

pub mod analyzer;
pub mod biomechanics;
pub mod contact;
pub mod detectors;
pub mod error;
pub mod form_errors;
pub mod frame_source;
pub mod keypoints;
pub mod metrics;
pub mod model_cache;
pub mod phase;
pub mod signal;
pub mod tracking;

pub use analyzer::{
    AnalyzerConfig, DetectorSet, FrameAnalysis, ProcessingMode, VideoAnalysis, VideoAnalyzer,
};
pub use biomechanics::{BiomechanicsAnalyzer, BiomechanicsReport};
pub use contact::{ContactDetector, ContactResult};
pub use error::{VisionError, VisionResult};
pub use form_errors::{FormAnalysis, FormErrorDetector};
pub use frame_source::{FrameSource, FrameSourceFactory, InMemoryFrameSource};
#[cfg(feature = "opencv")]
pub use frame_source::{OpenCvFrameSource, OpenCvFrameSourceFactory};
pub use metrics::{FormMetrics, MetricsCalculator};
pub use model_cache::{ModelCache, ModelPaths};
pub use phase::{PhaseSequence, SwingPhaseDetector};
pub use tracking::{MultiObjectTracker, TrackerConfig, TrackingCoordinator};
