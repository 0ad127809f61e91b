//! Shared data models for the SwingLab backend.
//!
//! This crate provides Serde-serializable types for:
//! - Bounding boxes and per-frame detections
//! - Pose landmarks
//! - Swing phases and form errors
//! - Aggregated video metrics
//! - Motion-sensor swing events
//! - Training drills
//! - Analysis job status

pub mod detection;
pub mod drill;
pub mod form;
pub mod geometry;
pub mod job_status;
pub mod metrics;
pub mod phase;
pub mod pose;
pub mod swing;

// Re-export common types
pub use detection::{BallObservation, Detection, DetectionMethod, ObjectClass};
pub use drill::{Difficulty, Drill, DrillInput, DrillUpdate};
pub use form::{FormError, FormErrorType, Severity};
pub use geometry::{BoundingBox, Point};
pub use job_status::{JobStatus, JobStatusEntry};
pub use metrics::{AggregatedMetrics, TrackingQuality, VideoInfo};
pub use phase::SwingPhase;
pub use pose::{Landmark, PoseLandmarks};
pub use swing::SwingEvent;
