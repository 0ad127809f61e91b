//! Per-frame detections produced by detectors and consumed by trackers.

use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox, Point};

/// Object class tracked by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    Person,
    Bat,
    Ball,
}

impl ObjectClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectClass::Person => "person",
            ObjectClass::Bat => "bat",
            ObjectClass::Ball => "ball",
        }
    }
}

/// How a detection was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Neural object detector
    #[default]
    Yolo,
    /// Hough lines around the hands located by the pose model
    Mediapipe,
    /// Hough lines over the full frame
    Hough,
    /// Contour blob search
    Blob,
    /// Reported by a tracker without a fresh detection
    Tracking,
}

/// One detected object in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f64,
    pub class: ObjectClass,
    #[serde(default)]
    pub method: DetectionMethod,
    /// Bat orientation in degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,
    /// Ball center
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center: Option<Point>,
    /// Ball radius
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    /// Set when the value was predicted rather than observed
    #[serde(default)]
    pub predicted: bool,
}

impl Detection {
    pub fn new(bbox: BoundingBox, confidence: f64, class: ObjectClass) -> Self {
        Self {
            bbox,
            confidence,
            class,
            method: DetectionMethod::Yolo,
            angle: None,
            center: None,
            radius: None,
            predicted: false,
        }
    }

    pub fn with_method(mut self, method: DetectionMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_angle(mut self, angle: f64) -> Self {
        self.angle = Some(angle);
        self
    }

    /// Explicit center if present, otherwise the box center.
    pub fn center_point(&self) -> Point {
        self.center.unwrap_or_else(|| self.bbox.center())
    }
}

/// Ball detection with its frame-to-frame pixel velocity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallObservation {
    pub detection: Detection,
    /// Pixel distance from the previous frame's center
    pub velocity: f64,
    /// False when no previous center was available
    pub tracked: bool,
}

impl BallObservation {
    pub fn center(&self) -> Point {
        self.detection.center_point()
    }
}
