//! Ball helpers and detector chaining.

use std::sync::Arc;

use image::RgbImage;
use swinglab_models::{BallObservation, BoundingBox, Detection, DetectionMethod, ObjectClass, Point};
use tracing::warn;

use super::BallDetector;
use crate::error::VisionResult;

/// Ball detection from a box: center at the box center, radius half the longer side.
pub fn ball_from_box(bbox: BoundingBox, confidence: f64, method: DetectionMethod) -> Detection {
    let mut det = Detection::new(bbox, confidence, ObjectClass::Ball).with_method(method);
    det.center = Some(bbox.center());
    det.radius = Some(bbox.width().max(bbox.height()) / 2.0);
    det
}

/// Ball detection from a circle.
pub fn ball_from_circle(center: Point, radius: f64, confidence: f64, method: DetectionMethod) -> Detection {
    let bbox = BoundingBox::new(
        center.x - radius,
        center.y - radius,
        center.x + radius,
        center.y + radius,
    );
    let mut det = Detection::new(bbox, confidence, ObjectClass::Ball).with_method(method);
    det.center = Some(center);
    det.radius = Some(radius);
    det
}

/// Attach the pixel velocity since the previous ball center.
pub fn track_ball(previous: Option<Point>, detection: Detection) -> BallObservation {
    match previous {
        Some(prev) => BallObservation {
            velocity: detection.center_point().distance(&prev),
            detection,
            tracked: true,
        },
        None => BallObservation {
            detection,
            velocity: 0.0,
            tracked: false,
        },
    }
}

/// Tries each detector in order and returns the first ball found.
#[derive(Clone, Default)]
pub struct BallDetectorChain {
    detectors: Vec<Arc<dyn BallDetector>>,
}

impl BallDetectorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, detector: Arc<dyn BallDetector>) -> Self {
        self.detectors.push(detector);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }
}

impl BallDetector for BallDetectorChain {
    fn detect_ball(&self, frame: &RgbImage) -> VisionResult<Option<Detection>> {
        for detector in &self.detectors {
            match detector.detect_ball(frame) {
                Ok(Some(ball)) => return Ok(Some(ball)),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Ball detector failed"),
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ball_from_box_radius() {
        let det = ball_from_box(BoundingBox::new(10.0, 10.0, 30.0, 24.0), 0.7, DetectionMethod::Yolo);
        assert_eq!(det.center, Some(Point::new(20.0, 17.0)));
        assert_eq!(det.radius, Some(10.0));
        assert_eq!(det.class, ObjectClass::Ball);
    }

    #[test]
    fn test_ball_from_circle_box() {
        let det = ball_from_circle(Point::new(50.0, 40.0), 5.0, 0.6, DetectionMethod::Blob);
        assert_eq!(det.bbox, BoundingBox::new(45.0, 35.0, 55.0, 45.0));
        assert_eq!(det.method, DetectionMethod::Blob);
    }

    #[test]
    fn test_track_ball_velocity() {
        let det = ball_from_circle(Point::new(3.0, 4.0), 1.0, 0.6, DetectionMethod::Blob);

        let first = track_ball(None, det.clone());
        assert!(!first.tracked);
        assert_eq!(first.velocity, 0.0);

        let next = track_ball(Some(Point::new(0.0, 0.0)), det);
        assert!(next.tracked);
        assert!((next.velocity - 5.0).abs() < 1e-9);
    }
}
