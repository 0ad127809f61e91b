//! Bat geometry helpers and detector chaining.

use std::sync::Arc;

use image::RgbImage;
use swinglab_models::pose::index;
use swinglab_models::{BoundingBox, Detection, DetectionMethod, ObjectClass, PoseLandmarks};
use tracing::warn;

use super::BatDetector;
use crate::error::VisionResult;

/// Pixels added around the lead forearm when searching for the bat.
pub const HAND_REGION_MARGIN: f64 = 50.0;

/// Bat angle implied by a box, if the box is long and thin enough to be a bat.
pub fn bat_angle_from_box(bbox: &BoundingBox) -> Option<f64> {
    let aspect = if bbox.height() > 0.0 {
        bbox.width() / bbox.height()
    } else {
        0.0
    };
    (aspect > 3.0 || aspect < 0.33).then(|| bbox.height().atan2(bbox.width()).to_degrees())
}

/// Search window around the left wrist and elbow, clipped to the frame.
pub fn hand_region(pose: &PoseLandmarks, (width, height): (u32, u32)) -> Option<BoundingBox> {
    let wrist = pose.pixel(index::LEFT_WRIST, width, height)?;
    let elbow = pose.pixel(index::LEFT_ELBOW, width, height)?;

    let region = BoundingBox::new(
        (wrist.x.min(elbow.x) - HAND_REGION_MARGIN).trunc().max(0.0),
        (wrist.y.min(elbow.y) - HAND_REGION_MARGIN).trunc().max(0.0),
        (wrist.x.max(elbow.x) + HAND_REGION_MARGIN).trunc().min(width as f64),
        (wrist.y.max(elbow.y) + HAND_REGION_MARGIN).trunc().min(height as f64),
    );
    (region.width() > 0.0 && region.height() > 0.0).then_some(region)
}

/// Longest segment `[x1, y1, x2, y2]`.
pub fn longest_line(lines: &[[f64; 4]]) -> Option<[f64; 4]> {
    lines
        .iter()
        .copied()
        .max_by(|a, b| line_length(a).total_cmp(&line_length(b)))
}

fn line_length(l: &[f64; 4]) -> f64 {
    (l[2] - l[0]).hypot(l[3] - l[1])
}

/// Bat detection from a line segment in frame coordinates.
///
/// The box spans the segment; the angle follows the segment direction.
pub fn line_detection(line: [f64; 4], confidence: f64, method: DetectionMethod) -> Detection {
    let [x1, y1, x2, y2] = line;
    let bbox = BoundingBox::new(x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2));
    Detection::new(bbox, confidence, ObjectClass::Bat)
        .with_method(method)
        .with_angle((y2 - y1).atan2(x2 - x1).to_degrees())
}

/// Tries each detector in order and returns the first bat found.
///
/// A failing detector is logged and skipped.
#[derive(Clone, Default)]
pub struct BatDetectorChain {
    detectors: Vec<Arc<dyn BatDetector>>,
}

impl BatDetectorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, detector: Arc<dyn BatDetector>) -> Self {
        self.detectors.push(detector);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }
}

impl BatDetector for BatDetectorChain {
    fn detect_bat(
        &self,
        frame: &RgbImage,
        pose: Option<&PoseLandmarks>,
    ) -> VisionResult<Option<Detection>> {
        for detector in &self.detectors {
            match detector.detect_bat(frame, pose) {
                Ok(Some(bat)) => return Ok(Some(bat)),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Bat detector failed"),
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoints::test_support::pose_with;
    use crate::error::VisionError;

    #[test]
    fn test_bat_angle_requires_thin_box() {
        assert!(bat_angle_from_box(&BoundingBox::new(0.0, 0.0, 100.0, 100.0)).is_none());
        let wide = bat_angle_from_box(&BoundingBox::new(0.0, 0.0, 400.0, 100.0)).unwrap();
        assert!((wide - 100f64.atan2(400.0).to_degrees()).abs() < 1e-9);
        let tall = bat_angle_from_box(&BoundingBox::new(0.0, 0.0, 10.0, 100.0)).unwrap();
        assert!(tall > 80.0);
    }

    #[test]
    fn test_hand_region_clamped() {
        let pose = pose_with(&[(index::LEFT_WRIST, 0.1, 0.5), (index::LEFT_ELBOW, 0.2, 0.6)]);
        let region = hand_region(&pose, (200, 100)).unwrap();
        assert_eq!(region, BoundingBox::new(0.0, 0.0, 90.0, 100.0));
    }

    #[test]
    fn test_line_detection_keeps_direction() {
        let lines = [[0.0, 0.0, 3.0, 4.0], [100.0, 50.0, 40.0, 10.0]];
        let line = longest_line(&lines).unwrap();
        let det = line_detection(line, 0.6, DetectionMethod::Mediapipe);

        assert_eq!(det.bbox, BoundingBox::new(40.0, 10.0, 100.0, 50.0));
        let expected = (-40f64).atan2(-60.0).to_degrees();
        assert!((det.angle.unwrap() - expected).abs() < 1e-9);
        assert_eq!(det.method, DetectionMethod::Mediapipe);
        assert_eq!(det.class, ObjectClass::Bat);
    }

    struct Failing;
    impl BatDetector for Failing {
        fn detect_bat(&self, _: &RgbImage, _: Option<&PoseLandmarks>) -> VisionResult<Option<Detection>> {
            Err(VisionError::inference("boom"))
        }
    }

    struct Fixed(Detection);
    impl BatDetector for Fixed {
        fn detect_bat(&self, _: &RgbImage, _: Option<&PoseLandmarks>) -> VisionResult<Option<Detection>> {
            Ok(Some(self.0.clone()))
        }
    }

    #[test]
    fn test_chain_skips_failures() {
        let bat = line_detection([0.0, 0.0, 10.0, 0.0], 0.5, DetectionMethod::Hough);
        let chain = BatDetectorChain::new()
            .with(Arc::new(Failing))
            .with(Arc::new(Fixed(bat.clone())));
        let found = chain.detect_bat(&RgbImage::new(4, 4), None).unwrap();
        assert_eq!(found, Some(bat));
        assert!(BatDetectorChain::new()
            .detect_bat(&RgbImage::new(4, 4), None)
            .unwrap()
            .is_none());
    }
}
