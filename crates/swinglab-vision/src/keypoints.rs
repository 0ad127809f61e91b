//! Named body keypoints in pixel space, plus the joint geometry the
//! analyzers share.

use swinglab_models::pose::index;
use swinglab_models::{Point, PoseLandmarks};

/// The 13 keypoints used by the swing analyzers, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Keypoints {
    pub nose: Option<Point>,
    pub left_shoulder: Option<Point>,
    pub right_shoulder: Option<Point>,
    pub left_elbow: Option<Point>,
    pub right_elbow: Option<Point>,
    pub left_wrist: Option<Point>,
    pub right_wrist: Option<Point>,
    pub left_hip: Option<Point>,
    pub right_hip: Option<Point>,
    pub left_knee: Option<Point>,
    pub right_knee: Option<Point>,
    pub left_ankle: Option<Point>,
    pub right_ankle: Option<Point>,
}

impl Keypoints {
    /// Scale the named landmarks to pixels.
    ///
    /// A keypoint is present when its index exists in `pose`. Returns `None`
    /// when fewer than `min_count` keypoints are present.
    pub fn extract(pose: &PoseLandmarks, width: u32, height: u32, min_count: usize) -> Option<Self> {
        let px = |idx| pose.pixel(idx, width, height);
        let kp = Self {
            nose: px(index::NOSE),
            left_shoulder: px(index::LEFT_SHOULDER),
            right_shoulder: px(index::RIGHT_SHOULDER),
            left_elbow: px(index::LEFT_ELBOW),
            right_elbow: px(index::RIGHT_ELBOW),
            left_wrist: px(index::LEFT_WRIST),
            right_wrist: px(index::RIGHT_WRIST),
            left_hip: px(index::LEFT_HIP),
            right_hip: px(index::RIGHT_HIP),
            left_knee: px(index::LEFT_KNEE),
            right_knee: px(index::RIGHT_KNEE),
            left_ankle: px(index::LEFT_ANKLE),
            right_ankle: px(index::RIGHT_ANKLE),
        };
        (kp.count() >= min_count).then_some(kp)
    }

    /// Number of keypoints present.
    pub fn count(&self) -> usize {
        [
            self.nose,
            self.left_shoulder,
            self.right_shoulder,
            self.left_elbow,
            self.right_elbow,
            self.left_wrist,
            self.right_wrist,
            self.left_hip,
            self.right_hip,
            self.left_knee,
            self.right_knee,
            self.left_ankle,
            self.right_ankle,
        ]
        .iter()
        .filter(|p| p.is_some())
        .count()
    }

    pub fn wrists(&self) -> Option<(Point, Point)> {
        Some((self.left_wrist?, self.right_wrist?))
    }

    pub fn elbows(&self) -> Option<(Point, Point)> {
        Some((self.left_elbow?, self.right_elbow?))
    }

    pub fn shoulders(&self) -> Option<(Point, Point)> {
        Some((self.left_shoulder?, self.right_shoulder?))
    }

    pub fn hips(&self) -> Option<(Point, Point)> {
        Some((self.left_hip?, self.right_hip?))
    }

    pub fn knees(&self) -> Option<(Point, Point)> {
        Some((self.left_knee?, self.right_knee?))
    }

    pub fn ankles(&self) -> Option<(Point, Point)> {
        Some((self.left_ankle?, self.right_ankle?))
    }
}

/// Midpoint of two points.
#[inline]
pub fn midpoint(a: Point, b: Point) -> Point {
    Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
}

/// Angle in degrees at `vertex` formed by `a` and `b`.
///
/// Returns 0 when either arm has zero length.
pub fn angle_at(a: Point, vertex: Point, b: Point) -> f64 {
    let (v1x, v1y) = (a.x - vertex.x, a.y - vertex.y);
    let (v2x, v2y) = (b.x - vertex.x, b.y - vertex.y);
    let n1 = v1x.hypot(v1y);
    let n2 = v2x.hypot(v2y);
    if n1 == 0.0 || n2 == 0.0 {
        return 0.0;
    }
    let cos = ((v1x * v2x + v1y * v2y) / (n1 * n2)).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

/// Direction of the segment `from -> to` in degrees, `atan2(dy, dx)`.
#[inline]
pub fn segment_angle(from: Point, to: Point) -> f64 {
    (to.y - from.y).atan2(to.x - from.x).to_degrees()
}

/// Spine lean from vertical, given the nose and the hip midpoint.
///
/// 90 means perfectly upright.
#[inline]
pub fn spine_angle(nose: Point, mid_hip: Point) -> f64 {
    let dx = mid_hip.x - nose.x;
    let dy = mid_hip.y - nose.y;
    90.0 - dx.atan2(dy).to_degrees().abs()
}

#[cfg(test)]
pub(crate) mod test_support {
    use swinglab_models::pose::LANDMARK_COUNT;
    use swinglab_models::{Landmark, PoseLandmarks};

    /// Full pose with every landmark at the frame center.
    pub fn pose_with(points: &[(usize, f64, f64)]) -> PoseLandmarks {
        let mut lms = vec![Landmark::new(0.5, 0.5, 0.0, 1.0); LANDMARK_COUNT];
        for &(idx, x, y) in points {
            lms[idx] = Landmark::new(x, y, 0.0, 1.0);
        }
        PoseLandmarks::new(lms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_requires_min_count() {
        let short = PoseLandmarks::new(vec![Default::default(); 20]);
        // Indices below 20: nose, shoulders, elbows, wrists.
        assert!(Keypoints::extract(&short, 100, 100, 8).is_none());
        let kp = Keypoints::extract(&short, 100, 100, 7).unwrap();
        assert_eq!(kp.count(), 7);
        assert!(kp.left_hip.is_none());
    }

    #[test]
    fn test_angle_at_right_angle() {
        let a = angle_at(Point::new(1.0, 0.0), Point::new(0.0, 0.0), Point::new(0.0, 1.0));
        assert!((a - 90.0).abs() < 1e-9);
        let straight = angle_at(Point::new(-1.0, 0.0), Point::new(0.0, 0.0), Point::new(1.0, 0.0));
        assert!((straight - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_angle_at_degenerate() {
        let p = Point::new(3.0, 3.0);
        assert_eq!(angle_at(p, p, Point::new(0.0, 0.0)), 0.0);
    }

    #[test]
    fn test_spine_angle_upright() {
        let nose = Point::new(100.0, 50.0);
        let hips = Point::new(100.0, 250.0);
        assert!((spine_angle(nose, hips) - 90.0).abs() < 1e-9);
    }
}
