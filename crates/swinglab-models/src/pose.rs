//! Pose landmarks in the 33-point BlazePose layout.

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Number of landmarks in a full pose.
pub const LANDMARK_COUNT: usize = 33;

/// Landmark indices used by the analyzers.
pub mod index {
    pub const NOSE: usize = 0;
    pub const LEFT_SHOULDER: usize = 11;
    pub const RIGHT_SHOULDER: usize = 12;
    pub const LEFT_ELBOW: usize = 13;
    pub const RIGHT_ELBOW: usize = 14;
    pub const LEFT_WRIST: usize = 15;
    pub const RIGHT_WRIST: usize = 16;
    pub const LEFT_HIP: usize = 23;
    pub const RIGHT_HIP: usize = 24;
    pub const LEFT_KNEE: usize = 25;
    pub const RIGHT_KNEE: usize = 26;
    pub const LEFT_ANKLE: usize = 27;
    pub const RIGHT_ANKLE: usize = 28;
}

/// One normalized landmark. `x` and `y` are in `[0, 1]` relative to the frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default)]
    pub visibility: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64, visibility: f64) -> Self {
        Self { x, y, z, visibility }
    }

    /// Scale to pixel coordinates.
    #[inline]
    pub fn to_pixels(&self, width: u32, height: u32) -> Point {
        Point::new(self.x * width as f64, self.y * height as f64)
    }
}

/// Ordered landmarks for one frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoseLandmarks(pub Vec<Landmark>);

impl PoseLandmarks {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self(landmarks)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Landmark> {
        self.0.get(idx)
    }

    /// Landmark `idx` in pixel coordinates.
    pub fn pixel(&self, idx: usize, width: u32, height: u32) -> Option<Point> {
        self.0.get(idx).map(|l| l.to_pixels(width, height))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Landmark> {
        self.0.iter()
    }
}

impl From<Vec<Landmark>> for PoseLandmarks {
    fn from(v: Vec<Landmark>) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_scaling() {
        let mut lms = vec![Landmark::default(); LANDMARK_COUNT];
        lms[index::LEFT_WRIST] = Landmark::new(0.5, 0.25, 0.0, 1.0);
        let pose = PoseLandmarks::new(lms);
        let p = pose.pixel(index::LEFT_WRIST, 640, 480).unwrap();
        assert_eq!(p, Point::new(320.0, 120.0));
        assert!(pose.pixel(40, 640, 480).is_none());
    }
}
