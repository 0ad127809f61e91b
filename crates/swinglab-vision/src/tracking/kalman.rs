//! Constant-velocity Kalman filter over `[cx, cy, aspect, height]` boxes.
//!
//! # State Vector
//! ```text
//! [cx, cy, a, h, vx, vy, va]
//!  ^center ^shape ^velocities
//! ```
//! Height has no velocity term.

use nalgebra::{SMatrix, SVector};
use swinglab_models::BoundingBox;

type StateVec = SVector<f64, 7>;
type StateMat = SMatrix<f64, 7, 7>;
type MeasVec = SVector<f64, 4>;
type MeasMat = SMatrix<f64, 4, 7>;

const PROCESS_NOISE: f64 = 0.03;
const MEASUREMENT_NOISE: f64 = 0.1;

/// Convert a box to the `[cx, cy, w/h, h]` measurement.
///
/// Degenerate boxes use an aspect ratio of 1.
pub fn to_xyah(bbox: &BoundingBox) -> [f64; 4] {
    let w = bbox.width();
    let h = bbox.height();
    let a = if h > 0.0 { w / h } else { 1.0 };
    [bbox.cx(), bbox.cy(), a, h]
}

/// Inverse of [`to_xyah`].
pub fn from_xyah(xyah: [f64; 4]) -> BoundingBox {
    let [x, y, a, h] = xyah;
    BoundingBox::from_center(x, y, a * h, h)
}

/// Kalman filter for one tracked box.
#[derive(Debug, Clone)]
pub struct BoxKalmanFilter {
    state: StateVec,
    covariance: StateMat,
    transition: StateMat,
    measurement: MeasMat,
    process_noise: StateMat,
    measurement_noise: SMatrix<f64, 4, 4>,
}

impl BoxKalmanFilter {
    /// Initialise at `bbox` with zero velocity and unit covariance.
    pub fn new(bbox: &BoundingBox) -> Self {
        let [x, y, a, h] = to_xyah(bbox);

        let mut transition = StateMat::identity();
        transition[(0, 4)] = 1.0;
        transition[(1, 5)] = 1.0;
        transition[(2, 6)] = 1.0;

        let mut measurement = MeasMat::zeros();
        for i in 0..4 {
            measurement[(i, i)] = 1.0;
        }

        Self {
            state: StateVec::from_column_slice(&[x, y, a, h, 0.0, 0.0, 0.0]),
            covariance: StateMat::identity(),
            transition,
            measurement,
            process_noise: StateMat::identity() * PROCESS_NOISE,
            measurement_noise: SMatrix::<f64, 4, 4>::identity() * MEASUREMENT_NOISE,
        }
    }

    /// Advance one frame and return the predicted box.
    pub fn predict(&mut self) -> BoundingBox {
        self.state = self.transition * self.state;
        self.covariance =
            self.transition * self.covariance * self.transition.transpose() + self.process_noise;
        self.bbox()
    }

    /// Fold in an observed box and return the corrected box.
    pub fn correct(&mut self, bbox: &BoundingBox) -> BoundingBox {
        let z = MeasVec::from(to_xyah(bbox));
        let innovation = z - self.measurement * self.state;
        let s = self.measurement * self.covariance * self.measurement.transpose()
            + self.measurement_noise;

        // S is symmetric positive definite for any reachable covariance.
        let Some(s_inv) = s.try_inverse() else {
            return self.bbox();
        };
        let gain = self.covariance * self.measurement.transpose() * s_inv;

        self.state += gain * innovation;
        self.covariance = (StateMat::identity() - gain * self.measurement) * self.covariance;
        self.bbox()
    }

    /// Current box estimate.
    pub fn bbox(&self) -> BoundingBox {
        from_xyah([self.state[0], self.state[1], self.state[2], self.state[3]])
    }

    /// Estimated center velocity in pixels per frame.
    pub fn velocity(&self) -> (f64, f64) {
        (self.state[4], self.state[5])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xyah_round_trip_degenerate() {
        let flat = BoundingBox::new(10.0, 10.0, 30.0, 10.0);
        let xyah = to_xyah(&flat);
        assert_eq!(xyah[2], 1.0);
        assert_eq!(xyah[3], 0.0);
    }

    #[test]
    fn test_predict_without_velocity_is_stationary() {
        let bbox = BoundingBox::new(100.0, 100.0, 150.0, 160.0);
        let mut kf = BoxKalmanFilter::new(&bbox);
        let p = kf.predict();
        assert!((p.cx() - bbox.cx()).abs() < 1e-9);
        assert!((p.height() - bbox.height()).abs() < 1e-9);
    }

    #[test]
    fn test_correct_learns_velocity() {
        let mut kf = BoxKalmanFilter::new(&BoundingBox::new(0.0, 0.0, 20.0, 20.0));
        for step in 1..=10 {
            kf.predict();
            let shift = step as f64 * 5.0;
            kf.correct(&BoundingBox::new(shift, 0.0, shift + 20.0, 20.0));
        }
        let (vx, vy) = kf.velocity();
        assert!(vx > 3.0, "vx = {vx}");
        assert!(vy.abs() < 0.5);
        let next = kf.predict();
        assert!(next.cx() > 55.0);
    }
}
