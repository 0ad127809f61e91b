//! Bat speed, exit velocity and form metrics.

use serde::Serialize;
use swinglab_models::pose::index;
use swinglab_models::{Point, PoseLandmarks};

use crate::keypoints::{angle_at, midpoint};
use crate::signal::wrap_degrees;

const MPS_TO_MPH: f64 = 2.237;

/// Shoulder-to-barrel radius when the caller has no measurement: arm plus bat.
pub const DEFAULT_SWING_RADIUS_M: f64 = 1.3;

/// Torso length as a share of standing height (0.4 m for a 1.75 m batter).
const TORSO_HEIGHT_RATIO: f64 = 0.4 / 1.75;

const DEFAULT_BATTER_HEIGHT_M: f64 = 1.75;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatSpeed {
    /// Degrees per second
    pub angular_velocity: f64,
    /// Meters per second
    pub linear_speed: f64,
    pub linear_speed_mph: f64,
    pub radius: f64,
    pub units: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExitVelocity {
    pub exit_velocity: f64,
    pub exit_velocity_mph: f64,
    pub error_margin: f64,
    pub units: &'static str,
    pub note: &'static str,
}

/// One measured form metric against its ideal range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FormMetric {
    pub value: f64,
    pub ideal: (f64, f64),
    /// Value minus the middle of the ideal range
    pub deviation: f64,
}

impl FormMetric {
    fn new(value: f64, ideal: (f64, f64)) -> Self {
        Self {
            value,
            ideal,
            deviation: value - (ideal.0 + ideal.1) / 2.0,
        }
    }

    fn below(&self) -> bool {
        self.value < self.ideal.0
    }

    fn above(&self) -> bool {
        self.value > self.ideal.1
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FormMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hip_rotation: Option<FormMetric>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shoulder_separation: Option<FormMetric>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub front_knee_flex: Option<FormMetric>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stride_length: Option<FormMetric>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spine_tilt: Option<FormMetric>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elbow_extension: Option<FormMetric>,
    pub feedback: Vec<String>,
}

/// Ideal ranges used by [`MetricsCalculator::calculate_form_metrics`].
#[derive(Debug, Clone)]
pub struct FormIdealRanges {
    pub hip_rotation: (f64, f64),
    pub shoulder_separation: (f64, f64),
    pub front_knee_flex: (f64, f64),
    pub stride_length: (f64, f64),
    pub spine_tilt: (f64, f64),
    pub elbow_extension: (f64, f64),
}

impl Default for FormIdealRanges {
    fn default() -> Self {
        Self {
            hip_rotation: (45.0, 55.0),
            shoulder_separation: (30.0, 40.0),
            front_knee_flex: (120.0, 150.0),
            stride_length: (0.3, 0.5),
            spine_tilt: (-10.0, 10.0),
            elbow_extension: (150.0, 180.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsCalculator {
    /// Meters. Sets the torso length that converts pixel stride to meters.
    pub batter_height_m: f64,
    pub ideal_ranges: FormIdealRanges,
}

impl Default for MetricsCalculator {
    fn default() -> Self {
        Self::new(None)
    }
}

impl MetricsCalculator {
    pub fn new(batter_height_m: Option<f64>) -> Self {
        Self {
            batter_height_m: batter_height_m
                .filter(|h| *h > 0.0)
                .unwrap_or(DEFAULT_BATTER_HEIGHT_M),
            ideal_ranges: FormIdealRanges::default(),
        }
    }

    /// Bat speed at `contact_frame` from the frame-to-frame bat angle change.
    ///
    /// Missing angles count as 0°. Returns zeros when the contact frame is out of range.
    pub fn calculate_bat_speed(
        &self,
        bat_angles: &[Option<f64>],
        contact_frame: usize,
        fps: f64,
        radius: Option<f64>,
    ) -> BatSpeed {
        let radius = radius.filter(|r| *r > 0.0).unwrap_or(DEFAULT_SWING_RADIUS_M);
        if bat_angles.is_empty() || contact_frame >= bat_angles.len() {
            return BatSpeed {
                angular_velocity: 0.0,
                linear_speed: 0.0,
                linear_speed_mph: 0.0,
                radius,
                units: "m/s",
            };
        }

        let dt = if fps > 0.0 { 1.0 / fps } else { 1.0 };
        let angular_velocity = if contact_frame > 0 {
            let cur = bat_angles[contact_frame].unwrap_or(0.0);
            let prev = bat_angles[contact_frame - 1].unwrap_or(0.0);
            wrap_degrees(cur - prev).abs() / dt
        } else {
            0.0
        };

        let linear_speed = angular_velocity.to_radians() * radius;
        BatSpeed {
            angular_velocity,
            linear_speed,
            linear_speed_mph: linear_speed * MPS_TO_MPH,
            radius,
            units: "m/s",
        }
    }

    /// Heuristic exit velocity from bat speed, bat angle and the normalized
    /// impact point on the bat (sweet spot at `(0.5, 0.5)`).
    pub fn estimate_exit_velocity(
        &self,
        bat_speed: f64,
        bat_angle: f64,
        impact_point: Option<Point>,
    ) -> ExitVelocity {
        let angle_factor = if bat_angle.abs() < 10.0 {
            1.1
        } else if bat_angle.abs() > 30.0 {
            0.9
        } else {
            1.0
        };
        let impact_factor = impact_point
            .map(|p| 1.0 - p.distance(&Point::new(0.5, 0.5)) * 0.3)
            .unwrap_or(1.0);

        let exit_velocity = bat_speed * 1.35 * angle_factor * impact_factor;
        ExitVelocity {
            exit_velocity,
            exit_velocity_mph: exit_velocity * MPS_TO_MPH,
            error_margin: exit_velocity * 0.08,
            units: "m/s",
            note: "Estimate only - use bat sensor for clinical accuracy",
        }
    }

    /// Form metrics at the middle frame of the sequence.
    pub fn calculate_form_metrics(
        &self,
        landmarks: &[Option<PoseLandmarks>],
        frame_size: (u32, u32),
    ) -> FormMetrics {
        if landmarks.is_empty() {
            return FormMetrics::default();
        }
        let mut metrics = FormMetrics::default();
        if let Some(pose) = landmarks[landmarks.len() / 2].as_ref() {
            self.fill_metrics(&mut metrics, pose, frame_size);
        }
        metrics.feedback = feedback(&metrics);
        metrics
    }

    fn fill_metrics(&self, m: &mut FormMetrics, pose: &PoseLandmarks, (w, h): (u32, u32)) {
        let at = |idx: usize| pose.pixel(idx, w, h);
        let ranges = &self.ideal_ranges;

        let left_shoulder = at(index::LEFT_SHOULDER);
        let right_shoulder = at(index::RIGHT_SHOULDER);
        let left_elbow = at(index::LEFT_ELBOW);
        let left_wrist = at(index::LEFT_WRIST);
        let left_hip = at(index::LEFT_HIP);
        let right_hip = at(index::RIGHT_HIP);
        let left_knee = at(index::LEFT_KNEE);
        let left_ankle = at(index::LEFT_ANKLE);
        let right_ankle = at(index::RIGHT_ANKLE);
        let nose = at(index::NOSE);

        if let (Some(l), Some(r)) = (left_hip, right_hip) {
            let angle = (r.y - l.y).atan2(r.x - l.x).to_degrees();
            m.hip_rotation = Some(FormMetric::new(angle, ranges.hip_rotation));
        }
        if let (Some(l), Some(r)) = (left_shoulder, right_shoulder) {
            let angle = (r.y - l.y).atan2(r.x - l.x).to_degrees();
            m.shoulder_separation = Some(FormMetric::new(angle, ranges.shoulder_separation));
        }
        if let (Some(hip), Some(knee), Some(ankle)) = (left_hip, left_knee, left_ankle) {
            m.front_knee_flex = Some(FormMetric::new(
                angle_at(hip, knee, ankle),
                ranges.front_knee_flex,
            ));
        }
        if let (Some(la), Some(ra), Some(shoulder), Some(hip)) =
            (left_ankle, right_ankle, left_shoulder, left_hip)
        {
            let torso = shoulder.distance(&hip);
            if torso > 0.0 {
                let torso_m = self.batter_height_m * TORSO_HEIGHT_RATIO;
                let stride = la.distance(&ra) * torso_m / torso;
                m.stride_length = Some(FormMetric::new(stride, ranges.stride_length));
            }
        }
        if let (Some(nose), Some(l), Some(r)) = (nose, left_hip, right_hip) {
            let mid = midpoint(l, r);
            let tilt = (mid.x - nose.x).atan2(mid.y - nose.y).to_degrees() - 90.0;
            m.spine_tilt = Some(FormMetric::new(tilt, ranges.spine_tilt));
        }
        if let (Some(shoulder), Some(elbow), Some(wrist)) = (left_shoulder, left_elbow, left_wrist) {
            m.elbow_extension = Some(FormMetric::new(
                angle_at(shoulder, elbow, wrist),
                ranges.elbow_extension,
            ));
        }
    }
}

fn feedback(m: &FormMetrics) -> Vec<String> {
    let mut out = Vec::new();
    if m.hip_rotation.is_some_and(|x| x.below()) {
        out.push("Hip rotation delayed - try closed-hip drills");
    }
    if m.shoulder_separation.is_some_and(|x| x.below()) {
        out.push("Shoulder separation could improve - focus on loading phase");
    }
    if m.front_knee_flex.is_some_and(|x| x.below()) {
        out.push("Front knee could be more flexed - improve weight transfer");
    }
    if m.spine_tilt.is_some_and(|x| x.above()) {
        out.push("Excessive spine tilt - maintain upright posture");
    }
    if out.is_empty() {
        out.push("Form looks good! Keep practicing.");
    }
    out.into_iter().map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoints::test_support::pose_with;

    #[test]
    fn test_bat_speed_at_contact() {
        let calc = MetricsCalculator::default();
        let angles = [Some(0.0), Some(10.0), Some(30.0)];
        let speed = calc.calculate_bat_speed(&angles, 2, 30.0, None);

        assert!((speed.angular_velocity - 600.0).abs() < 1e-9);
        let expected = 600f64.to_radians() * 1.3;
        assert!((speed.linear_speed - expected).abs() < 1e-9);
        assert!((speed.linear_speed_mph - expected * 2.237).abs() < 1e-9);
        assert_eq!(speed.units, "m/s");
    }

    #[test]
    fn test_bat_speed_wraps_angle() {
        let calc = MetricsCalculator::default();
        let speed = calc.calculate_bat_speed(&[Some(170.0), Some(-170.0)], 1, 10.0, Some(1.0));
        assert!((speed.angular_velocity - 200.0).abs() < 1e-9);
        assert_eq!(speed.radius, 1.0);
    }

    #[test]
    fn test_bat_speed_out_of_range() {
        let calc = MetricsCalculator::default();
        let speed = calc.calculate_bat_speed(&[Some(1.0)], 3, 30.0, None);
        assert_eq!(speed.angular_velocity, 0.0);
        assert_eq!(speed.linear_speed, 0.0);
    }

    #[test]
    fn test_exit_velocity_factors() {
        let calc = MetricsCalculator::default();

        let sweet = calc.estimate_exit_velocity(30.0, 5.0, None);
        assert!((sweet.exit_velocity - 30.0 * 1.35 * 1.1).abs() < 1e-9);
        assert!((sweet.error_margin - sweet.exit_velocity * 0.08).abs() < 1e-9);

        let steep = calc.estimate_exit_velocity(30.0, 45.0, Some(Point::new(0.5, 0.5)));
        assert!((steep.exit_velocity - 30.0 * 1.35 * 0.9).abs() < 1e-9);

        let off_center = calc.estimate_exit_velocity(30.0, 20.0, Some(Point::new(0.5, 1.0)));
        assert!((off_center.exit_velocity - 30.0 * 1.35 * 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_form_metrics_use_middle_frame() {
        let calc = MetricsCalculator::default();
        let pose = pose_with(&[
            (index::LEFT_HIP, 0.4, 0.5),
            (index::RIGHT_HIP, 0.5, 0.5),
            (index::LEFT_SHOULDER, 0.4, 0.3),
            (index::RIGHT_SHOULDER, 0.5, 0.3),
            (index::LEFT_ANKLE, 0.3, 0.9),
            (index::RIGHT_ANKLE, 0.5, 0.9),
        ]);
        let frames = vec![None, Some(pose), None];
        let metrics = calc.calculate_form_metrics(&frames, (1000, 1000));

        let hip = metrics.hip_rotation.unwrap();
        assert_eq!(hip.value, 0.0);
        assert_eq!(hip.deviation, -50.0);
        // 200 px ankle gap over a 200 px torso.
        assert!((metrics.stride_length.unwrap().value - 0.4).abs() < 1e-9);
        assert!(metrics
            .feedback
            .contains(&"Hip rotation delayed - try closed-hip drills".to_string()));
    }

    #[test]
    fn test_stride_scales_with_batter_height() {
        let pose = pose_with(&[
            (index::LEFT_HIP, 0.4, 0.5),
            (index::LEFT_SHOULDER, 0.4, 0.3),
            (index::LEFT_ANKLE, 0.3, 0.9),
            (index::RIGHT_ANKLE, 0.5, 0.9),
        ]);
        let frames = vec![Some(pose)];

        let tall = MetricsCalculator::new(Some(3.5)).calculate_form_metrics(&frames, (1000, 1000));
        assert!((tall.stride_length.unwrap().value - 0.8).abs() < 1e-9);

        let unset = MetricsCalculator::new(Some(0.0));
        assert_eq!(unset.batter_height_m, 1.75);
    }

    #[test]
    fn test_form_metrics_without_pose() {
        let calc = MetricsCalculator::default();
        let metrics = calc.calculate_form_metrics(&[None], (640, 480));
        assert!(metrics.hip_rotation.is_none());
        assert_eq!(metrics.feedback, vec!["Form looks good! Keep practicing."]);
    }
}
