//! Rule-based swing form error detection.

use std::collections::HashSet;

use serde::Serialize;
use swinglab_models::{FormError, FormErrorType, PoseLandmarks, Severity};
use tracing::debug;

use crate::biomechanics::weight_distribution;
use crate::keypoints::{angle_at, midpoint, segment_angle, spine_angle, Keypoints};

const MIN_KEYPOINTS: usize = 10;

/// Stride scale: a batter of 1.75 m is assumed to span about 600 px.
const PIXELS_PER_METER: f64 = 600.0 / 1.75;

/// Detection thresholds.
#[derive(Debug, Clone)]
pub struct FormThresholds {
    /// Fraction of the pre-contact frames before the hips start turning
    pub hip_rotation_early: f64,
    pub hip_rotation_late: f64,
    /// Meters
    pub stride_length_min: f64,
    pub stride_length_max: f64,
    /// Degrees
    pub front_knee_flex_min: f64,
    pub front_knee_flex_max: f64,
    pub elbow_angle_min: f64,
    pub spine_tilt_max: f64,
    /// Pixels
    pub hand_drop_threshold: f64,
    pub separation_min: f64,
}

impl Default for FormThresholds {
    fn default() -> Self {
        Self {
            hip_rotation_early: 0.3,
            hip_rotation_late: 0.7,
            stride_length_min: 0.2,
            stride_length_max: 0.6,
            front_knee_flex_min: 120.0,
            front_knee_flex_max: 150.0,
            elbow_angle_min: 90.0,
            spine_tilt_max: 15.0,
            hand_drop_threshold: 50.0,
            separation_min: 30.0,
        }
    }
}

/// Detected errors for one swing.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FormAnalysis {
    pub errors: Vec<FormError>,
    pub error_count: usize,
    /// 0 to 1, higher is worse
    pub severity_score: f64,
    pub recommendations: Vec<String>,
}

/// Detects common swing faults from a pose sequence.
#[derive(Debug, Clone, Default)]
pub struct FormErrorDetector {
    thresholds: FormThresholds,
}

impl FormErrorDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: FormThresholds) -> Self {
        Self { thresholds }
    }

    /// Run every check around `contact_frame` (the middle frame when unknown
    /// or out of range). Errors are unique per type, most severe first.
    pub fn detect_errors(
        &self,
        landmarks: &[Option<PoseLandmarks>],
        frame_size: (u32, u32),
        contact_frame: Option<usize>,
    ) -> FormAnalysis {
        if landmarks.is_empty() {
            return FormAnalysis::default();
        }

        let (width, height) = frame_size;
        let seq: Vec<Option<Keypoints>> = landmarks
            .iter()
            .map(|l| {
                l.as_ref()
                    .and_then(|p| Keypoints::extract(p, width, height, MIN_KEYPOINTS))
            })
            .collect();

        let contact = match contact_frame {
            Some(c) if c < seq.len() => c,
            _ => seq.len() / 2,
        };
        let at_contact = seq[contact];

        let mut errors = Vec::new();
        errors.extend(self.hip_rotation_errors(&seq, contact));
        if let Some(kp) = at_contact.as_ref() {
            errors.extend(self.stride_errors(kp, contact));
            errors.extend(self.knee_errors(kp, contact));
            errors.extend(self.elbow_errors(&seq, kp, contact));
        }
        errors.extend(self.hand_errors(&seq, contact));
        if let Some(kp) = at_contact.as_ref() {
            errors.extend(self.spine_errors(kp, contact));
            errors.extend(self.weight_errors(kp, contact));
        }
        errors.extend(self.separation_errors(&seq, contact));
        if let Some(kp) = at_contact.as_ref() {
            errors.extend(self.rotation_errors(kp, contact));
        }

        let mut seen = HashSet::new();
        errors.retain(|e| seen.insert(e.error_type));
        errors.sort_by(|a, b| b.severity.cmp(&a.severity));

        debug!(contact, error_count = errors.len(), "Form errors detected");

        let severity_score = severity_score(&errors);
        let recommendations = recommendations(&errors);
        FormAnalysis {
            error_count: errors.len(),
            errors,
            severity_score,
            recommendations,
        }
    }

    fn hip_rotation_errors(&self, seq: &[Option<Keypoints>], contact: usize) -> Vec<FormError> {
        if contact < 2 {
            return Vec::new();
        }
        let angles: Vec<f64> = seq[..=contact]
            .iter()
            .flatten()
            .filter_map(|kp| kp.hips())
            .map(|(l, r)| segment_angle(l, r))
            .collect();
        if angles.len() < 3 {
            return Vec::new();
        }

        let initial = angles[0];
        let changes: Vec<f64> = angles[1..].iter().map(|a| (a - initial).abs()).collect();
        let max_change = changes.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if max_change <= 10.0 {
            return Vec::new();
        }

        // The largest change in the first half marks where rotation starts.
        let first_half = &changes[..changes.len() / 2];
        let Some(half_max) = first_half.iter().copied().reduce(f64::max) else {
            return Vec::new();
        };
        let Some(pos) = changes.iter().position(|&c| c == half_max) else {
            return Vec::new();
        };
        let start = pos + 1;
        let timing = start as f64 / angles.len() as f64;

        if timing < self.thresholds.hip_rotation_early {
            vec![FormError::new(
                FormErrorType::EarlyHipRotation,
                Severity::Moderate,
                start,
                "Hip rotation starting too early in swing",
                "Reduces power generation and timing",
            )]
        } else if timing > self.thresholds.hip_rotation_late {
            vec![FormError::new(
                FormErrorType::LateHipRotation,
                Severity::Moderate,
                start,
                "Hip rotation starting too late in swing",
                "Reduces power and bat speed",
            )]
        } else {
            Vec::new()
        }
    }

    fn stride_errors(&self, kp: &Keypoints, frame: usize) -> Option<FormError> {
        let (la, ra) = kp.ankles()?;
        let stride = (la.x - ra.x).abs() / PIXELS_PER_METER;

        if stride > self.thresholds.stride_length_max {
            Some(FormError::new(
                FormErrorType::Overstride,
                Severity::Moderate,
                frame,
                format!("Stride length ({stride:.2}m) is too long"),
                "Reduces balance and power transfer",
            ))
        } else if stride < self.thresholds.stride_length_min {
            Some(FormError::new(
                FormErrorType::Understride,
                Severity::Minor,
                frame,
                format!("Stride length ({stride:.2}m) is too short"),
                "Limits power generation",
            ))
        } else {
            None
        }
    }

    fn knee_errors(&self, kp: &Keypoints, frame: usize) -> Option<FormError> {
        let (la, ra) = kp.ankles()?;
        let angle = if la.x > ra.x {
            angle_at(kp.left_hip?, kp.left_knee?, la)
        } else {
            angle_at(kp.right_hip?, kp.right_knee?, ra)
        };

        if angle < self.thresholds.front_knee_flex_min {
            Some(FormError::new(
                FormErrorType::CollapsingFrontLeg,
                Severity::Moderate,
                frame,
                format!("Front knee collapsing (angle: {angle:.1}°)"),
                "Reduces power and stability",
            ))
        } else if angle > self.thresholds.front_knee_flex_max {
            Some(FormError::new(
                FormErrorType::UprightFrontLeg,
                Severity::Minor,
                frame,
                format!("Front leg too upright (angle: {angle:.1}°)"),
                "Limits weight transfer",
            ))
        } else {
            None
        }
    }

    fn elbow_errors(&self, seq: &[Option<Keypoints>], kp: &Keypoints, contact: usize) -> Vec<FormError> {
        let mut errors = Vec::new();
        let (Some(shoulder), Some(elbow), Some(wrist)) =
            (kp.right_shoulder, kp.right_elbow, kp.right_wrist)
        else {
            return errors;
        };

        let angle = angle_at(shoulder, elbow, wrist);
        if angle < self.thresholds.elbow_angle_min {
            errors.push(FormError::new(
                FormErrorType::ChickenWing,
                Severity::Moderate,
                contact,
                format!("Chicken wing detected (elbow angle: {angle:.1}°)"),
                "Reduces bat speed and power",
            ));
        }

        // Casting: the elbow pulled well away from the shoulder over three frames.
        if contact > 2 {
            if let Some(earlier_elbow) = seq[contact - 3].and_then(|e| e.right_elbow) {
                let earlier = earlier_elbow.distance(&shoulder);
                let current = elbow.distance(&shoulder);
                if current > earlier * 1.3 {
                    errors.push(FormError::new(
                        FormErrorType::Casting,
                        Severity::Moderate,
                        contact,
                        "Early arm extension (casting) detected",
                        "Reduces bat speed and contact quality",
                    ));
                }
            }
        }

        errors
    }

    fn hand_errors(&self, seq: &[Option<Keypoints>], contact: usize) -> Option<FormError> {
        if contact < 2 {
            return None;
        }
        let (cl, cr) = seq[contact]?.wrists()?;
        let (el, er) = seq[contact.saturating_sub(5)]?.wrists()?;
        let drop = (cl.y + cr.y) / 2.0 - (el.y + er.y) / 2.0;
        let threshold = self.thresholds.hand_drop_threshold;

        if drop > threshold {
            Some(FormError::new(
                FormErrorType::DroppingHands,
                Severity::Moderate,
                contact,
                "Hands dropping during swing",
                "Reduces bat path and contact quality",
            ))
        } else if drop < -threshold {
            Some(FormError::new(
                FormErrorType::LiftingHands,
                Severity::Minor,
                contact,
                "Hands lifting during swing",
                "May cause pop-ups or weak contact",
            ))
        } else {
            None
        }
    }

    fn spine_errors(&self, kp: &Keypoints, frame: usize) -> Option<FormError> {
        let nose = kp.nose?;
        let (lh, rh) = kp.hips()?;
        // Lean away from vertical; an upright spine reads 0.
        let tilt = 90.0 - spine_angle(nose, midpoint(lh, rh));

        (tilt.abs() > self.thresholds.spine_tilt_max).then(|| {
            FormError::new(
                FormErrorType::SpineTiltExcessive,
                Severity::Moderate,
                frame,
                format!("Excessive spine tilt ({tilt:.1}°)"),
                "Reduces balance and power transfer",
            )
        })
    }

    fn weight_errors(&self, kp: &Keypoints, frame: usize) -> Option<FormError> {
        let weight = weight_distribution(kp)?;

        (weight.back_leg_weight > 0.6).then(|| {
            FormError::new(
                FormErrorType::WeightOnBackFoot,
                Severity::Moderate,
                frame,
                format!(
                    "Too much weight on back foot at contact ({:.0}%)",
                    weight.back_leg_weight * 100.0
                ),
                "Reduces power transfer and bat speed",
            )
        })
    }

    fn separation_errors(&self, seq: &[Option<Keypoints>], contact: usize) -> Option<FormError> {
        let load = contact.saturating_sub(5);
        let kp = (*seq.get(load)?)?;
        let (lh, rh) = kp.hips()?;
        let (ls, rs) = kp.shoulders()?;
        let separation = ((ls.x + rs.x) / 2.0 - (lh.x + rh.x) / 2.0).abs();

        (separation < self.thresholds.separation_min).then(|| {
            FormError::new(
                FormErrorType::NoSeparation,
                Severity::Moderate,
                load,
                "Insufficient hip-shoulder separation (X-factor)",
                "Significantly reduces power generation",
            )
        })
    }

    fn rotation_errors(&self, kp: &Keypoints, frame: usize) -> Option<FormError> {
        let (ls, rs) = kp.shoulders()?;
        let rotation = segment_angle(ls, rs);

        if rotation > 70.0 {
            Some(FormError::new(
                FormErrorType::OverRotation,
                Severity::Minor,
                frame,
                format!("Over-rotation detected ({rotation:.1}°)"),
                "May cause timing issues",
            ))
        } else if rotation < 20.0 {
            Some(FormError::new(
                FormErrorType::UnderRotation,
                Severity::Moderate,
                frame,
                format!("Under-rotation detected ({rotation:.1}°)"),
                "Reduces power and bat speed",
            ))
        } else {
            None
        }
    }
}

fn severity_score(errors: &[FormError]) -> f64 {
    if errors.is_empty() {
        return 0.0;
    }
    let total: u32 = errors.iter().map(|e| e.severity.value() as u32).sum();
    (total as f64 / (errors.len() as f64 * 3.0)).min(1.0)
}

fn recommendations(errors: &[FormError]) -> Vec<String> {
    if errors.is_empty() {
        return vec![
            "No major form errors detected. Continue practicing to maintain good mechanics."
                .to_string(),
        ];
    }
    errors
        .iter()
        .map(|e| e.error_type.recommendation().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoints::test_support::pose_with;
    use swinglab_models::pose::index::*;

    const SIZE: (u32, u32) = (1000, 1000);

    /// Balanced stance that passes every check.
    fn good_points() -> Vec<(usize, f64, f64)> {
        vec![
            (NOSE, 0.45, 0.2),
            (LEFT_SHOULDER, 0.45, 0.25),
            (RIGHT_SHOULDER, 0.55, 0.35),
            (RIGHT_ELBOW, 0.6, 0.45),
            (RIGHT_WRIST, 0.65, 0.55),
            (LEFT_HIP, 0.42, 0.5),
            (RIGHT_HIP, 0.48, 0.5),
            (LEFT_KNEE, 0.54, 0.7),
            (RIGHT_KNEE, 0.38, 0.7),
            (LEFT_ANKLE, 0.52, 0.9),
            (RIGHT_ANKLE, 0.38, 0.9),
        ]
    }

    fn with(overrides: &[(usize, f64, f64)]) -> PoseLandmarks {
        let mut points = good_points();
        points.extend_from_slice(overrides);
        pose_with(&points)
    }

    fn repeat(pose: PoseLandmarks, n: usize) -> Vec<Option<PoseLandmarks>> {
        vec![Some(pose); n]
    }

    fn types(analysis: &FormAnalysis) -> Vec<FormErrorType> {
        analysis.errors.iter().map(|e| e.error_type).collect()
    }

    #[test]
    fn test_good_form_has_no_errors() {
        let detector = FormErrorDetector::new();
        let result = detector.detect_errors(&repeat(with(&[]), 10), SIZE, Some(6));

        assert!(result.errors.is_empty(), "unexpected: {:?}", types(&result));
        assert_eq!(result.severity_score, 0.0);
        assert_eq!(result.recommendations.len(), 1);
        assert!(result.recommendations[0].starts_with("No major form errors"));
    }

    #[test]
    fn test_empty_input() {
        let result = FormErrorDetector::new().detect_errors(&[], SIZE, None);
        assert_eq!(result.error_count, 0);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_overstride_sorted_by_severity() {
        // Wide stance also straightens the front knee.
        let pose = with(&[(LEFT_ANKLE, 0.75, 0.9)]);
        let result = FormErrorDetector::new().detect_errors(&repeat(pose, 10), SIZE, Some(6));

        assert_eq!(
            types(&result),
            vec![FormErrorType::Overstride, FormErrorType::UprightFrontLeg]
        );
        assert_eq!(result.errors[0].severity, Severity::Moderate);
        assert_eq!(result.errors[1].severity, Severity::Minor);
        assert!(result.errors[0].description.contains("1.08m"));
        assert!((result.severity_score - 0.5).abs() < 1e-9);
        assert_eq!(result.recommendations.len(), 2);
    }

    #[test]
    fn test_chicken_wing() {
        let pose = with(&[(RIGHT_WRIST, 0.5, 0.45)]);
        let result = FormErrorDetector::new().detect_errors(&repeat(pose, 10), SIZE, Some(6));

        assert_eq!(types(&result), vec![FormErrorType::ChickenWing]);
        assert_eq!(result.errors[0].frame, 6);
    }

    #[test]
    fn test_dropping_hands() {
        let mut frames = repeat(with(&[]), 6);
        frames.extend(repeat(
            with(&[(RIGHT_WRIST, 0.65, 0.65), (LEFT_WRIST, 0.5, 0.6)]),
            4,
        ));
        let result = FormErrorDetector::new().detect_errors(&frames, SIZE, Some(6));

        assert_eq!(types(&result), vec![FormErrorType::DroppingHands]);
    }

    #[test]
    fn test_missing_contact_pose_skips_contact_checks() {
        let mut frames = repeat(with(&[(LEFT_ANKLE, 0.75, 0.9)]), 10);
        frames[5] = None;
        let result = FormErrorDetector::new().detect_errors(&frames, SIZE, None);

        assert!(!types(&result).contains(&FormErrorType::Overstride));
    }

    #[test]
    fn test_weight_on_back_foot() {
        // Left leg is in front; the back knee keeps its 200 px flex while the front straightens to 50 px.
        let pose = with(&[(LEFT_KNEE, 0.54, 0.85)]);
        let result = FormErrorDetector::new().detect_errors(&repeat(pose, 10), SIZE, Some(6));

        let error = result
            .errors
            .iter()
            .find(|e| e.error_type == FormErrorType::WeightOnBackFoot)
            .unwrap();
        assert_eq!(error.severity, Severity::Moderate);
        assert!(error.description.contains("80%"));
    }

    #[test]
    fn test_weight_forward_is_not_flagged() {
        let pose = with(&[(RIGHT_KNEE, 0.38, 0.85)]);
        let result = FormErrorDetector::new().detect_errors(&repeat(pose, 10), SIZE, Some(6));
        assert!(!types(&result).contains(&FormErrorType::WeightOnBackFoot));

        let balanced = FormErrorDetector::new().detect_errors(&repeat(with(&[]), 10), SIZE, Some(6));
        assert!(!types(&balanced).contains(&FormErrorType::WeightOnBackFoot));
    }

    #[test]
    fn test_errors_unique_and_most_severe_first() {
        // Wide stance plus a bent trail arm trips three rules across two severities.
        let pose = with(&[(LEFT_ANKLE, 0.75, 0.9), (RIGHT_WRIST, 0.5, 0.45)]);
        let result = FormErrorDetector::new().detect_errors(&repeat(pose, 10), SIZE, Some(6));

        assert_eq!(
            types(&result),
            vec![
                FormErrorType::Overstride,
                FormErrorType::ChickenWing,
                FormErrorType::UprightFrontLeg,
            ]
        );
        let unique: HashSet<_> = result.errors.iter().map(|e| e.error_type).collect();
        assert_eq!(unique.len(), result.errors.len());
        assert!(result
            .errors
            .windows(2)
            .all(|w| w[0].severity >= w[1].severity));
        assert_eq!(result.error_count, 3);
        // (2 + 2 + 1) / 9
        assert!((result.severity_score - 5.0 / 9.0).abs() < 1e-9);
    }
}
