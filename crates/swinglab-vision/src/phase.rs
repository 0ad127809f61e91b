//! Swing phase classification.
//!
//! Each frame is re-classified with a priority cascade over landmark
//! geometry: contact, follow-through, stride, load, then stance or the
//! previous phase. A short history supplies the "recently saw contact"
//! signal and the fallback phase.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;
use swinglab_models::{BallObservation, Point, PoseLandmarks, SwingPhase};
use tracing::trace;

use crate::keypoints::Keypoints;

const MIN_LANDMARKS: usize = 20;
const MIN_KEYPOINTS: usize = 8;
const METRICS_HISTORY: usize = 30;
const PHASE_HISTORY: usize = 10;

const CONTACT_DISTANCE_PX: f64 = 50.0;
const STRIDE_ANKLE_PX: f64 = 100.0;
const STRIDE_KNEE_PX: f64 = 80.0;
const LOAD_WRIST_LIFT_PX: f64 = 20.0;

/// Geometry measured on one frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PhaseMetrics {
    pub frame: usize,
    pub avg_wrist_y: Option<f64>,
    pub wrist_separation: Option<f64>,
    /// Right wrist x; a right-handed batter's hands lead with it
    pub wrist_forward: Option<f64>,
    pub avg_elbow_y: Option<f64>,
    pub wrists_above_elbows: Option<bool>,
    pub hip_separation: Option<f64>,
    pub hip_center_x: Option<f64>,
    pub knee_separation: Option<f64>,
    pub ankle_separation: Option<f64>,
    pub stride_length_pixels: Option<f64>,
    pub bat_angle: Option<f64>,
    pub bat_x: Option<f64>,
    pub bat_y: Option<f64>,
    pub ball_x: Option<f64>,
    pub ball_y: Option<f64>,
    pub ball_detected: bool,
    /// Change in average wrist height since the previous classified frame
    pub wrist_y_velocity: Option<f64>,
    pub bat_x_velocity: Option<f64>,
}

/// Classification of one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseDetection {
    pub phase: SwingPhase,
    pub confidence: f64,
    pub frame: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<PhaseMetrics>,
}

impl PhaseDetection {
    fn unknown(frame: usize) -> Self {
        Self {
            phase: SwingPhase::Unknown,
            confidence: 0.0,
            frame,
            metrics: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseTransition {
    pub from: SwingPhase,
    pub to: SwingPhase,
    pub frame: usize,
}

/// First frame of each phase.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct KeyFrames {
    pub stance: Option<usize>,
    pub load: Option<usize>,
    pub stride: Option<usize>,
    pub contact: Option<usize>,
    pub follow_through: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SwingQuality {
    pub has_all_phases: bool,
    pub phase_order_correct: bool,
    pub transition_smoothness: f64,
    pub issues: Vec<String>,
}

/// Phase analysis over a whole swing.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseSequence {
    pub phases: Vec<PhaseDetection>,
    pub phase_transitions: Vec<PhaseTransition>,
    pub key_frames: KeyFrames,
    /// Frames spent in each phase, keyed by phase name
    pub phase_duration: BTreeMap<String, usize>,
    pub swing_quality: SwingQuality,
}

/// Classifies swing phases frame by frame.
#[derive(Debug, Default)]
pub struct SwingPhaseDetector {
    phase_history: VecDeque<SwingPhase>,
    metrics_history: VecDeque<PhaseMetrics>,
}

impl SwingPhaseDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify one frame.
    ///
    /// Frames without a usable pose are `Unknown` and leave the history untouched.
    pub fn detect_phase(
        &mut self,
        landmarks: Option<&PoseLandmarks>,
        bat_angle: Option<f64>,
        bat_position: Option<Point>,
        ball: Option<&BallObservation>,
        frame_size: (u32, u32),
        frame_idx: usize,
    ) -> PhaseDetection {
        let Some(pose) = landmarks.filter(|p| p.len() >= MIN_LANDMARKS) else {
            return PhaseDetection::unknown(frame_idx);
        };
        let (width, height) = frame_size;
        let Some(kp) = Keypoints::extract(pose, width, height, MIN_KEYPOINTS) else {
            return PhaseDetection::unknown(frame_idx);
        };

        let metrics = self.measure(&kp, bat_angle, bat_position, ball, frame_idx);
        self.metrics_history.push_back(metrics.clone());
        if self.metrics_history.len() > METRICS_HISTORY {
            self.metrics_history.pop_front();
        }

        let (phase, confidence) = self.classify(&metrics);
        trace!(frame = frame_idx, phase = %phase, confidence, "Classified frame");

        self.phase_history.push_back(phase);
        if self.phase_history.len() > PHASE_HISTORY {
            self.phase_history.pop_front();
        }

        PhaseDetection {
            phase,
            confidence,
            frame: frame_idx,
            metrics: Some(metrics),
        }
    }

    /// Classify every frame and summarise the swing.
    ///
    /// `contact_frame`, when given and past frame 0, overrides the contact key frame.
    pub fn detect_phases_sequence(
        &mut self,
        landmarks: &[Option<PoseLandmarks>],
        bat_angles: &[Option<f64>],
        bat_positions: &[Option<Point>],
        balls: &[Option<BallObservation>],
        frame_size: (u32, u32),
        contact_frame: Option<usize>,
    ) -> PhaseSequence {
        let mut phases: Vec<PhaseDetection> = Vec::with_capacity(landmarks.len());
        let mut transitions = Vec::new();

        for (i, pose) in landmarks.iter().enumerate() {
            let result = self.detect_phase(
                pose.as_ref(),
                bat_angles.get(i).copied().flatten(),
                bat_positions.get(i).copied().flatten(),
                balls.get(i).and_then(|b| b.as_ref()),
                frame_size,
                i,
            );

            if let Some(prev) = phases.last() {
                if prev.phase != result.phase {
                    transitions.push(PhaseTransition {
                        from: prev.phase,
                        to: result.phase,
                        frame: i,
                    });
                }
            }
            phases.push(result);
        }

        let first = |target: SwingPhase| phases.iter().find(|p| p.phase == target).map(|p| p.frame);
        let key_frames = KeyFrames {
            stance: first(SwingPhase::Stance),
            load: first(SwingPhase::Load),
            stride: first(SwingPhase::Stride),
            contact: contact_frame
                .filter(|&f| f > 0)
                .or_else(|| first(SwingPhase::Contact)),
            follow_through: first(SwingPhase::FollowThrough),
        };

        let mut phase_duration: BTreeMap<String, usize> =
            SwingPhase::ALL.iter().map(|p| (p.as_str().to_string(), 0)).collect();
        for p in &phases {
            *phase_duration.entry(p.phase.as_str().to_string()).or_default() += 1;
        }

        let swing_quality = assess_quality(&phases, &transitions);

        PhaseSequence {
            phases,
            phase_transitions: transitions,
            key_frames,
            phase_duration,
            swing_quality,
        }
    }

    /// Forget all history.
    pub fn reset(&mut self) {
        self.phase_history.clear();
        self.metrics_history.clear();
    }

    fn measure(
        &self,
        kp: &Keypoints,
        bat_angle: Option<f64>,
        bat_position: Option<Point>,
        ball: Option<&BallObservation>,
        frame: usize,
    ) -> PhaseMetrics {
        let mut m = PhaseMetrics {
            frame,
            ..Default::default()
        };

        if let Some((lw, rw)) = kp.wrists() {
            m.avg_wrist_y = Some((lw.y + rw.y) / 2.0);
            m.wrist_separation = Some((lw.x - rw.x).abs());
            m.wrist_forward = Some(rw.x);
        }
        if let Some((le, re)) = kp.elbows() {
            let avg_elbow_y = (le.y + re.y) / 2.0;
            m.avg_elbow_y = Some(avg_elbow_y);
            m.wrists_above_elbows = m.avg_wrist_y.map(|w| w < avg_elbow_y);
        }
        if let Some((lh, rh)) = kp.hips() {
            m.hip_separation = Some((lh.x - rh.x).abs());
            m.hip_center_x = Some((lh.x + rh.x) / 2.0);
        }
        if let Some((lk, rk)) = kp.knees() {
            m.knee_separation = Some((lk.x - rk.x).abs());
        }
        if let Some((la, ra)) = kp.ankles() {
            let sep = (la.x - ra.x).abs();
            m.ankle_separation = Some(sep);
            m.stride_length_pixels = Some(sep);
        }

        m.bat_angle = bat_angle;
        if let Some(p) = bat_position {
            m.bat_x = Some(p.x);
            m.bat_y = Some(p.y);
        }
        if let Some(center) = ball.and_then(|b| b.detection.center) {
            m.ball_x = Some(center.x);
            m.ball_y = Some(center.y);
            m.ball_detected = true;
        }

        if let Some(prev) = self.metrics_history.back() {
            m.wrist_y_velocity = m.avg_wrist_y.zip(prev.avg_wrist_y).map(|(c, p)| c - p);
            m.bat_x_velocity = m.bat_x.zip(prev.bat_x).map(|(c, p)| c - p);
        }

        m
    }

    fn classify(&self, m: &PhaseMetrics) -> (SwingPhase, f64) {
        if m.ball_detected {
            if let (Some(ball_x), Some(bat_x)) = (m.ball_x, m.bat_x) {
                if (ball_x - bat_x).abs() < CONTACT_DISTANCE_PX {
                    return (SwingPhase::Contact, 0.9);
                }
            }
        }

        if m.wrist_forward.unwrap_or(0.0) > 0.0 && m.bat_angle.is_some() {
            let start = self.phase_history.len().saturating_sub(3);
            let recent_contact = self
                .phase_history
                .iter()
                .skip(start)
                .any(|p| *p == SwingPhase::Contact);
            if recent_contact {
                return (SwingPhase::FollowThrough, 0.8);
            }
        }

        if m.ankle_separation.unwrap_or(0.0) > STRIDE_ANKLE_PX
            || m.knee_separation.unwrap_or(0.0) > STRIDE_KNEE_PX
        {
            return (SwingPhase::Stride, 0.7);
        }

        if m.wrists_above_elbows == Some(true) {
            if let (Some(wrist), Some(elbow)) = (m.avg_wrist_y, m.avg_elbow_y) {
                if wrist < elbow - LOAD_WRIST_LIFT_PX {
                    return (SwingPhase::Load, 0.75);
                }
            }
        }

        if self.phase_history.iter().all(|p| *p == SwingPhase::Stance) {
            return (SwingPhase::Stance, 0.6);
        }

        match self.phase_history.back() {
            Some(prev) => (*prev, 0.5),
            None => (SwingPhase::Stance, 0.6),
        }
    }
}

fn assess_quality(phases: &[PhaseDetection], transitions: &[PhaseTransition]) -> SwingQuality {
    let mut quality = SwingQuality::default();

    let present = |target: SwingPhase| phases.iter().any(|p| p.phase == target);
    quality.has_all_phases = [
        SwingPhase::Stance,
        SwingPhase::Load,
        SwingPhase::Contact,
        SwingPhase::FollowThrough,
    ]
    .into_iter()
    .all(present);

    let order: Vec<SwingPhase> = phases
        .iter()
        .map(|p| p.phase)
        .filter(SwingPhase::is_known)
        .collect();
    if order.len() >= 3 {
        let before = |a: SwingPhase, b: SwingPhase| {
            order
                .iter()
                .enumerate()
                .any(|(i, p)| *p == a && order[i + 1..].contains(&b))
        };
        quality.phase_order_correct = before(SwingPhase::Stance, SwingPhase::Load)
            && before(SwingPhase::Load, SwingPhase::Contact)
            && before(SwingPhase::Contact, SwingPhase::FollowThrough);
    }

    if transitions.is_empty() {
        quality
            .issues
            .push("No phase transitions detected".to_string());
    } else {
        let n = transitions.len() as f64;
        quality.transition_smoothness = (1.0 - (n - 3.0) / 10.0).clamp(0.0, 1.0);
    }

    quality
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoints::test_support::pose_with;
    use swinglab_models::pose::index;
    use swinglab_models::{BoundingBox, Detection, ObjectClass};

    const SIZE: (u32, u32) = (1000, 1000);

    /// Neutral stance: hands at elbow height, feet and knees together.
    fn stance() -> PoseLandmarks {
        pose_with(&[
            (index::LEFT_WRIST, 0.48, 0.40),
            (index::RIGHT_WRIST, 0.52, 0.40),
            (index::LEFT_ELBOW, 0.47, 0.40),
            (index::RIGHT_ELBOW, 0.53, 0.40),
            (index::LEFT_KNEE, 0.48, 0.70),
            (index::RIGHT_KNEE, 0.52, 0.70),
            (index::LEFT_ANKLE, 0.48, 0.90),
            (index::RIGHT_ANKLE, 0.52, 0.90),
        ])
    }

    /// Hands lifted 50 px above the elbows.
    fn load() -> PoseLandmarks {
        let mut p = stance();
        p.0[index::LEFT_WRIST].y = 0.35;
        p.0[index::RIGHT_WRIST].y = 0.35;
        p
    }

    /// Feet 200 px apart.
    fn stride() -> PoseLandmarks {
        let mut p = stance();
        p.0[index::LEFT_ANKLE].x = 0.40;
        p.0[index::RIGHT_ANKLE].x = 0.60;
        p
    }

    fn ball_at(x: f64, y: f64) -> BallObservation {
        let mut d = Detection::new(BoundingBox::from_center(x, y, 10.0, 10.0), 0.6, ObjectClass::Ball);
        d.center = Some(Point::new(x, y));
        BallObservation {
            detection: d,
            velocity: 0.0,
            tracked: false,
        }
    }

    #[test]
    fn test_unknown_without_pose() {
        let mut detector = SwingPhaseDetector::new();
        let short = PoseLandmarks::new(vec![Default::default(); 19]);
        let r = detector.detect_phase(Some(&short), None, None, None, SIZE, 3);
        assert_eq!(r.phase, SwingPhase::Unknown);
        assert_eq!(r.confidence, 0.0);
        assert!(detector.phase_history.is_empty());

        let r = detector.detect_phase(None, None, None, None, SIZE, 4);
        assert_eq!(r.phase, SwingPhase::Unknown);
    }

    #[test]
    fn test_stance_load_stride() {
        let mut d = SwingPhaseDetector::new();
        assert_eq!(d.detect_phase(Some(&stance()), None, None, None, SIZE, 0).phase, SwingPhase::Stance);

        let r = d.detect_phase(Some(&load()), None, None, None, SIZE, 1);
        assert_eq!(r.phase, SwingPhase::Load);
        assert_eq!(r.confidence, 0.75);
        let m = r.metrics.unwrap();
        assert!((m.wrist_y_velocity.unwrap() - -50.0).abs() < 1e-9);

        let r = d.detect_phase(Some(&stride()), None, None, None, SIZE, 2);
        assert_eq!(r.phase, SwingPhase::Stride);

        // No rule fires; history is not all stance, so the last phase holds.
        let r = d.detect_phase(Some(&stance()), None, None, None, SIZE, 3);
        assert_eq!(r.phase, SwingPhase::Stride);
        assert_eq!(r.confidence, 0.5);
    }

    #[test]
    fn test_contact_then_follow_through() {
        let mut d = SwingPhaseDetector::new();
        let ball = ball_at(520.0, 400.0);
        let r = d.detect_phase(
            Some(&stance()),
            Some(30.0),
            Some(Point::new(500.0, 400.0)),
            Some(&ball),
            SIZE,
            0,
        );
        assert_eq!(r.phase, SwingPhase::Contact);
        assert_eq!(r.confidence, 0.9);

        let r = d.detect_phase(Some(&stance()), Some(60.0), Some(Point::new(700.0, 300.0)), None, SIZE, 1);
        assert_eq!(r.phase, SwingPhase::FollowThrough);
    }

    #[test]
    fn test_sequence_summary() {
        let mut d = SwingPhaseDetector::new();
        let ball = ball_at(520.0, 400.0);
        let poses = vec![
            Some(stance()),
            Some(stance()),
            Some(load()),
            None,
            Some(stance()),
            Some(stance()),
        ];
        let angles = vec![None, None, None, None, Some(10.0), Some(40.0)];
        let bats = vec![None, None, None, None, Some(Point::new(500.0, 400.0)), None];
        let balls = vec![None, None, None, None, Some(ball), None];

        let seq = d.detect_phases_sequence(&poses, &angles, &bats, &balls, SIZE, None);

        let names: Vec<SwingPhase> = seq.phases.iter().map(|p| p.phase).collect();
        assert_eq!(
            names,
            vec![
                SwingPhase::Stance,
                SwingPhase::Stance,
                SwingPhase::Load,
                SwingPhase::Unknown,
                SwingPhase::Contact,
                SwingPhase::FollowThrough,
            ]
        );
        assert_eq!(seq.phase_transitions.len(), 4);
        assert_eq!(seq.phase_transitions[0].frame, 2);
        assert_eq!(seq.key_frames.load, Some(2));
        assert_eq!(seq.key_frames.contact, Some(4));
        assert_eq!(seq.phase_duration["stance"], 2);
        assert_eq!(seq.phase_duration["stride"], 0);
        assert_eq!(seq.phase_duration.len(), 6);

        let q = &seq.swing_quality;
        assert!(q.has_all_phases);
        assert!(q.phase_order_correct);
        assert!((q.transition_smoothness - 0.9).abs() < 1e-9);
        assert!(q.issues.is_empty());
    }

    #[test]
    fn test_sequence_without_transitions() {
        let mut d = SwingPhaseDetector::new();
        let poses = vec![Some(stance()), Some(stance())];
        let seq = d.detect_phases_sequence(&poses, &[], &[], &[], SIZE, Some(7));
        assert_eq!(seq.key_frames.contact, Some(7));
        assert_eq!(seq.swing_quality.transition_smoothness, 0.0);
        assert_eq!(
            seq.swing_quality.issues,
            vec!["No phase transitions detected".to_string()]
        );
        assert!(!seq.swing_quality.phase_order_correct);
    }

    #[test]
    fn test_contact_frame_zero_uses_detected_contact() {
        let ball = ball_at(520.0, 400.0);
        let poses = vec![Some(stance()), Some(load()), Some(stance())];
        let angles = vec![None, None, Some(10.0)];
        let bats = vec![None, None, Some(Point::new(500.0, 400.0))];
        let balls = vec![None, None, Some(ball)];

        let seq = SwingPhaseDetector::new()
            .detect_phases_sequence(&poses, &angles, &bats, &balls, SIZE, Some(0));
        assert_eq!(seq.phases[2].phase, SwingPhase::Contact);
        assert_eq!(seq.key_frames.contact, Some(2));

        let none = SwingPhaseDetector::new().detect_phases_sequence(
            &[Some(stance()), Some(stance())],
            &[],
            &[],
            &[],
            SIZE,
            Some(0),
        );
        assert_eq!(none.key_frames.contact, None);
    }
}
