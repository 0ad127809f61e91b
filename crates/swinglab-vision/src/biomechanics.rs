//! Joint-angle and rotation scoring against ideal ranges.

use std::collections::BTreeMap;

use serde::Serialize;
use swinglab_models::PoseLandmarks;
use tracing::debug;

use crate::error::{VisionError, VisionResult};
use crate::keypoints::{angle_at, midpoint, segment_angle, spine_angle, Keypoints};
use crate::signal::savgol_filter;

const MIN_KEYPOINTS: usize = 10;

/// Ideal ranges for each scored metric, in degrees or (weight) fraction.
pub const IDEAL_RANGES: [(&str, (f64, f64)); 8] = [
    ("hip_rotation_angle", (40.0, 60.0)),
    ("shoulder_rotation_angle", (30.0, 50.0)),
    ("torso_rotation", (45.0, 65.0)),
    ("knee_flexion_front", (120.0, 150.0)),
    ("elbow_angle_lead", (90.0, 120.0)),
    ("wrist_angle", (160.0, 180.0)),
    ("spine_angle", (85.0, 95.0)),
    ("weight_distribution_front", (0.4, 0.6)),
];

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct JointAngles {
    pub elbow_angle_left: Option<f64>,
    pub elbow_angle_right: Option<f64>,
    pub knee_angle_left: Option<f64>,
    pub knee_angle_right: Option<f64>,
    /// Left elbow, left wrist, right wrist
    pub wrist_angle: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RotationAngles {
    /// Direction of the left-to-right hip line
    pub hip_rotation: Option<f64>,
    pub shoulder_rotation: Option<f64>,
    /// Absolute shoulder minus hip rotation
    pub torso_rotation: Option<f64>,
    /// 90 is upright
    pub spine_angle: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightDistribution {
    pub front_leg_weight: f64,
    pub back_leg_weight: f64,
    pub front_leg: Side,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MovementPatterns {
    pub max_wrist_velocity_x: Option<f64>,
    pub max_wrist_velocity_y: Option<f64>,
    pub wrist_path_length: Option<f64>,
    /// Horizontal travel of the hip center
    pub hip_rotation_range: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PowerMetrics {
    /// Horizontal hip-shoulder center separation in pixels
    pub x_factor: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricScore {
    pub value: f64,
    pub ideal_range: (f64, f64),
    pub score: f64,
    pub in_range: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Grade::A
        } else if score >= 0.8 {
            Grade::B
        } else if score >= 0.7 {
            Grade::C
        } else if score >= 0.6 {
            Grade::D
        } else {
            Grade::F
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Efficiency {
    pub overall_efficiency: f64,
    pub grade: Grade,
    pub metric_scores: BTreeMap<String, MetricScore>,
}

/// Full biomechanics report for one swing.
#[derive(Debug, Clone, Serialize)]
pub struct BiomechanicsReport {
    /// Frame the static measurements were taken on
    pub frame: usize,
    pub joint_angles: JointAngles,
    pub rotation_angles: RotationAngles,
    pub weight_distribution: Option<WeightDistribution>,
    pub movement_patterns: MovementPatterns,
    pub power_metrics: PowerMetrics,
    pub efficiency: Efficiency,
    pub recommendations: Vec<String>,
}

/// Scores swing mechanics from pose landmarks.
#[derive(Debug, Default, Clone)]
pub struct BiomechanicsAnalyzer;

impl BiomechanicsAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Analyze a swing.
    ///
    /// Static measurements come from the contact frame when it is known and
    /// in range, otherwise the middle frame, otherwise the first frame with a
    /// usable pose. Fails when no frame has one.
    pub fn analyze(
        &self,
        landmarks: &[Option<PoseLandmarks>],
        frame_size: (u32, u32),
        contact_frame: Option<usize>,
    ) -> VisionResult<BiomechanicsReport> {
        let (width, height) = frame_size;
        let sequence: Vec<Option<Keypoints>> = landmarks
            .iter()
            .map(|l| {
                l.as_ref()
                    .and_then(|p| Keypoints::extract(p, width, height, MIN_KEYPOINTS))
            })
            .collect();

        let frame = select_frame(&sequence, contact_frame).ok_or_else(|| {
            VisionError::insufficient_data("no frame has enough pose landmarks")
        })?;
        let Some(kp) = sequence[frame] else {
            return Err(VisionError::internal("selected frame has no keypoints"));
        };

        let joint_angles = joint_angles(&kp);
        let rotation_angles = rotation_angles(&kp);
        let weight_distribution = weight_distribution(&kp);
        let movement_patterns = movement_patterns(&sequence);
        let power_metrics = PowerMetrics {
            x_factor: x_factor(&kp),
        };
        let efficiency = efficiency(&joint_angles, &rotation_angles, weight_distribution.as_ref());
        let recommendations = recommendations(&efficiency);

        debug!(
            frame,
            overall = efficiency.overall_efficiency,
            grade = ?efficiency.grade,
            "Biomechanics analyzed"
        );

        Ok(BiomechanicsReport {
            frame,
            joint_angles,
            rotation_angles,
            weight_distribution,
            movement_patterns,
            power_metrics,
            efficiency,
            recommendations,
        })
    }
}

fn select_frame(sequence: &[Option<Keypoints>], contact: Option<usize>) -> Option<usize> {
    let len = sequence.len();
    let preferred = match contact {
        Some(c) if c > 0 && c < len => c,
        _ => len / 2,
    };
    if sequence.get(preferred).is_some_and(Option::is_some) {
        return Some(preferred);
    }
    sequence.iter().position(Option::is_some)
}

fn joint_angles(kp: &Keypoints) -> JointAngles {
    let angle = |a, b, c| match (a, b, c) {
        (Some(a), Some(b), Some(c)) => Some(angle_at(a, b, c)),
        _ => None,
    };
    JointAngles {
        elbow_angle_left: angle(kp.left_shoulder, kp.left_elbow, kp.left_wrist),
        elbow_angle_right: angle(kp.right_shoulder, kp.right_elbow, kp.right_wrist),
        knee_angle_left: angle(kp.left_hip, kp.left_knee, kp.left_ankle),
        knee_angle_right: angle(kp.right_hip, kp.right_knee, kp.right_ankle),
        wrist_angle: angle(kp.left_elbow, kp.left_wrist, kp.right_wrist),
    }
}

/// Hip and shoulder line directions, their difference, and spine lean.
pub fn rotation_angles(kp: &Keypoints) -> RotationAngles {
    let hip_rotation = kp.hips().map(|(l, r)| segment_angle(l, r));
    let shoulder_rotation = kp.shoulders().map(|(l, r)| segment_angle(l, r));
    let torso_rotation = shoulder_rotation
        .zip(hip_rotation)
        .map(|(s, h)| (s - h).abs());
    let spine = kp
        .nose
        .zip(kp.hips())
        .map(|(nose, (l, r))| spine_angle(nose, midpoint(l, r)));

    RotationAngles {
        hip_rotation,
        shoulder_rotation,
        torso_rotation,
        spine_angle: spine,
    }
}

/// Front/back weight split estimated from knee flex.
///
/// The front leg is the one whose ankle is further right in the image.
pub fn weight_distribution(kp: &Keypoints) -> Option<WeightDistribution> {
    let (la, ra) = kp.ankles()?;
    let (lk, rk) = kp.knees()?;

    let left_flex = (lk.y - la.y).abs();
    let right_flex = (rk.y - ra.y).abs();
    let left_forward = la.x > ra.x;
    let (front, back) = if left_forward {
        (left_flex, right_flex)
    } else {
        (right_flex, left_flex)
    };

    let total = front + back;
    let front_weight = if total > 0.0 { front / total } else { 0.5 };

    Some(WeightDistribution {
        front_leg_weight: front_weight,
        back_leg_weight: 1.0 - front_weight,
        front_leg: if left_forward { Side::Left } else { Side::Right },
    })
}

fn movement_patterns(sequence: &[Option<Keypoints>]) -> MovementPatterns {
    let mut patterns = MovementPatterns::default();
    if sequence.len() < 3 {
        return patterns;
    }

    let wrists: Vec<(f64, f64)> = sequence
        .iter()
        .flatten()
        .filter_map(|kp| kp.wrists())
        .map(|(l, r)| ((l.x + r.x) / 2.0, (l.y + r.y) / 2.0))
        .collect();

    if wrists.len() > 2 {
        let dx: Vec<f64> = wrists.windows(2).map(|w| w[1].0 - w[0].0).collect();
        let dy: Vec<f64> = wrists.windows(2).map(|w| w[1].1 - w[0].1).collect();
        let path: f64 = dx.iter().zip(&dy).map(|(x, y)| x.hypot(*y)).sum();

        let (vx, vy) = if dx.len() > 5 {
            let window = 5.min(dx.len() / 2 * 2 + 1);
            (savgol_filter(&dx, window, 2), savgol_filter(&dy, window, 2))
        } else {
            (dx, dy)
        };

        let max_abs = |v: &[f64]| v.iter().fold(0.0_f64, |m, x| m.max(x.abs()));
        patterns.max_wrist_velocity_x = Some(max_abs(&vx));
        patterns.max_wrist_velocity_y = Some(max_abs(&vy));
        patterns.wrist_path_length = Some(path);
    }

    let hips: Vec<f64> = sequence
        .iter()
        .flatten()
        .filter_map(|kp| kp.hips())
        .map(|(l, r)| (l.x + r.x) / 2.0)
        .collect();
    if hips.len() > 1 {
        let max = hips.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = hips.iter().copied().fold(f64::INFINITY, f64::min);
        patterns.hip_rotation_range = Some(max - min);
    }

    patterns
}

fn x_factor(kp: &Keypoints) -> Option<f64> {
    let (lh, rh) = kp.hips()?;
    let (ls, rs) = kp.shoulders()?;
    let hip_cx = (lh.x + rh.x) / 2.0;
    let shoulder_cx = (ls.x + rs.x) / 2.0;
    Some((shoulder_cx - hip_cx).abs())
}

/// 1 inside the range, falling linearly to 0 one range-width outside it.
pub fn score_metric(value: f64, range: (f64, f64)) -> MetricScore {
    let (min, max) = range;
    let in_range = value >= min && value <= max;
    let score = if in_range {
        1.0
    } else {
        let distance = if value < min { min - value } else { value - max };
        (1.0 - distance / (max - min)).max(0.0)
    };
    MetricScore {
        value,
        ideal_range: range,
        score,
        in_range,
    }
}

fn efficiency(
    joints: &JointAngles,
    rotations: &RotationAngles,
    weight: Option<&WeightDistribution>,
) -> Efficiency {
    // The lead side is the left side for a right-handed batter.
    let knee_front = joints.knee_angle_left.or(joints.knee_angle_right);
    let elbow_lead = joints.elbow_angle_left.or(joints.elbow_angle_right);

    let mut metric_scores = BTreeMap::new();
    for (name, range) in IDEAL_RANGES {
        let value = match name {
            "hip_rotation_angle" => rotations.hip_rotation,
            "shoulder_rotation_angle" => rotations.shoulder_rotation,
            "torso_rotation" => rotations.torso_rotation,
            "knee_flexion_front" => knee_front,
            "elbow_angle_lead" => elbow_lead,
            "wrist_angle" => joints.wrist_angle,
            "spine_angle" => rotations.spine_angle,
            "weight_distribution_front" => weight.map(|w| w.front_leg_weight),
            _ => None,
        };
        if let Some(v) = value {
            metric_scores.insert(name.to_string(), score_metric(v, range));
        }
    }

    let overall = if metric_scores.is_empty() {
        0.0
    } else {
        metric_scores.values().map(|m| m.score).sum::<f64>() / metric_scores.len() as f64
    };

    Efficiency {
        overall_efficiency: overall,
        grade: Grade::from_score(overall),
        metric_scores,
    }
}

fn recommendations(efficiency: &Efficiency) -> Vec<String> {
    let mut out = Vec::new();
    let scores = &efficiency.metric_scores;

    if efficiency.overall_efficiency < 0.7 {
        out.push(
            "Overall biomechanical efficiency is below optimal. Focus on fundamental mechanics."
                .to_string(),
        );
    }

    if let Some(hip) = scores.get("hip_rotation_angle").filter(|s| !s.in_range) {
        if hip.value < hip.ideal_range.0 {
            out.push("Increase hip rotation - focus on opening hips earlier in swing".to_string());
        } else {
            out.push("Reduce hip rotation - may be opening too early".to_string());
        }
    }

    if let Some(knee) = scores.get("knee_flexion_front").filter(|s| !s.in_range) {
        if knee.value > knee.ideal_range.1 {
            out.push("Increase front knee flexion for better weight transfer".to_string());
        }
    }

    if scores.get("spine_angle").is_some_and(|s| !s.in_range) {
        out.push("Maintain more upright spine angle - avoid excessive forward lean".to_string());
    }

    if out.is_empty() {
        out.push("Biomechanics look good! Continue practicing to maintain form.".to_string());
    }
    out
}
