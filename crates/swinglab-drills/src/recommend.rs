//! Correction inference and drill relevance scoring.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use swinglab_models::{Difficulty, Drill};

pub const LOW_LAUNCH_ANGLE: &str = "low_launch_angle";
pub const HIGH_LAUNCH_ANGLE: &str = "high_launch_angle";
pub const POOR_HIP_ROTATION: &str = "poor_hip_rotation";
pub const POOR_SHOULDER_ROTATION: &str = "poor_shoulder_rotation";
pub const STEEP_BAT_PATH: &str = "steep_bat_path";
pub const FLAT_BAT_PATH: &str = "flat_bat_path";
pub const POOR_POSE_DETECTION: &str = "poor_pose_detection";

const MIN_LAUNCH_ANGLE: f64 = 10.0;
const MAX_LAUNCH_ANGLE: f64 = 35.0;
const MIN_HIP_ROTATION: f64 = 15.0;
const MIN_SHOULDER_ROTATION: f64 = 20.0;
const MAX_HAND_ANGLE: f64 = 45.0;
const MIN_POSE_CONFIDENCE: f64 = 0.5;

/// Swing measurements used to infer corrections. All degrees.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwingMetricsInput {
    #[serde(default)]
    pub launch_angle: Option<f64>,
    #[serde(default)]
    pub hip_angle: Option<f64>,
    #[serde(default)]
    pub shoulder_angle: Option<f64>,
    /// Bat path proxy
    #[serde(default)]
    pub hand_angle: Option<f64>,
    /// Pose detection confidence, treated as 1.0 when absent
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Corrections implied by out-of-range metrics.
pub fn analyze_metrics(metrics: &SwingMetricsInput) -> Vec<String> {
    let mut corrections = Vec::new();

    if let Some(launch) = metrics.launch_angle {
        if launch < MIN_LAUNCH_ANGLE {
            corrections.push(LOW_LAUNCH_ANGLE);
        } else if launch > MAX_LAUNCH_ANGLE {
            corrections.push(HIGH_LAUNCH_ANGLE);
        }
    }

    if metrics.hip_angle.is_some_and(|h| h.abs() < MIN_HIP_ROTATION) {
        corrections.push(POOR_HIP_ROTATION);
    }
    if metrics
        .shoulder_angle
        .is_some_and(|s| s.abs() < MIN_SHOULDER_ROTATION)
    {
        corrections.push(POOR_SHOULDER_ROTATION);
    }

    if let Some(hand) = metrics.hand_angle {
        if hand < 0.0 {
            corrections.push(STEEP_BAT_PATH);
        } else if hand > MAX_HAND_ANGLE {
            corrections.push(FLAT_BAT_PATH);
        }
    }

    if metrics.confidence.unwrap_or(1.0) < MIN_POSE_CONFIDENCE {
        corrections.push(POOR_POSE_DETECTION);
    }

    corrections.into_iter().map(String::from).collect()
}

/// Relevance in [0, 1].
///
/// Only the caller's explicit corrections earn overlap credit; easier drills
/// and drills without equipment get small bonuses.
pub fn score_drill(drill: &Drill, corrections: &[String]) -> f64 {
    let mut score = 0.0;

    if !corrections.is_empty() {
        let given: HashSet<&str> = corrections.iter().map(String::as_str).collect();
        let matches = drill
            .corrections
            .iter()
            .map(String::as_str)
            .collect::<HashSet<_>>()
            .intersection(&given)
            .count();
        score += matches as f64 / given.len() as f64 * 0.7;
    }

    score += match drill.difficulty {
        Difficulty::Beginner => 0.1,
        Difficulty::Intermediate => 0.05,
        Difficulty::Advanced => 0.0,
    };

    if drill.equipment.is_empty() {
        score += 0.1;
    }

    score.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn drill(difficulty: Difficulty, equipment: &[&str], corrections: &[&str]) -> Drill {
        Drill {
            id: "d".to_string(),
            name: "n".to_string(),
            description: "d".to_string(),
            category: "hitting".to_string(),
            difficulty,
            equipment: equipment.iter().map(|s| s.to_string()).collect(),
            corrections: corrections.iter().map(|s| s.to_string()).collect(),
            instructions: vec![],
            video_url: String::new(),
            image_url: String::new(),
            duration: 10,
            reps: 10,
            tags: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
            relevance_score: None,
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_metrics_imply_nothing() {
        assert!(analyze_metrics(&SwingMetricsInput::default()).is_empty());
    }

    #[test]
    fn test_metric_thresholds() {
        let metrics = SwingMetricsInput {
            launch_angle: Some(5.0),
            hip_angle: Some(-10.0),
            shoulder_angle: Some(25.0),
            hand_angle: Some(50.0),
            confidence: Some(0.4),
        };
        assert_eq!(
            analyze_metrics(&metrics),
            strings(&[LOW_LAUNCH_ANGLE, POOR_HIP_ROTATION, FLAT_BAT_PATH, POOR_POSE_DETECTION])
        );

        let metrics = SwingMetricsInput {
            launch_angle: Some(40.0),
            shoulder_angle: Some(-19.0),
            hand_angle: Some(-1.0),
            ..Default::default()
        };
        assert_eq!(
            analyze_metrics(&metrics),
            strings(&[HIGH_LAUNCH_ANGLE, POOR_SHOULDER_ROTATION, STEEP_BAT_PATH])
        );

        let in_range = SwingMetricsInput {
            launch_angle: Some(20.0),
            hip_angle: Some(30.0),
            shoulder_angle: Some(30.0),
            hand_angle: Some(20.0),
            confidence: Some(0.9),
        };
        assert!(analyze_metrics(&in_range).is_empty());
    }

    #[test]
    fn test_metrics_deserialize_camel_case() {
        let m: SwingMetricsInput =
            serde_json::from_str(r#"{"launchAngle": 12.5, "handAngle": -3}"#).unwrap();
        assert_eq!(m.launch_angle, Some(12.5));
        assert_eq!(m.hand_angle, Some(-3.0));
        assert!(m.confidence.is_none());
    }

    #[test]
    fn test_score_components() {
        let given = strings(&[LOW_LAUNCH_ANGLE, POOR_HIP_ROTATION]);

        let half = drill(Difficulty::Advanced, &["bat"], &[LOW_LAUNCH_ANGLE]);
        assert!((score_drill(&half, &given) - 0.35).abs() < 1e-9);

        let easy = drill(Difficulty::Beginner, &[], &[LOW_LAUNCH_ANGLE, POOR_HIP_ROTATION]);
        assert!((score_drill(&easy, &given) - 0.9).abs() < 1e-9);

        let mid = drill(Difficulty::Intermediate, &["bat"], &[]);
        assert!((score_drill(&mid, &[]) - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_corrections_count_once() {
        let given = strings(&[LOW_LAUNCH_ANGLE, LOW_LAUNCH_ANGLE]);
        let d = drill(Difficulty::Advanced, &["bat"], &[LOW_LAUNCH_ANGLE]);
        assert!((score_drill(&d, &given) - 0.7).abs() < 1e-9);
    }
}
