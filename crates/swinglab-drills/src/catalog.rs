//! Bundled starter catalog.

use swinglab_models::DrillInput;

use crate::error::DrillResult;

const CATALOG_JSON: &str = include_str!("../data/drills.json");

/// Parse the bundled drill catalog.
pub fn seed_drills() -> DrillResult<Vec<DrillInput>> {
    Ok(serde_json::from_str(CATALOG_JSON)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use swinglab_models::Difficulty;

    #[test]
    fn test_catalog_parses_and_validates() {
        let drills = seed_drills().unwrap();
        assert_eq!(drills.len(), 10);
        for drill in &drills {
            assert!(drill.validate().is_ok(), "{} is invalid", drill.name);
        }
    }

    #[test]
    fn test_catalog_covers_every_correction() {
        let drills = seed_drills().unwrap();
        for correction in [
            "low_launch_angle",
            "high_launch_angle",
            "poor_hip_rotation",
            "poor_shoulder_rotation",
            "steep_bat_path",
            "flat_bat_path",
            "poor_pose_detection",
        ] {
            assert!(
                drills.iter().any(|d| d.corrections.iter().any(|c| c == correction)),
                "no drill for {correction}"
            );
        }
        assert_eq!(drills[0].difficulty, Some(Difficulty::Beginner));
    }
}
