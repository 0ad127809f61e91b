//! Training drills and their create/update payloads.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Drill difficulty level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

fn default_duration() -> u32 {
    10
}

fn default_reps() -> u32 {
    10
}

/// A training drill addressing one or more swing corrections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Drill {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub equipment: Vec<String>,
    /// Correction keys this drill addresses, e.g. `low_launch_angle`
    pub corrections: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub video_url: String,
    #[serde(default)]
    pub image_url: String,
    /// Minutes
    #[serde(default = "default_duration")]
    pub duration: u32,
    #[serde(default = "default_reps")]
    pub reps: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set on recommendation results only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
}

impl Drill {
    pub fn addresses(&self, correction: &str) -> bool {
        self.corrections.iter().any(|c| c == correction)
    }
}

/// Payload for creating a drill.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DrillInput {
    pub name: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub equipment: Vec<String>,
    pub corrections: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub reps: Option<u32>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl DrillInput {
    /// Check required fields.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Missing required field: name".to_string());
        }
        if self.description.trim().is_empty() {
            return Err("Missing required field: description".to_string());
        }
        if self.category.trim().is_empty() {
            return Err("Missing required field: category".to_string());
        }
        if self.corrections.is_empty() {
            return Err("Missing required field: corrections".to_string());
        }
        Ok(())
    }
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DrillUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub equipment: Option<Vec<String>>,
    pub corrections: Option<Vec<String>>,
    pub instructions: Option<Vec<String>>,
    pub video_url: Option<String>,
    pub image_url: Option<String>,
    pub duration: Option<u32>,
    pub reps: Option<u32>,
    pub tags: Option<Vec<String>>,
}

impl DrillUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.difficulty.is_none()
            && self.equipment.is_none()
            && self.corrections.is_none()
            && self.instructions.is_none()
            && self.video_url.is_none()
            && self.image_url.is_none()
            && self.duration.is_none()
            && self.reps.is_none()
            && self.tags.is_none()
    }

    /// Apply the set fields to `drill`.
    pub fn apply(self, drill: &mut Drill) {
        if let Some(v) = self.name {
            drill.name = v;
        }
        if let Some(v) = self.description {
            drill.description = v;
        }
        if let Some(v) = self.category {
            drill.category = v;
        }
        if let Some(v) = self.difficulty {
            drill.difficulty = v;
        }
        if let Some(v) = self.equipment {
            drill.equipment = v;
        }
        if let Some(v) = self.corrections {
            drill.corrections = v;
        }
        if let Some(v) = self.instructions {
            drill.instructions = v;
        }
        if let Some(v) = self.video_url {
            drill.video_url = v;
        }
        if let Some(v) = self.image_url {
            drill.image_url = v;
        }
        if let Some(v) = self.duration {
            drill.duration = v;
        }
        if let Some(v) = self.reps {
            drill.reps = v;
        }
        if let Some(v) = self.tags {
            drill.tags = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drill_input_validation() {
        let mut input = DrillInput {
            name: "Tee Work".to_string(),
            description: "Hit off a tee".to_string(),
            category: "hitting".to_string(),
            corrections: vec!["low_launch_angle".to_string()],
            ..Default::default()
        };
        assert!(input.validate().is_ok());

        input.corrections.clear();
        assert_eq!(
            input.validate().unwrap_err(),
            "Missing required field: corrections"
        );
    }

    #[test]
    fn test_difficulty_parse() {
        assert_eq!("Beginner".parse::<Difficulty>().unwrap(), Difficulty::Beginner);
        assert!("expert".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_drill_deserialize_defaults() {
        let json = r#"{
            "_id": "d1",
            "name": "Dry Swings",
            "description": "Swing without a ball",
            "category": "mechanics",
            "corrections": ["poor_hip_rotation"],
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        }"#;
        let drill: Drill = serde_json::from_str(json).unwrap();
        assert_eq!(drill.difficulty, Difficulty::Intermediate);
        assert_eq!(drill.duration, 10);
        assert_eq!(drill.reps, 10);
        assert!(drill.addresses("poor_hip_rotation"));
    }
}
