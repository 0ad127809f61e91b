//! Swing phase classification labels.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Phase of a baseball swing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SwingPhase {
    Stance,
    Load,
    Stride,
    Contact,
    FollowThrough,
    #[default]
    Unknown,
}

impl SwingPhase {
    /// All phases in swing order, `Unknown` last.
    pub const ALL: [SwingPhase; 6] = [
        SwingPhase::Stance,
        SwingPhase::Load,
        SwingPhase::Stride,
        SwingPhase::Contact,
        SwingPhase::FollowThrough,
        SwingPhase::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SwingPhase::Stance => "stance",
            SwingPhase::Load => "load",
            SwingPhase::Stride => "stride",
            SwingPhase::Contact => "contact",
            SwingPhase::FollowThrough => "follow_through",
            SwingPhase::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, SwingPhase::Unknown)
    }
}

impl std::fmt::Display for SwingPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&SwingPhase::FollowThrough).unwrap();
        assert_eq!(json, "\"follow_through\"");
        assert_eq!(SwingPhase::FollowThrough.to_string(), "follow_through");
    }
}
