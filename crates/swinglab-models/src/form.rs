//! Rule-based swing form errors.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Kind of form error detected in a swing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FormErrorType {
    EarlyHipRotation,
    LateHipRotation,
    Overstride,
    Understride,
    CollapsingFrontLeg,
    UprightFrontLeg,
    /// Lead elbow flying out
    ChickenWing,
    /// Early extension of the arms
    Casting,
    DroppingHands,
    LiftingHands,
    SpineTiltExcessive,
    WeightOnBackFoot,
    /// No hip-shoulder separation
    NoSeparation,
    OverRotation,
    UnderRotation,
}

impl FormErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormErrorType::EarlyHipRotation => "early_hip_rotation",
            FormErrorType::LateHipRotation => "late_hip_rotation",
            FormErrorType::Overstride => "overstride",
            FormErrorType::Understride => "understride",
            FormErrorType::CollapsingFrontLeg => "collapsing_front_leg",
            FormErrorType::UprightFrontLeg => "upright_front_leg",
            FormErrorType::ChickenWing => "chicken_wing",
            FormErrorType::Casting => "casting",
            FormErrorType::DroppingHands => "dropping_hands",
            FormErrorType::LiftingHands => "lifting_hands",
            FormErrorType::SpineTiltExcessive => "spine_tilt_excessive",
            FormErrorType::WeightOnBackFoot => "weight_on_back_foot",
            FormErrorType::NoSeparation => "no_separation",
            FormErrorType::OverRotation => "over_rotation",
            FormErrorType::UnderRotation => "under_rotation",
        }
    }

    /// Coaching advice for this error.
    pub fn recommendation(&self) -> &'static str {
        match self {
            FormErrorType::EarlyHipRotation => {
                "Focus on keeping hips closed longer. Practice drills that emphasize hip separation."
            }
            FormErrorType::LateHipRotation => {
                "Start hip rotation earlier in the swing. Work on timing and sequence."
            }
            FormErrorType::Overstride => "Reduce stride length. Focus on shorter, controlled stride.",
            FormErrorType::Understride => {
                "Increase stride length slightly for better weight transfer."
            }
            FormErrorType::CollapsingFrontLeg => {
                "Maintain front leg strength. Practice balance drills."
            }
            FormErrorType::UprightFrontLeg => {
                "Increase front knee flexion for better weight transfer."
            }
            FormErrorType::ChickenWing => {
                "Keep lead elbow close to body. Practice one-handed drills."
            }
            FormErrorType::Casting => {
                "Maintain arm angle longer. Focus on keeping hands inside the ball."
            }
            FormErrorType::DroppingHands => {
                "Keep hands at consistent height. Practice tee work focusing on hand path."
            }
            FormErrorType::LiftingHands => {
                "Maintain level swing path. Avoid lifting hands during swing."
            }
            FormErrorType::SpineTiltExcessive => "Maintain upright posture. Focus on core strength.",
            FormErrorType::WeightOnBackFoot => {
                "Transfer weight to front foot. Practice weight transfer drills."
            }
            FormErrorType::NoSeparation => {
                "Create more hip-shoulder separation. This is critical for power."
            }
            FormErrorType::OverRotation => "Control rotation. Focus on staying balanced.",
            FormErrorType::UnderRotation => {
                "Increase rotation for more power. Work on hip and shoulder turn."
            }
        }
    }
}

impl std::fmt::Display for FormErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error severity, serialized as 1..=3.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum Severity {
    Minor = 1,
    Moderate = 2,
    Major = 3,
}

impl Severity {
    pub fn value(&self) -> u8 {
        *self as u8
    }
}

impl From<Severity> for u8 {
    fn from(s: Severity) -> Self {
        s as u8
    }
}

impl TryFrom<u8> for Severity {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Severity::Minor),
            2 => Ok(Severity::Moderate),
            3 => Ok(Severity::Major),
            other => Err(format!("severity must be 1..=3, got {other}")),
        }
    }
}

/// One detected form error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormError {
    #[serde(rename = "error")]
    pub error_type: FormErrorType,
    pub severity: Severity,
    pub frame: usize,
    pub description: String,
    pub impact: String,
}

impl FormError {
    pub fn new(
        error_type: FormErrorType,
        severity: Severity,
        frame: usize,
        description: impl Into<String>,
        impact: impl Into<String>,
    ) -> Self {
        Self {
            error_type,
            severity,
            frame,
            description: description.into(),
            impact: impact.into(),
        }
    }
}
