//! Swing events reported by the motion sensor.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One swing detected from gyroscope samples.
///
/// Times are seconds on the sensor clock used for feeding samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SwingEvent {
    pub t_start: f64,
    pub t_peak: f64,
    pub t_end: f64,
    pub duration_ms: u64,
    /// Peak angular speed in degrees per second
    pub omega_peak_dps: f64,
    pub bat_speed_mph: f64,
    pub attack_angle_deg: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "sessionId")]
    pub session_id: String,
}
