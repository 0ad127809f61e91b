//! Per-video summary metrics.

use serde::{Deserialize, Serialize};

/// Basic properties of a decoded video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub fps: f64,
    pub frame_count: usize,
    /// Duration in seconds
    pub duration: f64,
    pub width: u32,
    pub height: u32,
}

impl VideoInfo {
    /// Frame rate used when the container reports none.
    pub const DEFAULT_FPS: f64 = 30.0;

    pub fn new(fps: f64, frame_count: usize, width: u32, height: u32) -> Self {
        let fps = if fps > 0.0 { fps } else { Self::DEFAULT_FPS };
        Self {
            fps,
            frame_count,
            duration: frame_count as f64 / fps,
            width,
            height,
        }
    }
}

/// How consistently each object was tracked over recent frames.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackingQuality {
    pub score: f64,
    pub person_tracking_ratio: f64,
    pub bat_tracking_ratio: f64,
    pub ball_tracking_ratio: f64,
    pub issues: Vec<String>,
}

/// Swing metrics derived once per analyzed video.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedMetrics {
    /// Degrees per second at contact
    pub bat_angular_velocity: f64,
    /// Meters per second at the barrel
    pub bat_linear_speed: f64,
    pub bat_linear_speed_mph: f64,
    /// Meters per second
    pub exit_velocity_estimate: f64,
    pub exit_velocity_estimate_mph: f64,
    pub exit_velocity_error_margin: f64,
    /// Bat angle at contact in degrees
    pub launch_angle: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_quality: Option<TrackingQuality>,
}
