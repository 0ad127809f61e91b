//! Summaries of sensor swing metrics and their pairing with video pose metrics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use swinglab_models::SwingEvent;

use crate::recommend::SwingMetricsInput;

/// Per-key statistics over a session's swings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// Metrics the bat sensor reports for a swing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bat_speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attack_angle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_contact: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hand_speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_plane: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical_bat_angle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<f64>,
}

impl SensorMetrics {
    /// Present metrics keyed by their wire name.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let pairs = [
            ("batSpeed", self.bat_speed),
            ("attackAngle", self.attack_angle),
            ("timeToContact", self.time_to_contact),
            ("power", self.power),
            ("handSpeed", self.hand_speed),
            ("onPlane", self.on_plane),
            ("verticalBatAngle", self.vertical_bat_angle),
            ("connection", self.connection),
        ];
        pairs
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k.to_string(), v)))
            .collect()
    }
}

impl From<&SwingEvent> for SensorMetrics {
    fn from(event: &SwingEvent) -> Self {
        Self {
            bat_speed: Some(event.bat_speed_mph),
            attack_angle: Some(event.attack_angle_deg),
            time_to_contact: Some(event.duration_ms as f64 / 1000.0),
            ..Default::default()
        }
    }
}

/// Pick the known numeric metrics out of a raw sensor payload.
///
/// Unknown keys and non-numeric values are ignored.
pub fn extract_sensor_metrics(raw: &Value) -> SensorMetrics {
    let num = |key: &str| raw.get(key).and_then(Value::as_f64);
    SensorMetrics {
        bat_speed: num("batSpeed"),
        attack_angle: num("attackAngle"),
        time_to_contact: num("timeToContact"),
        power: num("power"),
        hand_speed: num("handSpeed"),
        on_plane: num("onPlane"),
        vertical_bat_angle: num("verticalBatAngle"),
        connection: num("connection"),
    }
}

/// avg/min/max/count for every key seen with at least one value.
pub fn aggregate_metrics<'a, I>(records: I) -> BTreeMap<String, MetricSummary>
where
    I: IntoIterator<Item = &'a SensorMetrics>,
{
    let mut values: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for record in records {
        for (key, value) in record.to_map() {
            values.entry(key).or_default().push(value);
        }
    }

    values
        .into_iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(key, v)| {
            let count = v.len();
            let summary = MetricSummary {
                avg: v.iter().sum::<f64>() / count as f64,
                min: v.iter().copied().fold(f64::INFINITY, f64::min),
                max: v.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                count,
            };
            (key, summary)
        })
        .collect()
}

/// Side-by-side pose and sensor view of one swing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_angle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attack_angle: Option<f64>,
    /// |launch angle - attack angle|
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle_difference: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hand_angle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical_bat_angle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bat_speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hand_speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shoulder_angle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hip_angle: Option<f64>,
}

/// Pair pose metrics with sensor metrics.
///
/// Angles that are compared only appear when both sides have them.
pub fn combine_metrics(pose: &SwingMetricsInput, sensor: &SensorMetrics) -> CombinedMetrics {
    let mut combined = CombinedMetrics {
        bat_speed: sensor.bat_speed,
        hand_speed: sensor.hand_speed,
        power: sensor.power,
        shoulder_angle: pose.shoulder_angle,
        hip_angle: pose.hip_angle,
        ..Default::default()
    };

    if let (Some(launch), Some(attack)) = (pose.launch_angle, sensor.attack_angle) {
        combined.launch_angle = Some(launch);
        combined.attack_angle = Some(attack);
        combined.angle_difference = Some((launch - attack).abs());
    }

    if let (Some(hand), Some(vertical)) = (pose.hand_angle, sensor.vertical_bat_angle) {
        combined.hand_angle = Some(hand);
        combined.vertical_bat_angle = Some(vertical);
    }

    combined
}
