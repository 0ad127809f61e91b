//! Bounded in-memory history for the sensor debug view.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use swinglab_models::SwingEvent;

use crate::link::DeviceInfo;

const MAX_SWINGS: usize = 50;
const MAX_API_CALLS: usize = 100;
const MAX_CONNECTION_EVENTS: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct SwingRecord {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub bat_speed_mph: f64,
    pub duration_ms: u64,
    pub omega_peak_dps: f64,
    pub attack_angle_deg: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiCallRecord {
    pub timestamp: DateTime<Utc>,
    pub endpoint: String,
    pub success: bool,
    pub status_code: Option<u16>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionEvent {
    pub timestamp: DateTime<Utc>,
    /// scanning, not_found, found, connected, disconnected, error
    pub event_type: String,
    pub details: Value,
}

/// Point-in-time copy of the debug state.
#[derive(Debug, Clone, Serialize)]
pub struct DebugSnapshot {
    pub swings: Vec<SwingRecord>,
    pub api_calls: Vec<ApiCallRecord>,
    pub connection_events: Vec<ConnectionEvent>,
    pub bat_connected: bool,
    pub bat_address: Option<String>,
    pub bat_name: Option<String>,
    pub last_update: DateTime<Utc>,
    pub active_sessions: usize,
}

struct Inner {
    swings: VecDeque<SwingRecord>,
    api_calls: VecDeque<ApiCallRecord>,
    connection_events: VecDeque<ConnectionEvent>,
    device: Option<DeviceInfo>,
    last_update: DateTime<Utc>,
}

fn push_bounded<T>(ring: &mut VecDeque<T>, item: T, cap: usize) {
    if ring.len() == cap {
        ring.pop_front();
    }
    ring.push_back(item);
}

/// Shared by every session and the swing sink.
pub struct DebugState {
    inner: Mutex<Inner>,
}

impl Default for DebugState {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                swings: VecDeque::with_capacity(MAX_SWINGS),
                api_calls: VecDeque::with_capacity(MAX_API_CALLS),
                connection_events: VecDeque::with_capacity(MAX_CONNECTION_EVENTS),
                device: None,
                last_update: Utc::now(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_swing(&self, event: &SwingEvent) {
        let mut inner = self.lock();
        let now = Utc::now();
        push_bounded(
            &mut inner.swings,
            SwingRecord {
                timestamp: now,
                session_id: event.session_id.clone(),
                bat_speed_mph: event.bat_speed_mph,
                duration_ms: event.duration_ms,
                omega_peak_dps: event.omega_peak_dps,
                attack_angle_deg: event.attack_angle_deg,
            },
            MAX_SWINGS,
        );
        inner.last_update = now;
    }

    pub fn record_api_call(
        &self,
        endpoint: &str,
        success: bool,
        status_code: Option<u16>,
        error: Option<String>,
    ) {
        let mut inner = self.lock();
        let now = Utc::now();
        push_bounded(
            &mut inner.api_calls,
            ApiCallRecord {
                timestamp: now,
                endpoint: endpoint.to_string(),
                success,
                status_code,
                error,
            },
            MAX_API_CALLS,
        );
        inner.last_update = now;
    }

    pub fn record_connection_event(&self, event_type: &str, details: Value) {
        let mut inner = self.lock();
        let now = Utc::now();
        push_bounded(
            &mut inner.connection_events,
            ConnectionEvent {
                timestamp: now,
                event_type: event_type.to_string(),
                details,
            },
            MAX_CONNECTION_EVENTS,
        );
        inner.last_update = now;
    }

    /// The connected device, or `None` when disconnected.
    pub fn set_device(&self, device: Option<&DeviceInfo>) {
        let mut inner = self.lock();
        inner.device = device.cloned();
        inner.last_update = Utc::now();
    }

    pub fn snapshot(&self, active_sessions: usize) -> DebugSnapshot {
        let inner = self.lock();
        DebugSnapshot {
            swings: inner.swings.iter().cloned().collect(),
            api_calls: inner.api_calls.iter().cloned().collect(),
            connection_events: inner.connection_events.iter().cloned().collect(),
            bat_connected: inner.device.is_some(),
            bat_address: inner.device.as_ref().map(|d| d.address.clone()),
            bat_name: inner.device.as_ref().map(|d| d.name.clone()),
            last_update: inner.last_update,
            active_sessions,
        }
    }
}
