//! Threshold-based swing detection on gyroscope magnitude.
//!
//! A swing starts when angular speed reaches the start threshold and ends
//! when it falls to the stop threshold. Swings outside 100 to 1500 ms are
//! discarded.

use std::collections::VecDeque;

use chrono::Utc;
use swinglab_models::SwingEvent;
use tracing::info;

use crate::payload::ImuSample;

pub const MIN_SWING_MS: u64 = 100;
pub const MAX_SWING_MS: u64 = 1500;
/// Pivot-to-sweet-spot radius used for bat speed
pub const RADIUS_M: f64 = 0.75;
const MPS_TO_MPH: f64 = 2.23694;
const RATE_WINDOW: usize = 50;

/// Start and stop thresholds in degrees per second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub start_dps: f64,
    pub stop_dps: f64,
}

impl Thresholds {
    /// Low thresholds that make any vigorous motion count.
    pub const FORCED: Self = Self {
        start_dps: 90.0,
        stop_dps: 45.0,
    };

    pub const FALLBACK: Self = Self {
        start_dps: 120.0,
        stop_dps: 60.0,
    };

    /// Thresholds from idle angular speeds: eight and four standard
    /// deviations above the mean, clamped to sane ranges.
    ///
    /// Falls back when there is no data, the signal is flat (σ < 1), or the
    /// sensor was not idle (μ > 150).
    pub fn calibrate(omegas: &[f64]) -> Self {
        if omegas.is_empty() {
            return Self::FALLBACK;
        }

        let n = omegas.len() as f64;
        let mu = omegas.iter().sum::<f64>() / n;
        let var = omegas.iter().map(|w| (w - mu).powi(2)).sum::<f64>() / (n - 1.0).max(1.0);
        let sd = if var > 0.0 { var.sqrt() } else { 0.0 };

        if sd < 1.0 || mu > 150.0 {
            return Self::FALLBACK;
        }

        Self {
            start_dps: (mu + 8.0 * sd).clamp(Self::FALLBACK.start_dps, 500.0),
            stop_dps: (mu + 4.0 * sd).clamp(Self::FALLBACK.stop_dps, 350.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Idle,
    InSwing {
        t_start: f64,
        t_peak: f64,
        omega_peak: f64,
    },
}

/// Per-session swing detector.
#[derive(Debug, Clone)]
pub struct SwingDetector {
    session_id: String,
    thresholds: Thresholds,
    /// Ignore calibration and keep the current thresholds
    force_thresholds: bool,
    state: State,
    ticks: VecDeque<f64>,
}

impl SwingDetector {
    /// Detector with the forced thresholds.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            thresholds: Thresholds::FORCED,
            force_thresholds: true,
            state: State::Idle,
            ticks: VecDeque::with_capacity(RATE_WINDOW),
        }
    }

    /// Detector that accepts calibration, starting from the fallback thresholds.
    pub fn calibrating(session_id: impl Into<String>) -> Self {
        Self {
            thresholds: Thresholds::FALLBACK,
            force_thresholds: false,
            ..Self::new(session_id)
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn in_swing(&self) -> bool {
        matches!(self.state, State::InSwing { .. })
    }

    /// Recalibrate from idle samples. No-op with forced thresholds.
    pub fn calibrate_from(&mut self, omegas: &[f64]) {
        if !self.force_thresholds {
            self.thresholds = Thresholds::calibrate(omegas);
        }
    }

    /// Samples per second over the last 50 samples.
    pub fn sample_rate(&self) -> f64 {
        match (self.ticks.front(), self.ticks.back()) {
            (Some(first), Some(last)) if self.ticks.len() >= 2 && last > first => {
                (self.ticks.len() - 1) as f64 / (last - first)
            }
            _ => 0.0,
        }
    }

    /// Time of the most recent sample.
    pub fn last_sample_at(&self) -> Option<f64> {
        self.ticks.back().copied()
    }

    /// Feed one sample taken at `t` seconds. Returns a swing when one just ended.
    pub fn feed(&mut self, t: f64, sample: &ImuSample) -> Option<SwingEvent> {
        if self.ticks.len() == RATE_WINDOW {
            self.ticks.pop_front();
        }
        self.ticks.push_back(t);

        let omega = sample.omega();

        match self.state {
            State::Idle => {
                if omega >= self.thresholds.start_dps {
                    self.state = State::InSwing {
                        t_start: t,
                        t_peak: t,
                        omega_peak: omega,
                    };
                }
                None
            }
            State::InSwing {
                t_start,
                mut t_peak,
                mut omega_peak,
            } => {
                if omega > omega_peak {
                    t_peak = t;
                    omega_peak = omega;
                }

                if omega > self.thresholds.stop_dps {
                    self.state = State::InSwing {
                        t_start,
                        t_peak,
                        omega_peak,
                    };
                    return None;
                }

                self.state = State::Idle;
                let duration_ms = ((t - t_start) * 1000.0).max(0.0) as u64;
                if !(MIN_SWING_MS..=MAX_SWING_MS).contains(&duration_ms) {
                    return None;
                }

                let speed_mph = omega_peak.to_radians() * RADIUS_M * MPS_TO_MPH;
                let attack_angle_deg = 0.0;

                info!(
                    session_id = %self.session_id,
                    speed_mph = round1(speed_mph),
                    omega_peak_dps = round1(omega_peak),
                    duration_ms,
                    "Swing detected"
                );

                Some(SwingEvent {
                    t_start,
                    t_peak,
                    t_end: t,
                    duration_ms,
                    omega_peak_dps: round1(omega_peak),
                    bat_speed_mph: round1(speed_mph),
                    attack_angle_deg,
                    timestamp: Utc::now(),
                    session_id: self.session_id.clone(),
                })
            }
        }
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
