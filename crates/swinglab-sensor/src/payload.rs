//! IMU notification payload decoding.
//!
//! The sensor's wire format is undocumented, so [`try_parse`] tries a few
//! plausible layouts of six signed 16-bit values and takes the first that fits.

use serde::Serialize;

/// Accelerometer LSB per g.
pub const ACC_LSB_PER_G: f64 = 16384.0;
/// Gyroscope LSB per degree per second.
pub const GYRO_LSB_PER_DPS: f64 = 131.0;

/// Raw accelerometer and gyroscope counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RawImuSample {
    pub ax: i16,
    pub ay: i16,
    pub az: i16,
    pub gx: i16,
    pub gy: i16,
    pub gz: i16,
}

/// One IMU sample in physical units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ImuSample {
    /// g
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
    /// Degrees per second
    pub gx: f64,
    pub gy: f64,
    pub gz: f64,
}

impl ImuSample {
    /// Gyroscope magnitude in degrees per second.
    pub fn omega(&self) -> f64 {
        (self.gx * self.gx + self.gy * self.gy + self.gz * self.gz).sqrt()
    }
}

impl RawImuSample {
    fn from_values(v: &[i16]) -> Self {
        Self {
            ax: v[0],
            ay: v[1],
            az: v[2],
            gx: v[3],
            gy: v[4],
            gz: v[5],
        }
    }

    pub fn scaled(&self) -> ImuSample {
        ImuSample {
            ax: self.ax as f64 / ACC_LSB_PER_G,
            ay: self.ay as f64 / ACC_LSB_PER_G,
            az: self.az as f64 / ACC_LSB_PER_G,
            gx: self.gx as f64 / GYRO_LSB_PER_DPS,
            gy: self.gy as f64 / GYRO_LSB_PER_DPS,
            gz: self.gz as f64 / GYRO_LSB_PER_DPS,
        }
    }
}

fn unpack_i16(buf: &[u8], from_bytes: fn([u8; 2]) -> i16) -> Option<Vec<i16>> {
    if buf.len() % 2 != 0 {
        return None;
    }
    Some(
        buf.chunks_exact(2)
            .map(|c| from_bytes([c[0], c[1]]))
            .collect(),
    )
}

fn six_values(buf: &[u8], from_bytes: fn([u8; 2]) -> i16) -> Option<RawImuSample> {
    unpack_i16(buf, from_bytes)
        .filter(|v| v.len() >= 6)
        .map(|v| RawImuSample::from_values(&v))
}

/// Decode a notification payload.
///
/// Layouts tried in order:
/// 1. little-endian values from the first byte
/// 2. little-endian after a one-byte prefix (payloads of 13 bytes or more)
/// 3. big-endian values from the first byte
/// 4. gyroscope only, little-endian at byte 6, with zero acceleration
pub fn try_parse(payload: &[u8]) -> Option<RawImuSample> {
    if let Some(s) = six_values(payload, i16::from_le_bytes) {
        return Some(s);
    }

    if payload.len() >= 13 {
        if let Some(s) = six_values(&payload[1..], i16::from_le_bytes) {
            return Some(s);
        }
    }

    if let Some(s) = six_values(payload, i16::from_be_bytes) {
        return Some(s);
    }

    if payload.len() >= 12 {
        let at = |i: usize| i16::from_le_bytes([payload[i], payload[i + 1]]);
        return Some(RawImuSample {
            gx: at(6),
            gy: at(8),
            gz: at(10),
            ..Default::default()
        });
    }

    None
}

/// Decode and scale in one step.
pub fn parse_sample(payload: &[u8]) -> Option<ImuSample> {
    try_parse(payload).map(|raw| raw.scaled())
}
