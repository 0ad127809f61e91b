//! GATT constants for the bat sensor.

use std::time::Duration;

/// Advertised device names contain this.
pub const TARGET_NAME: &str = "BLAST@MOTION";

/// Characteristics that may carry IMU notifications.
pub const CANDIDATE_CHARACTERISTICS: [&str; 3] = [
    "424d000a-ee44-38ce-4ebe-d1f190d70133",
    "424d000b-ee44-38ce-4ebe-d1f190d70133",
    "424d000c-ee44-38ce-4ebe-d1f190d70133",
];

/// Payloads written to wake the sensor's stream, in order.
pub const START_PAYLOADS: [&[u8]; 3] = [b"\x01", b"\x01\x00", b"START"];

pub const POKE_GAP: Duration = Duration::from_millis(80);
pub const SCAN_WINDOW: Duration = Duration::from_secs(8);
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(12);
/// No notification for this long counts as a stalled stream.
pub const STALL_TIMEOUT: Duration = Duration::from_secs(3);
pub const CHANNEL_WARMUP: Duration = Duration::from_secs(2);
/// Warmup used when re-picking a channel after a stall.
pub const REPICK_WARMUP: Duration = Duration::from_secs(1);
