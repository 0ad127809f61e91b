//! Bat motion-sensor integration.
//!
//! This crate provides:
//! - Best-effort decoding of IMU notification payloads
//! - Threshold swing detection on gyroscope magnitude
//! - Data channel auto-selection by signal variance
//! - A session manager running one detection task per session
//! - An HTTP sink that forwards swings to the web app
//!
//! The radio itself sits behind [`MotionScanner`] and [`MotionLink`].

pub mod channel;
pub mod debug;
pub mod detector;
pub mod error;
pub mod gatt;
pub mod link;
pub mod payload;
pub mod reconnect;
pub mod session;
pub mod sink;

pub use channel::{auto_pick_channels, pick_channel};
pub use debug::{DebugSnapshot, DebugState};
pub use detector::{SwingDetector, Thresholds};
pub use error::{SensorError, SensorResult};
pub use link::{DeviceInfo, MotionLink, MotionScanner, Notification};
pub use payload::{parse_sample, try_parse, ImuSample, RawImuSample};
pub use reconnect::ReconnectPolicy;
pub use session::{SessionConfig, SessionManager, SessionStatus};
pub use sink::{SinkConfig, SwingReporter, SwingSink};
