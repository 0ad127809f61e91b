//! Radio abstraction for the bat sensor.
//!
//! [`MotionScanner`] finds and connects to devices, [`MotionLink`] is one
//! open GATT connection. Notifications are pulled rather than pushed so the
//! session loop can race them against cancellation and stall timeouts.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, trace};

use crate::error::SensorResult;
use crate::gatt::{START_PAYLOADS, TARGET_NAME};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub address: String,
}

/// One GATT notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub characteristic: String,
    pub data: Vec<u8>,
    /// Seconds on a monotonic clock, stamped on receipt
    pub received_at: f64,
}

#[async_trait]
pub trait MotionScanner: Send + Sync {
    /// Devices advertising within `window`.
    async fn scan(&self, window: Duration) -> SensorResult<Vec<DeviceInfo>>;

    async fn connect(&self, device: &DeviceInfo) -> SensorResult<Box<dyn MotionLink>>;
}

#[async_trait]
pub trait MotionLink: Send {
    async fn subscribe(&mut self, characteristic: &str) -> SensorResult<()>;

    async fn unsubscribe(&mut self, characteristic: &str) -> SensorResult<()>;

    async fn write(
        &mut self,
        characteristic: &str,
        payload: &[u8],
        with_response: bool,
    ) -> SensorResult<()>;

    /// Next notification from any subscribed characteristic, `Ok(None)`
    /// once the connection has closed.
    async fn next_notification(&mut self) -> SensorResult<Option<Notification>>;

    fn is_connected(&self) -> bool;
}

/// First scanned device whose name contains the sensor's name.
pub async fn find_device(
    scanner: &dyn MotionScanner,
    window: Duration,
) -> SensorResult<Option<DeviceInfo>> {
    let devices = scanner.scan(window).await?;
    debug!(count = devices.len(), "Scan finished");
    Ok(devices.into_iter().find(|d| d.name.contains(TARGET_NAME)))
}

/// Write every start payload to every characteristic, `gap` apart.
///
/// Each write is tried without response first, then with. Failures are ignored.
pub async fn poke(link: &mut dyn MotionLink, characteristics: &[String], gap: Duration, reason: &str) {
    trace!(reason, channels = characteristics.len(), "Poking sensor");
    for characteristic in characteristics {
        for payload in START_PAYLOADS {
            if link.write(characteristic, payload, false).await.is_err() {
                let _ = link.write(characteristic, payload, true).await;
            }
            tokio::time::sleep(gap).await;
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scripted scanner and link for tests.

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::SensorError;

    #[derive(Default)]
    pub struct FakeLink {
        pub script: VecDeque<Notification>,
        pub subscribed: Vec<String>,
        pub writes: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
        pub fail_writes_without_response: bool,
    }

    impl FakeLink {
        pub fn with_script(script: Vec<Notification>) -> Self {
            Self {
                script: script.into(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl MotionLink for FakeLink {
        async fn subscribe(&mut self, characteristic: &str) -> SensorResult<()> {
            self.subscribed.push(characteristic.to_string());
            Ok(())
        }

        async fn unsubscribe(&mut self, characteristic: &str) -> SensorResult<()> {
            self.subscribed.retain(|c| c != characteristic);
            Ok(())
        }

        async fn write(
            &mut self,
            characteristic: &str,
            payload: &[u8],
            with_response: bool,
        ) -> SensorResult<()> {
            if self.fail_writes_without_response && !with_response {
                return Err(SensorError::gatt("write without response unsupported"));
            }
            self.writes
                .lock()
                .unwrap()
                .push((characteristic.to_string(), payload.to_vec()));
            Ok(())
        }

        async fn next_notification(&mut self) -> SensorResult<Option<Notification>> {
            Ok(self.script.pop_front())
        }

        fn is_connected(&self) -> bool {
            !self.script.is_empty()
        }
    }

    /// Finds one device; the first connection gets the script, later ones close at once.
    pub struct FakeScanner {
        pub devices: Vec<DeviceInfo>,
        pub script: Mutex<Option<Vec<Notification>>>,
        pub connects: AtomicUsize,
    }

    impl FakeScanner {
        pub fn new(devices: Vec<DeviceInfo>, script: Vec<Notification>) -> Self {
            Self {
                devices,
                script: Mutex::new(Some(script)),
                connects: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MotionScanner for FakeScanner {
        async fn scan(&self, _window: Duration) -> SensorResult<Vec<DeviceInfo>> {
            Ok(self.devices.clone())
        }

        async fn connect(&self, _device: &DeviceInfo) -> SensorResult<Box<dyn MotionLink>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let script = self.script.lock().unwrap().take().unwrap_or_default();
            Ok(Box::new(FakeLink::with_script(script)))
        }
    }

    pub fn notification(characteristic: &str, data: Vec<u8>, at: f64) -> Notification {
        Notification {
            characteristic: characteristic.to_string(),
            data,
            received_at: at,
        }
    }

    /// Little-endian payload spinning at `dps` around z.
    pub fn spin_payload(dps: f64) -> Vec<u8> {
        let gz = (dps * crate::payload::GYRO_LSB_PER_DPS).round() as i16;
        [0i16, 0, 16384, 0, 0, gz]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect()
    }
}
