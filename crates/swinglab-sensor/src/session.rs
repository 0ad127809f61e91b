//! One background task per swing-detection session.
//!
//! Each session owns its detector and radio connection. It scans, connects,
//! streams notifications into the detector and reconnects on failure until
//! its cancel signal fires. Cancellation is observed at every await point.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use serde_json::json;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::channel::auto_pick_channels;
use crate::debug::{DebugSnapshot, DebugState};
use crate::detector::SwingDetector;
use crate::error::{SensorError, SensorResult};
use crate::gatt;
use crate::link::{find_device, poke, MotionLink, MotionScanner, Notification};
use crate::payload::parse_sample;
use crate::reconnect::ReconnectPolicy;
use crate::sink::SwingReporter;

pub const SWINGS_DETECTED: &str = "swinglab_swings_detected_total";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub scan_window: Duration,
    pub connect_timeout: Duration,
    pub stall_timeout: Duration,
    pub channel_warmup: Duration,
    pub repick_warmup: Duration,
    pub poke_gap: Duration,
    /// Idle listening before calibrating thresholds. Ignored with forced thresholds.
    pub calibration: Duration,
    pub force_thresholds: bool,
    pub reconnect: ReconnectPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scan_window: gatt::SCAN_WINDOW,
            connect_timeout: gatt::CONNECT_TIMEOUT,
            stall_timeout: gatt::STALL_TIMEOUT,
            channel_warmup: gatt::CHANNEL_WARMUP,
            repick_warmup: gatt::REPICK_WARMUP,
            poke_gap: gatt::POKE_GAP,
            calibration: Duration::from_secs(2),
            force_thresholds: true,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub session_id: String,
    pub is_running: bool,
    pub started_at: Option<DateTime<Utc>>,
}

struct SessionHandle {
    cancel: watch::Sender<bool>,
    started_at: DateTime<Utc>,
    task: JoinHandle<()>,
}

/// What a session task needs, cloned into it.
#[derive(Clone)]
struct SessionContext {
    session_id: String,
    scanner: Arc<dyn MotionScanner>,
    reporter: Arc<dyn SwingReporter>,
    debug: Arc<DebugState>,
    config: SessionConfig,
}

enum StreamEnd {
    Cancelled,
    Disconnected,
}

/// Starts, stops and lists swing-detection sessions.
pub struct SessionManager {
    scanner: Arc<dyn MotionScanner>,
    reporter: Arc<dyn SwingReporter>,
    debug: Arc<DebugState>,
    config: SessionConfig,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionManager {
    pub fn new(
        scanner: Arc<dyn MotionScanner>,
        reporter: Arc<dyn SwingReporter>,
        debug: Arc<DebugState>,
        config: SessionConfig,
    ) -> Self {
        Self {
            scanner,
            reporter,
            debug,
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Spawn detection for `session_id`. Fails if it is already running.
    pub async fn start(&self, session_id: &str) -> SensorResult<SessionStatus> {
        let mut sessions = self.sessions.write().await;
        if sessions
            .get(session_id)
            .is_some_and(|h| !h.task.is_finished())
        {
            return Err(SensorError::AlreadyRunning(session_id.to_string()));
        }

        let (cancel, cancel_rx) = watch::channel(false);
        let ctx = SessionContext {
            session_id: session_id.to_string(),
            scanner: Arc::clone(&self.scanner),
            reporter: Arc::clone(&self.reporter),
            debug: Arc::clone(&self.debug),
            config: self.config.clone(),
        };
        let span = info_span!("swing_session", session_id = %session_id);
        let task = tokio::spawn(run_session(ctx, cancel_rx).instrument(span));

        let started_at = Utc::now();
        sessions.insert(
            session_id.to_string(),
            SessionHandle {
                cancel,
                started_at,
                task,
            },
        );
        info!(session_id, "Swing detection started");

        Ok(SessionStatus {
            session_id: session_id.to_string(),
            is_running: true,
            started_at: Some(started_at),
        })
    }

    /// Signal the session to stop. The task exits at its next await point.
    pub async fn stop(&self, session_id: &str) -> SensorResult<SessionStatus> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(session_id)
            .ok_or_else(|| SensorError::NotRunning(session_id.to_string()))?;

        let _ = handle.cancel.send(true);
        info!(session_id, "Swing detection stopped");

        Ok(SessionStatus {
            session_id: session_id.to_string(),
            is_running: false,
            started_at: Some(handle.started_at),
        })
    }

    pub async fn status(&self, session_id: &str) -> SessionStatus {
        let sessions = self.sessions.read().await;
        match sessions.get(session_id) {
            Some(h) => SessionStatus {
                session_id: session_id.to_string(),
                is_running: !h.task.is_finished(),
                started_at: Some(h.started_at),
            },
            None => SessionStatus {
                session_id: session_id.to_string(),
                is_running: false,
                started_at: None,
            },
        }
    }

    /// Every known session, by id.
    pub async fn list(&self) -> Vec<SessionStatus> {
        let sessions = self.sessions.read().await;
        let mut out: Vec<SessionStatus> = sessions
            .iter()
            .map(|(id, h)| SessionStatus {
                session_id: id.clone(),
                is_running: !h.task.is_finished(),
                started_at: Some(h.started_at),
            })
            .collect();
        out.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        out
    }

    pub async fn debug_snapshot(&self) -> DebugSnapshot {
        let active = self.sessions.read().await.len();
        self.debug.snapshot(active)
    }

    /// Stop every session and wait for the tasks to exit.
    pub async fn shutdown(&self) {
        let handles: Vec<SessionHandle> = self.sessions.write().await.drain().map(|(_, h)| h).collect();
        for handle in &handles {
            let _ = handle.cancel.send(true);
        }
        for handle in handles {
            let _ = handle.task.await;
        }
    }
}

/// Resolves once cancellation is requested or the manager dropped the sender.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Sleep before the next attempt. `false` when cancelled or out of retries.
async fn back_off(
    policy: &ReconnectPolicy,
    attempt: &mut u32,
    cancel: &mut watch::Receiver<bool>,
) -> bool {
    if !policy.allows(*attempt) {
        warn!(attempts = *attempt, "Giving up on the sensor");
        return false;
    }
    let delay = policy.delay_for(*attempt);
    *attempt += 1;
    debug!(delay_ms = delay.as_millis() as u64, "Retrying");

    tokio::select! {
        _ = cancelled(cancel) => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

async fn run_session(ctx: SessionContext, mut cancel: watch::Receiver<bool>) {
    let mut detector = if ctx.config.force_thresholds {
        SwingDetector::new(&ctx.session_id)
    } else {
        SwingDetector::calibrating(&ctx.session_id)
    };
    let policy = ctx.config.reconnect.clone();
    let mut attempt = 0u32;
    let session = json!({ "session_id": ctx.session_id });

    loop {
        if *cancel.borrow() {
            break;
        }

        ctx.debug.record_connection_event("scanning", session.clone());
        ctx.debug.set_device(None);

        let found = tokio::select! {
            _ = cancelled(&mut cancel) => break,
            r = find_device(ctx.scanner.as_ref(), ctx.config.scan_window) => r,
        };
        let device = match found {
            Ok(Some(d)) => d,
            Ok(None) => {
                info!("No sensor found");
                ctx.debug.record_connection_event("not_found", session.clone());
                if !back_off(&policy, &mut attempt, &mut cancel).await {
                    break;
                }
                continue;
            }
            Err(e) => {
                warn!(error = %e, "Scan failed");
                ctx.debug
                    .record_connection_event("error", json!({ "session_id": ctx.session_id, "error": e.to_string() }));
                if !back_off(&policy, &mut attempt, &mut cancel).await {
                    break;
                }
                continue;
            }
        };

        info!(name = %device.name, address = %device.address, "Found sensor");
        ctx.debug.record_connection_event(
            "found",
            json!({ "session_id": ctx.session_id, "name": device.name, "address": device.address }),
        );

        let connected = tokio::select! {
            _ = cancelled(&mut cancel) => break,
            r = timeout(ctx.config.connect_timeout, ctx.scanner.connect(&device)) => r,
        };
        let link = match connected {
            Ok(Ok(link)) => link,
            Ok(Err(e)) => {
                warn!(error = %e, "Connection failed");
                ctx.debug
                    .record_connection_event("connection_failed", json!({ "session_id": ctx.session_id, "error": e.to_string() }));
                if !back_off(&policy, &mut attempt, &mut cancel).await {
                    break;
                }
                continue;
            }
            Err(_) => {
                let e = SensorError::ConnectTimeout(ctx.config.connect_timeout.as_secs());
                warn!(error = %e, "Connection failed");
                ctx.debug
                    .record_connection_event("connection_failed", json!({ "session_id": ctx.session_id, "error": e.to_string() }));
                if !back_off(&policy, &mut attempt, &mut cancel).await {
                    break;
                }
                continue;
            }
        };

        attempt = 0;
        info!("Connected, waiting for swings");
        ctx.debug.record_connection_event(
            "connected",
            json!({ "session_id": ctx.session_id, "name": device.name, "address": device.address }),
        );
        ctx.debug.set_device(Some(&device));

        let outcome = stream(link, &mut detector, &ctx, &mut cancel).await;

        ctx.debug.set_device(None);
        ctx.debug.record_connection_event(
            "disconnected",
            json!({ "session_id": ctx.session_id, "name": device.name, "address": device.address }),
        );

        match outcome {
            Ok(StreamEnd::Cancelled) => break,
            Ok(StreamEnd::Disconnected) => warn!("Sensor disconnected"),
            Err(e) => warn!(error = %e, "Sensor stream failed"),
        }
        if !back_off(&policy, &mut attempt, &mut cancel).await {
            break;
        }
    }

    info!("Swing session ended");
}

/// Feed one notification to the detector and report any finished swing.
fn handle_notification(n: &Notification, detector: &mut SwingDetector, ctx: &SessionContext) {
    let Some(sample) = parse_sample(&n.data) else {
        return;
    };
    let Some(event) = detector.feed(n.received_at, &sample) else {
        return;
    };

    ctx.debug.record_swing(&event);
    counter!(SWINGS_DETECTED).increment(1);

    let reporter = Arc::clone(&ctx.reporter);
    tokio::spawn(async move {
        reporter.report(&event).await;
    });
}

/// Listen for idle samples and calibrate the detector's thresholds.
async fn calibrate(
    link: &mut dyn MotionLink,
    detector: &mut SwingDetector,
    window: Duration,
) -> SensorResult<()> {
    let mut omegas = Vec::new();
    let deadline = Instant::now() + window;
    while Instant::now() < deadline {
        let Ok(next) = tokio::time::timeout_at(deadline, link.next_notification()).await else {
            break;
        };
        match next? {
            Some(n) => omegas.extend(parse_sample(&n.data).map(|s| s.omega())),
            None => break,
        }
    }
    detector.calibrate_from(&omegas);
    let t = detector.thresholds();
    debug!(samples = omegas.len(), start_dps = t.start_dps, stop_dps = t.stop_dps, "Calibrated");
    Ok(())
}

async fn stream(
    mut link: Box<dyn MotionLink>,
    detector: &mut SwingDetector,
    ctx: &SessionContext,
    cancel: &mut watch::Receiver<bool>,
) -> SensorResult<StreamEnd> {
    let config = &ctx.config;
    let mut channels = auto_pick_channels(link.as_mut(), config.channel_warmup, config.poke_gap).await;

    if !config.force_thresholds {
        calibrate(link.as_mut(), detector, config.calibration).await?;
    }
    if !channels.is_empty() {
        poke(link.as_mut(), &channels, config.poke_gap, "post-subscribe").await;
    }

    loop {
        let next = tokio::select! {
            _ = cancelled(cancel) => return Ok(StreamEnd::Cancelled),
            r = timeout(config.stall_timeout, link.next_notification()) => r,
        };

        match next {
            Ok(Ok(Some(n))) => handle_notification(&n, detector, ctx),
            Ok(Ok(None)) => return Ok(StreamEnd::Disconnected),
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                warn!(channels = channels.len(), "Sensor stream stalled, poking");
                poke(link.as_mut(), &channels, config.poke_gap, "stall").await;

                match timeout(Duration::from_secs(1), link.next_notification()).await {
                    Ok(Ok(Some(n))) => handle_notification(&n, detector, ctx),
                    Ok(Ok(None)) => return Ok(StreamEnd::Disconnected),
                    Ok(Err(e)) => return Err(e),
                    Err(_) => {
                        for c in &channels {
                            let _ = link.unsubscribe(c).await;
                        }
                        channels =
                            auto_pick_channels(link.as_mut(), config.repick_warmup, config.poke_gap).await;
                    }
                }
            }
        }

        if !link.is_connected() {
            return Ok(StreamEnd::Disconnected);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::fake::{notification, spin_payload, FakeScanner};
    use crate::link::DeviceInfo;
    use std::sync::atomic::Ordering;
    use swinglab_models::SwingEvent;
    use tokio::sync::mpsc;

    struct ChannelReporter(mpsc::UnboundedSender<SwingEvent>);

    #[async_trait::async_trait]
    impl SwingReporter for ChannelReporter {
        async fn report(&self, event: &SwingEvent) {
            let _ = self.0.send(event.clone());
        }
    }

    fn fast_config() -> SessionConfig {
        SessionConfig {
            scan_window: Duration::from_millis(1),
            connect_timeout: Duration::from_millis(200),
            stall_timeout: Duration::from_millis(200),
            channel_warmup: Duration::ZERO,
            repick_warmup: Duration::ZERO,
            poke_gap: Duration::ZERO,
            calibration: Duration::ZERO,
            force_thresholds: true,
            reconnect: ReconnectPolicy::fixed(Duration::from_millis(20)),
        }
    }

    fn manager(scanner: FakeScanner) -> (SessionManager, mpsc::UnboundedReceiver<SwingEvent>, Arc<FakeScanner>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scanner = Arc::new(scanner);
        let manager = SessionManager::new(
            scanner.clone(),
            Arc::new(ChannelReporter(tx)),
            Arc::new(DebugState::new()),
            fast_config(),
        );
        (manager, rx, scanner)
    }

    fn sensor() -> DeviceInfo {
        DeviceInfo {
            name: "BLAST@MOTION".into(),
            address: "AA:BB:CC".into(),
        }
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let (manager, _rx, _) = manager(FakeScanner::new(vec![], vec![]));

        let status = manager.start("s1").await.unwrap();
        assert!(status.is_running);
        assert!(manager.status("s1").await.is_running);
        assert!(matches!(
            manager.start("s1").await,
            Err(SensorError::AlreadyRunning(_))
        ));
        assert_eq!(manager.list().await.len(), 1);

        let stopped = manager.stop("s1").await.unwrap();
        assert!(!stopped.is_running);
        assert!(!manager.status("s1").await.is_running);
        assert!(matches!(manager.stop("s1").await, Err(SensorError::NotRunning(_))));

        // Can start again once stopped.
        assert!(manager.start("s1").await.is_ok());
        manager.shutdown().await;
        assert!(manager.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_swing_flows_to_reporter() {
        let channel = gatt::CANDIDATE_CHARACTERISTICS[0];
        let mut script = Vec::new();
        for i in 0..40 {
            let t = 100.0 + i as f64 * 0.01;
            let dps = if (10..30).contains(&i) { 200.0 } else { 5.0 };
            script.push(notification(channel, spin_payload(dps), t));
        }

        let (manager, mut rx, scanner) = manager(FakeScanner::new(vec![sensor()], script));
        manager.start("s2").await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.session_id, "s2");
        assert!((event.t_start - 100.1).abs() < 1e-6);
        assert!((event.omega_peak_dps - 200.0).abs() < 0.1);

        let snapshot = manager.debug_snapshot().await;
        assert_eq!(snapshot.swings.len(), 1);
        assert!(snapshot
            .connection_events
            .iter()
            .any(|e| e.event_type == "connected"));
        assert_eq!(snapshot.active_sessions, 1);

        manager.shutdown().await;
        assert!(scanner.connects.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let config = SessionConfig {
            reconnect: ReconnectPolicy {
                max_retries: Some(2),
                ..ReconnectPolicy::fixed(Duration::from_millis(5))
            },
            ..fast_config()
        };
        let manager = SessionManager::new(
            Arc::new(FakeScanner::new(vec![], vec![])),
            Arc::new(ChannelReporter(tx)),
            Arc::new(DebugState::new()),
            config,
        );

        manager.start("s3").await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!manager.status("s3").await.is_running);

        let events = manager.debug_snapshot().await.connection_events;
        let not_found = events.iter().filter(|e| e.event_type == "not_found").count();
        assert_eq!(not_found, 3);
    }
}
