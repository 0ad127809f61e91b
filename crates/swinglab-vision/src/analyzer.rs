//! Full swing video analysis.
//!
//! [`VideoAnalyzer`] decodes frames through a [`FrameSource`], runs the
//! per-frame detectors and the tracking coordinator, then runs contact,
//! metrics, phase, biomechanics and form-error analysis once over the
//! collected per-frame arrays.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use metrics::{counter, histogram};
use serde::Serialize;
use swinglab_models::{
    AggregatedMetrics, BallObservation, Detection, Point, PoseLandmarks, TrackingQuality, VideoInfo,
};
use tracing::{debug, info, warn};

use crate::biomechanics::{BiomechanicsAnalyzer, BiomechanicsReport};
use crate::contact::{ContactDetector, ContactResult};
use crate::detectors::{
    pose_summary, select_batter, track_ball, BallDetector, BallDetectorChain, BatDetector,
    BatDetectorChain, BatterSelection, PersonDetector, PoseEstimator, PoseSummary,
};
use crate::error::{VisionError, VisionResult};
use crate::form_errors::{FormAnalysis, FormErrorDetector};
use crate::frame_source::{FrameSource, FrameSourceFactory};
use crate::metrics::{FormMetrics, MetricsCalculator};
use crate::model_cache::ModelCache;
use crate::phase::{PhaseSequence, SwingPhaseDetector};
use crate::tracking::{FrameTracking, TrackingCoordinator};

/// Metric names recorded by the analyzer.
pub mod names {
    pub const FRAMES_ANALYZED: &str = "swinglab_frames_analyzed_total";
    pub const VIDEOS_ANALYZED: &str = "swinglab_videos_analyzed_total";
    pub const DETECTOR_ERRORS: &str = "swinglab_detector_errors_total";
    pub const ANALYSIS_DURATION: &str = "swinglab_video_analysis_duration_seconds";
}

/// Which decoded frames get analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    #[default]
    Full,
    /// Every `sample_rate`-th frame, starting at frame 0
    Sampled { sample_rate: usize },
}

impl ProcessingMode {
    fn step(&self) -> usize {
        match self {
            Self::Full => 1,
            Self::Sampled { sample_rate } => (*sample_rate).max(1),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnalyzerConfig {
    pub mode: ProcessingMode,
    /// Stop after this many analyzed frames
    pub max_frames: Option<usize>,
    /// Meters, for stride scaling
    pub batter_height_m: Option<f64>,
    /// Shoulder-to-barrel radius in meters
    pub swing_radius_m: Option<f64>,
}

/// The detectors run on every frame. Any of them may be absent.
#[derive(Clone, Default)]
pub struct DetectorSet {
    pub pose: Option<Arc<dyn PoseEstimator>>,
    pub person: Option<Arc<dyn PersonDetector>>,
    pub bat: Option<Arc<dyn BatDetector>>,
    pub ball: Option<Arc<dyn BallDetector>>,
}

impl DetectorSet {
    /// No detectors at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Model-backed detectors from the cache, with the OpenCV fallbacks
    /// chained after YOLO for bat and ball.
    pub fn from_cache(cache: &ModelCache) -> Self {
        let yolo = cache.yolo();

        let mut bat = BatDetectorChain::new();
        let mut ball = BallDetectorChain::new();
        if let Some(yolo) = &yolo {
            bat = bat.with(yolo.clone());
            ball = ball.with(yolo.clone());
        }

        #[cfg(feature = "opencv")]
        {
            use crate::detectors::opencv_fallback::{BlobBallDetector, HoughBatDetector};
            bat = bat.with(Arc::new(HoughBatDetector));
            ball = ball.with(Arc::new(BlobBallDetector));
        }

        Self {
            pose: cache.pose().map(|p| p as Arc<dyn PoseEstimator>),
            person: yolo.map(|y| y as Arc<dyn PersonDetector>),
            bat: (!bat.is_empty()).then(|| Arc::new(bat) as Arc<dyn BatDetector>),
            ball: (!ball.is_empty()).then(|| Arc::new(ball) as Arc<dyn BallDetector>),
        }
    }
}

/// Everything measured in one analyzed frame.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameAnalysis {
    pub frame_index: usize,
    /// Seconds from the start of the video
    pub timestamp: f64,
    pub pose: Option<PoseLandmarks>,
    pub pose_summary: Option<PoseSummary>,
    pub person: Option<BatterSelection>,
    pub bat_angle: Option<f64>,
    pub bat_position: Option<Point>,
    pub bat: Option<Detection>,
    pub ball: Option<BallObservation>,
    pub tracking: FrameTracking,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Visualization {
    pub skeleton_overlay: bool,
    pub bat_line: bool,
    pub contact_highlight: bool,
}

impl Default for Visualization {
    fn default() -> Self {
        Self {
            skeleton_overlay: true,
            bat_line: true,
            contact_highlight: true,
        }
    }
}

/// Result of analyzing one swing video.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoAnalysis {
    pub ok: bool,
    pub video_info: VideoInfo,
    pub contact_frame: Option<usize>,
    pub contact: Option<ContactResult>,
    pub metrics: AggregatedMetrics,
    pub form_analysis: Option<FormMetrics>,
    pub form_errors: Option<FormAnalysis>,
    pub phases: Option<PhaseSequence>,
    pub biomechanics: Option<BiomechanicsReport>,
    pub tracking_quality: TrackingQuality,
    pub frames: Vec<FrameAnalysis>,
    pub visualization: Visualization,
}

/// Per-frame arrays collected for the post-pass stages. Indexed by
/// analyzed frame, not video frame.
#[derive(Default)]
struct Collected {
    frames: Vec<FrameAnalysis>,
    bat_angles: Vec<Option<f64>>,
    bat_positions: Vec<Option<Point>>,
    balls: Vec<Option<BallObservation>>,
    landmarks: Vec<Option<PoseLandmarks>>,
}

pub struct VideoAnalyzer {
    config: AnalyzerConfig,
    detectors: DetectorSet,
    sources: Arc<dyn FrameSourceFactory>,
}

impl VideoAnalyzer {
    pub fn new(
        config: AnalyzerConfig,
        detectors: DetectorSet,
        sources: Arc<dyn FrameSourceFactory>,
    ) -> Self {
        Self {
            config,
            detectors,
            sources,
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyze an encoded video held in memory.
    ///
    /// The bytes are written to a temporary file named after `filename`'s
    /// extension (`.mp4` when it has none) so the frame source can open it.
    pub fn analyze_video(&self, video: &[u8], filename: &str) -> VisionResult<VideoAnalysis> {
        let suffix = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_else(|| ".mp4".to_string());

        let mut file = tempfile::Builder::new()
            .prefix("swing-")
            .suffix(&suffix)
            .tempfile()?;
        file.write_all(video)?;
        file.flush()?;

        debug!(path = %file.path().display(), bytes = video.len(), "Wrote video to temp file");
        let mut source = self.sources.open(file.path())?;
        self.analyze_source(source.as_mut())
    }

    /// Analyze every selected frame of `source`.
    pub fn analyze_source(&self, source: &mut dyn FrameSource) -> VisionResult<VideoAnalysis> {
        let started = Instant::now();
        let info = source.info().clone();
        let frame_size = (info.width, info.height);
        let step = self.config.mode.step();

        info!(
            fps = info.fps,
            frame_count = info.frame_count,
            width = info.width,
            height = info.height,
            step,
            "Analyzing video"
        );

        let mut coordinator = TrackingCoordinator::new();
        let mut collected = Collected::default();
        let mut prev_ball: Option<Point> = None;

        while let Some((idx, frame)) = source.next_frame()? {
            if idx % step != 0 {
                continue;
            }
            if self
                .config
                .max_frames
                .is_some_and(|max| collected.frames.len() >= max)
            {
                break;
            }

            let analysis = self.process_frame(&frame, idx, &info, prev_ball, &mut coordinator);
            if let Some(center) = analysis.ball.as_ref().and_then(|b| b.detection.center) {
                prev_ball = Some(center);
            }

            collected.bat_angles.push(analysis.bat_angle);
            collected.bat_positions.push(analysis.bat_position);
            collected.balls.push(analysis.ball.clone());
            collected.landmarks.push(analysis.pose.clone());
            collected.frames.push(analysis);
        }

        if collected.frames.is_empty() {
            return Err(VisionError::EmptyVideo);
        }
        counter!(names::FRAMES_ANALYZED).increment(collected.frames.len() as u64);

        // Post-pass stages see one sample per analyzed frame.
        let fps = info.fps / step as f64;
        let analysis = self.run_stages(info, fps, frame_size, collected, &coordinator);

        counter!(names::VIDEOS_ANALYZED).increment(1);
        histogram!(names::ANALYSIS_DURATION).record(started.elapsed().as_secs_f64());
        info!(
            frames = analysis.frames.len(),
            contact_frame = ?analysis.contact_frame,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Video analysis complete"
        );

        Ok(analysis)
    }

    fn process_frame(
        &self,
        frame: &RgbImage,
        idx: usize,
        info: &VideoInfo,
        prev_ball: Option<Point>,
        coordinator: &mut TrackingCoordinator,
    ) -> FrameAnalysis {
        let frame_size = frame.dimensions();

        let pose = self
            .detectors
            .pose
            .as_ref()
            .and_then(|d| settle("pose", idx, d.estimate(frame)));

        let person = self
            .detectors
            .person
            .as_ref()
            .and_then(|d| settle("person", idx, d.detect_persons(frame).map(Some)))
            .and_then(|persons| select_batter(&persons, frame_size));

        let bat = self
            .detectors
            .bat
            .as_ref()
            .and_then(|d| settle("bat", idx, d.detect_bat(frame, pose.as_ref())));

        let ball = self
            .detectors
            .ball
            .as_ref()
            .and_then(|d| settle("ball", idx, d.detect_ball(frame)))
            .map(|d| track_ball(prev_ball, d));

        let tracking = coordinator.update_frame(
            person.as_ref().map(|p| &p.detection),
            bat.as_ref(),
            ball.as_ref().map(|b| &b.detection),
            pose.as_ref(),
            idx,
        );

        FrameAnalysis {
            frame_index: idx,
            timestamp: if info.fps > 0.0 { idx as f64 / info.fps } else { 0.0 },
            pose_summary: pose.as_ref().map(|p| pose_summary(p, frame_size)),
            pose,
            person,
            bat_angle: bat.as_ref().and_then(|b| b.angle),
            bat_position: bat.as_ref().map(|b| b.bbox.center()),
            bat,
            ball,
            tracking,
        }
    }

    fn run_stages(
        &self,
        info: VideoInfo,
        fps: f64,
        frame_size: (u32, u32),
        collected: Collected,
        coordinator: &TrackingCoordinator,
    ) -> VideoAnalysis {
        let Collected {
            frames,
            bat_angles,
            bat_positions,
            balls,
            landmarks,
        } = collected;

        let contact = ContactDetector::default().detect_contact(&bat_angles, &bat_positions, &balls, fps);
        let contact_frame = contact.as_ref().map(|c| c.frame);
        match &contact {
            Some(c) => info!(frame = c.frame, confidence = c.confidence, "Contact detected"),
            None => debug!("No contact detected"),
        }

        let calculator = MetricsCalculator::new(self.config.batter_height_m);
        let tracking_quality = coordinator.tracking_quality();
        let mut metrics = self.aggregate_metrics(&calculator, &bat_angles, contact_frame, fps);
        metrics.tracking_quality = Some(tracking_quality.clone());

        let phases = SwingPhaseDetector::new().detect_phases_sequence(
            &landmarks,
            &bat_angles,
            &bat_positions,
            &balls,
            frame_size,
            contact_frame,
        );

        let biomechanics = match BiomechanicsAnalyzer::new().analyze(&landmarks, frame_size, contact_frame) {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "Biomechanics analysis skipped");
                None
            }
        };

        let has_pose = landmarks.iter().any(Option::is_some);
        let form_errors = has_pose.then(|| {
            FormErrorDetector::new().detect_errors(&landmarks, frame_size, contact_frame)
        });
        let form_analysis = has_pose.then(|| calculator.calculate_form_metrics(&landmarks, frame_size));

        VideoAnalysis {
            ok: true,
            video_info: info,
            contact_frame,
            contact,
            metrics,
            form_analysis,
            form_errors,
            phases: Some(phases),
            biomechanics,
            tracking_quality,
            frames,
            visualization: Visualization::default(),
        }
    }

    /// Bat speed, exit velocity and launch angle at contact.
    ///
    /// All zeros without a contact frame, or when contact is the first
    /// frame (no previous angle to differentiate against).
    fn aggregate_metrics(
        &self,
        calculator: &MetricsCalculator,
        bat_angles: &[Option<f64>],
        contact_frame: Option<usize>,
        fps: f64,
    ) -> AggregatedMetrics {
        let contact = match contact_frame {
            Some(c) if c > 0 && c < bat_angles.len() => c,
            _ => return AggregatedMetrics::default(),
        };

        let speed = calculator.calculate_bat_speed(bat_angles, contact, fps, self.config.swing_radius_m);
        let angle = bat_angles[contact].unwrap_or(0.0);
        let exit = calculator.estimate_exit_velocity(speed.linear_speed, angle, None);

        AggregatedMetrics {
            bat_angular_velocity: speed.angular_velocity,
            bat_linear_speed: speed.linear_speed,
            bat_linear_speed_mph: speed.linear_speed_mph,
            exit_velocity_estimate: exit.exit_velocity,
            exit_velocity_estimate_mph: exit.exit_velocity_mph,
            exit_velocity_error_margin: exit.error_margin,
            launch_angle: angle,
            tracking_quality: None,
        }
    }
}

/// Turn a detector error into "nothing detected this frame".
fn settle<T>(stage: &'static str, frame: usize, result: VisionResult<Option<T>>) -> Option<T> {
    result.unwrap_or_else(|e| {
        warn!(stage, frame, error = %e, "Detector failed, treating frame as empty");
        counter!(names::DETECTOR_ERRORS, "stage" => stage).increment(1);
        None
    })
}
