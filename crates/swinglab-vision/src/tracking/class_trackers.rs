//! Single-object trackers for the batter, the bat and the ball.
//!
//! Each wraps a [`MultiObjectTracker`] tuned to how fast the object moves,
//! and keeps reporting the last confirmed object for a short grace window
//! after detections stop.

use serde::Serialize;
use swinglab_models::{Detection, DetectionMethod, ObjectClass, Point};
use tracing::trace;

use super::multi_object::{MultiObjectTracker, Track, TrackerConfig};

/// Tuning for one object class.
#[derive(Debug, Clone)]
pub struct ClassTrackerConfig {
    pub class: ObjectClass,
    pub tracker: TrackerConfig,
    /// Keep predicting while `time_since_update` is below this
    pub grace_frames: u32,
    /// Confidence multiplier for predicted results
    pub predicted_confidence_factor: f64,
}

impl ClassTrackerConfig {
    pub fn person() -> Self {
        Self::with(ObjectClass::Person, 30, 0.3, 10, 0.7)
    }

    /// Bats move fast and are thin, so tracks expire sooner and match looser.
    pub fn bat() -> Self {
        Self::with(ObjectClass::Bat, 15, 0.2, 5, 0.6)
    }

    pub fn ball() -> Self {
        Self::with(ObjectClass::Ball, 20, 0.25, 8, 0.5)
    }

    fn with(class: ObjectClass, max_age: u32, iou: f64, grace: u32, factor: f64) -> Self {
        Self {
            class,
            tracker: TrackerConfig {
                max_age,
                min_hits: 2,
                iou_threshold: iou,
                use_kalman: true,
            },
            grace_frames: grace,
            predicted_confidence_factor: factor,
        }
    }
}

/// A tracker result: the track id plus the detection it currently stands for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedObject {
    pub track_id: u32,
    #[serde(flatten)]
    pub detection: Detection,
}

impl TrackedObject {
    pub fn center(&self) -> Point {
        self.detection.center_point()
    }

    pub fn is_predicted(&self) -> bool {
        self.detection.predicted
    }
}

/// Tracks the single most confident object of one class.
pub struct ClassTracker {
    config: ClassTrackerConfig,
    tracker: MultiObjectTracker,
    current: Option<TrackedObject>,
}

impl ClassTracker {
    pub fn new(config: ClassTrackerConfig) -> Self {
        let tracker = MultiObjectTracker::new(config.tracker.clone());
        Self {
            config,
            tracker,
            current: None,
        }
    }

    pub fn person() -> Self {
        Self::new(ClassTrackerConfig::person())
    }

    pub fn bat() -> Self {
        Self::new(ClassTrackerConfig::bat())
    }

    pub fn ball() -> Self {
        Self::new(ClassTrackerConfig::ball())
    }

    /// Advance one frame.
    ///
    /// Returns the best confirmed track observed this frame. Without one, the
    /// previously reported object is predicted forward while it is inside the
    /// grace window.
    pub fn update(&mut self, detection: Option<&Detection>) -> Option<TrackedObject> {
        let detections: Vec<Detection> = detection
            .map(|d| {
                let mut d = d.clone();
                d.class = self.config.class;
                d
            })
            .into_iter()
            .collect();

        let confirmed = self.tracker.update(&detections);
        let observed = confirmed
            .iter()
            .filter(|t| t.time_since_update == 0)
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence));

        if let Some(track) = observed {
            let result = self.observed(track);
            self.current = Some(result.clone());
            return Some(result);
        }

        if let Some(prev) = self.current.as_ref() {
            if let Some(track) = self.tracker.get_track_by_id(prev.track_id) {
                if track.time_since_update < self.config.grace_frames {
                    trace!(
                        class = self.config.class.as_str(),
                        track_id = track.track_id,
                        frames_missing = track.time_since_update,
                        "Predicting missing object"
                    );
                    return Some(self.predicted(track, prev));
                }
            }
        }

        self.current = None;
        None
    }

    /// Clear all tracks and the remembered object.
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.current = None;
    }

    pub fn inner(&self) -> &MultiObjectTracker {
        &self.tracker
    }

    fn observed(&self, track: &Track) -> TrackedObject {
        let source = &track.last_detection;
        let mut detection = Detection::new(track.bbox, track.confidence, self.config.class)
            .with_method(source.method);

        match self.config.class {
            ObjectClass::Bat => {
                detection.angle = source.angle;
            }
            ObjectClass::Ball => {
                detection.center = Some(source.center.unwrap_or_else(|| track.bbox.center()));
                detection.radius = Some(source.radius.unwrap_or_else(|| ball_radius(track)));
            }
            ObjectClass::Person => {}
        }

        TrackedObject {
            track_id: track.track_id,
            detection,
        }
    }

    fn predicted(&self, track: &Track, previous: &TrackedObject) -> TrackedObject {
        let confidence = track.confidence * self.config.predicted_confidence_factor;
        let mut detection = Detection::new(track.bbox, confidence, self.config.class)
            .with_method(DetectionMethod::Tracking);
        detection.predicted = true;

        match self.config.class {
            ObjectClass::Bat => {
                detection.angle = previous.detection.angle;
            }
            ObjectClass::Ball => {
                detection.center = Some(track.bbox.center());
                detection.radius = Some(ball_radius(track));
            }
            ObjectClass::Person => {}
        }

        TrackedObject {
            track_id: track.track_id,
            detection,
        }
    }
}

fn ball_radius(track: &Track) -> f64 {
    track.bbox.width().max(track.bbox.height()) / 2.0
}
