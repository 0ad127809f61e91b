//! Runs the person, bat and ball trackers together and derives the spatial
//! relationships between them.

use std::collections::VecDeque;

use serde::Serialize;
use swinglab_models::{BoundingBox, Detection, Point, PoseLandmarks, TrackingQuality};

use super::class_trackers::{ClassTracker, TrackedObject};

const MAX_HISTORY: usize = 30;
const QUALITY_WINDOW: usize = 10;

const PERSON_BAT_PROXIMITY_PX: f64 = 150.0;
const BAT_BALL_PROXIMITY_PX: f64 = 50.0;
const CONTACT_LIKELIHOOD_SCALE_PX: f64 = 100.0;

/// Distances between tracked objects in one frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Relationships {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_bat_distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_bat_proximity: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bat_ball_distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bat_ball_proximity: Option<bool>,
    /// 1 at zero distance, 0 beyond 100 px
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_likelihood: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_ball_distance: Option<f64>,
    /// Center displacement since the previous frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_velocity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bat_velocity: Option<f64>,
}

/// Tracker output for one frame.
#[derive(Debug, Clone, Serialize)]
pub struct FrameTracking {
    pub frame: usize,
    pub person: Option<TrackedObject>,
    pub bat: Option<TrackedObject>,
    pub ball: Option<TrackedObject>,
    pub relationships: Relationships,
    pub tracking_quality: TrackingQuality,
}

#[derive(Debug, Clone)]
struct FrameRecord {
    frame: usize,
    person: Option<TrackedObject>,
    bat: Option<TrackedObject>,
    ball: Option<TrackedObject>,
    landmarks: Option<PoseLandmarks>,
}

/// One point of an object's recent path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrajectoryPoint {
    pub frame: usize,
    pub center: Point,
    pub bbox: BoundingBox,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,
}

/// Recent paths of each tracked object.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Trajectories {
    pub person: Vec<TrajectoryPoint>,
    pub bat: Vec<TrajectoryPoint>,
    pub ball: Vec<TrajectoryPoint>,
}

/// Coordinates per-class trackers across a video.
pub struct TrackingCoordinator {
    person: ClassTracker,
    bat: ClassTracker,
    ball: ClassTracker,
    history: VecDeque<FrameRecord>,
}

impl TrackingCoordinator {
    pub fn new() -> Self {
        Self {
            person: ClassTracker::person(),
            bat: ClassTracker::bat(),
            ball: ClassTracker::ball(),
            history: VecDeque::with_capacity(MAX_HISTORY),
        }
    }

    /// Feed one frame's detections to all trackers.
    pub fn update_frame(
        &mut self,
        person: Option<&Detection>,
        bat: Option<&Detection>,
        ball: Option<&Detection>,
        landmarks: Option<&PoseLandmarks>,
        frame_idx: usize,
    ) -> FrameTracking {
        let person = self.person.update(person);
        let bat = self.bat.update(bat);
        let ball = self.ball.update(ball);

        self.history.push_back(FrameRecord {
            frame: frame_idx,
            person: person.clone(),
            bat: bat.clone(),
            ball: ball.clone(),
            landmarks: landmarks.cloned(),
        });
        if self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }

        let relationships = self.relationships(person.as_ref(), bat.as_ref(), ball.as_ref());

        FrameTracking {
            frame: frame_idx,
            person,
            bat,
            ball,
            relationships,
            tracking_quality: self.tracking_quality(),
        }
    }

    fn relationships(
        &self,
        person: Option<&TrackedObject>,
        bat: Option<&TrackedObject>,
        ball: Option<&TrackedObject>,
    ) -> Relationships {
        let mut rel = Relationships::default();

        if let (Some(p), Some(b)) = (person, bat) {
            let d = p.detection.bbox.center().distance(&b.detection.bbox.center());
            rel.person_bat_distance = Some(d);
            rel.person_bat_proximity = Some(d < PERSON_BAT_PROXIMITY_PX);
        }

        if let (Some(b), Some(ball)) = (bat, ball) {
            let d = b.detection.bbox.center().distance(&ball.center());
            rel.bat_ball_distance = Some(d);
            rel.bat_ball_proximity = Some(d < BAT_BALL_PROXIMITY_PX);
            rel.contact_likelihood = Some((1.0 - d / CONTACT_LIKELIHOOD_SCALE_PX).max(0.0));
        }

        if let (Some(p), Some(ball)) = (person, ball) {
            rel.person_ball_distance = Some(p.detection.bbox.center().distance(&ball.center()));
        }

        if self.history.len() > 1 {
            if let Some(prev) = self.history.get(self.history.len() - 2) {
                rel.person_velocity = displacement(prev.person.as_ref(), person);
                rel.bat_velocity = displacement(prev.bat.as_ref(), bat);
            }
        }

        rel
    }

    /// Detection ratios over the last 10 frames.
    pub fn tracking_quality(&self) -> TrackingQuality {
        if self.history.is_empty() {
            return TrackingQuality::default();
        }

        let start = self.history.len().saturating_sub(QUALITY_WINDOW);
        let recent: Vec<&FrameRecord> = self.history.iter().skip(start).collect();
        let total = recent.len() as f64;
        let ratio = |f: fn(&FrameRecord) -> bool| recent.iter().filter(|r| f(r)).count() as f64 / total;

        let person = ratio(|r| r.person.is_some());
        let bat = ratio(|r| r.bat.is_some());
        let ball = ratio(|r| r.ball.is_some());

        let mut issues = Vec::new();
        if person < 0.7 {
            issues.push("Person tracking inconsistent".to_string());
        }
        if bat < 0.5 {
            issues.push("Bat tracking inconsistent".to_string());
        }
        if ball < 0.3 {
            issues.push("Ball tracking inconsistent (expected - ball moves fast)".to_string());
        }

        TrackingQuality {
            score: person * 0.4 + bat * 0.4 + ball * 0.2,
            person_tracking_ratio: person,
            bat_tracking_ratio: bat,
            ball_tracking_ratio: ball,
            issues,
        }
    }

    /// Paths over the last `num_frames` frames.
    pub fn get_trajectories(&self, num_frames: usize) -> Trajectories {
        let start = self.history.len().saturating_sub(num_frames);
        let mut out = Trajectories::default();

        for record in self.history.iter().skip(start) {
            if let Some(p) = &record.person {
                out.person.push(TrajectoryPoint {
                    frame: record.frame,
                    center: p.detection.bbox.center(),
                    bbox: p.detection.bbox,
                    angle: None,
                });
            }
            if let Some(b) = &record.bat {
                out.bat.push(TrajectoryPoint {
                    frame: record.frame,
                    center: b.detection.bbox.center(),
                    bbox: b.detection.bbox,
                    angle: b.detection.angle,
                });
            }
            if let Some(ball) = &record.ball {
                out.ball.push(TrajectoryPoint {
                    frame: record.frame,
                    center: ball.center(),
                    bbox: ball.detection.bbox,
                    angle: None,
                });
            }
        }

        out
    }

    /// Pose landmarks of the most recent frame that had any.
    pub fn last_landmarks(&self) -> Option<&PoseLandmarks> {
        self.history.iter().rev().find_map(|r| r.landmarks.as_ref())
    }

    /// Reset every tracker and drop the history.
    pub fn reset(&mut self) {
        self.person.reset();
        self.bat.reset();
        self.ball.reset();
        self.history.clear();
    }
}

impl Default for TrackingCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

fn displacement(prev: Option<&TrackedObject>, curr: Option<&TrackedObject>) -> Option<f64> {
    let prev = prev?.detection.bbox.center();
    let curr = curr?.detection.bbox.center();
    Some(prev.distance(&curr))
}
