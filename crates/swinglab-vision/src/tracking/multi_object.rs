//! Multi-object tracker: Kalman prediction plus greedy IoU association.
//!
//! # Usage
//! ```rust
//! use swinglab_vision::tracking::{MultiObjectTracker, TrackerConfig};
//!
//! let mut tracker = MultiObjectTracker::new(TrackerConfig::default());
//! let confirmed = tracker.update(&[]);
//! assert!(confirmed.is_empty());
//! ```

use serde::Serialize;
use swinglab_models::{BoundingBox, Detection};
use tracing::{debug, trace};

use super::kalman::BoxKalmanFilter;

/// Configuration for track lifecycle and association.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Frames without a match before a track is dropped
    pub max_age: u32,
    /// Matches needed before a track is reported
    pub min_hits: u32,
    /// Pairs must exceed this IoU to be associated
    pub iou_threshold: f64,
    /// Predict with the Kalman filter; otherwise boxes hold still between matches
    pub use_kalman: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_age: 30,
            min_hits: 3,
            iou_threshold: 0.3,
            use_kalman: true,
        }
    }
}

/// Lifecycle state of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackState {
    Tentative,
    Confirmed,
    Deleted,
}

/// One tracked object.
#[derive(Debug, Clone)]
pub struct Track {
    /// Unique, monotonically assigned identifier
    pub track_id: u32,
    pub bbox: BoundingBox,
    pub confidence: f64,
    pub state: TrackState,
    /// Frames since creation
    pub age: u32,
    pub time_since_update: u32,
    /// Total matched detections
    pub hits: u32,
    /// Consecutive matched frames
    pub hit_streak: u32,
    /// Most recent detection matched to this track
    pub last_detection: Detection,
    kalman: Option<BoxKalmanFilter>,
}

impl Track {
    fn new(track_id: u32, detection: &Detection, use_kalman: bool) -> Self {
        Self {
            track_id,
            bbox: detection.bbox,
            confidence: detection.confidence,
            state: TrackState::Tentative,
            age: 0,
            time_since_update: 0,
            hits: 0,
            hit_streak: 0,
            last_detection: detection.clone(),
            kalman: use_kalman.then(|| BoxKalmanFilter::new(&detection.bbox)),
        }
    }

    fn predict(&mut self) {
        if let Some(kf) = self.kalman.as_mut() {
            self.bbox = kf.predict();
        }
        self.age += 1;
        self.time_since_update += 1;
    }

    fn correct(&mut self, detection: &Detection, min_hits: u32) {
        self.bbox = match self.kalman.as_mut() {
            Some(kf) => kf.correct(&detection.bbox),
            None => detection.bbox,
        };
        self.confidence = detection.confidence;
        self.last_detection = detection.clone();
        self.time_since_update = 0;
        self.hits += 1;
        self.hit_streak += 1;

        if self.state == TrackState::Tentative && self.hits >= min_hits {
            self.state = TrackState::Confirmed;
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == TrackState::Confirmed
    }
}

/// Tracker statistics.
#[derive(Debug, Clone, Default)]
pub struct TrackerStats {
    pub active_tracks: usize,
    pub confirmed_tracks: usize,
    pub total_tracks_created: u64,
    pub total_tracks_deleted: u64,
    pub frame_count: u64,
}

/// Tracks many objects of one class across frames.
pub struct MultiObjectTracker {
    config: TrackerConfig,
    tracks: Vec<Track>,
    next_id: u32,
    frame_count: u64,
    total_tracks_created: u64,
    total_tracks_deleted: u64,
}

impl MultiObjectTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_id: 1,
            frame_count: 0,
            total_tracks_created: 0,
            total_tracks_deleted: 0,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Advance one frame with this frame's detections.
    ///
    /// Returns the confirmed tracks after association, creation and ageing.
    pub fn update(&mut self, detections: &[Detection]) -> Vec<Track> {
        self.frame_count += 1;

        for track in &mut self.tracks {
            track.predict();
        }

        let (matches, unmatched_dets) = self.associate(detections);

        for (det_idx, track_idx) in matches {
            self.tracks[track_idx].correct(&detections[det_idx], self.config.min_hits);
        }
        for track in self.tracks.iter_mut().filter(|t| t.time_since_update > 0) {
            track.hit_streak = 0;
        }

        for det_idx in unmatched_dets {
            let track = Track::new(self.next_id, &detections[det_idx], self.config.use_kalman);
            trace!(track_id = track.track_id, "Created track");
            self.tracks.push(track);
            self.next_id += 1;
            self.total_tracks_created += 1;
        }

        let before = self.tracks.len();
        let max_age = self.config.max_age;
        self.tracks.retain(|t| t.time_since_update < max_age);
        let removed = before - self.tracks.len();
        if removed > 0 {
            self.total_tracks_deleted += removed as u64;
            debug!(removed, frame = self.frame_count, "Dropped stale tracks");
        }

        self.tracks
            .iter()
            .filter(|t| t.is_confirmed())
            .cloned()
            .collect()
    }

    /// Get track by ID.
    pub fn get_track_by_id(&self, track_id: u32) -> Option<&Track> {
        self.tracks.iter().find(|t| t.track_id == track_id)
    }

    /// Iterate over all live tracks, confirmed or not.
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    /// Clear all tracks and restart ids at 1.
    pub fn reset(&mut self) {
        debug!(tracks_cleared = self.tracks.len(), "Tracker reset");
        self.tracks.clear();
        self.frame_count = 0;
        self.next_id = 1;
    }

    pub fn stats(&self) -> TrackerStats {
        TrackerStats {
            active_tracks: self.tracks.len(),
            confirmed_tracks: self.tracks.iter().filter(|t| t.is_confirmed()).count(),
            total_tracks_created: self.total_tracks_created,
            total_tracks_deleted: self.total_tracks_deleted,
            frame_count: self.frame_count,
        }
    }

    /// Greedy IoU association.
    ///
    /// Returns `(detection, track)` matches and unmatched detection indices.
    fn associate(&self, detections: &[Detection]) -> (Vec<(usize, usize)>, Vec<usize>) {
        if self.tracks.is_empty() || detections.is_empty() {
            return (Vec::new(), (0..detections.len()).collect());
        }

        let mut candidates: Vec<(usize, usize, f64)> = Vec::new();
        for (d, det) in detections.iter().enumerate() {
            for (t, track) in self.tracks.iter().enumerate() {
                let iou = det.bbox.iou(&track.bbox);
                if iou > self.config.iou_threshold {
                    candidates.push((d, t, iou));
                }
            }
        }
        candidates.sort_by(|a, b| b.2.total_cmp(&a.2));

        let mut matched_dets = vec![false; detections.len()];
        let mut matched_tracks = vec![false; self.tracks.len()];
        let mut matches = Vec::new();
        for (d, t, _iou) in candidates {
            if !matched_dets[d] && !matched_tracks[t] {
                matches.push((d, t));
                matched_dets[d] = true;
                matched_tracks[t] = true;
            }
        }

        let unmatched = (0..detections.len()).filter(|&d| !matched_dets[d]).collect();
        (matches, unmatched)
    }
}

impl Default for MultiObjectTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}
