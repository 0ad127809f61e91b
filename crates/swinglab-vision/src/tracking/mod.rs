//! Object tracking across frames.

pub mod class_trackers;
pub mod coordinator;
pub mod kalman;
pub mod multi_object;

pub use class_trackers::{ClassTracker, ClassTrackerConfig, TrackedObject};
pub use coordinator::{FrameTracking, Relationships, TrackingCoordinator, Trajectories, TrajectoryPoint};
pub use kalman::BoxKalmanFilter;
pub use multi_object::{MultiObjectTracker, Track, TrackState, TrackerConfig, TrackerStats};
