//! Bat-ball contact detection.
//!
//! The contact frame is the peak of bat angular velocity, confirmed by how
//! close the ball is to the bat and whether the ball speeds up afterwards.

use serde::Serialize;
use swinglab_models::{BallObservation, Point};
use tracing::debug;

use crate::signal::{angular_velocity, find_peaks, mean, PeakOptions};

const MIN_ANGLES: usize = 3;
const PEAK_DISTANCE: usize = 5;
const PEAK_HEIGHT_RATIO: f64 = 0.5;
/// Angular velocity that earns the full velocity weight
const FULL_SCORE_ANGULAR_VELOCITY: f64 = 50.0;
const MIN_CONFIDENCE: f64 = 0.3;

/// A detected contact frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactResult {
    pub frame: usize,
    pub confidence: f64,
    /// Degrees per second at the contact frame
    pub angular_velocity: f64,
    /// Bat-ball distance in pixels, when both were visible
    pub proximity: Option<f64>,
    /// Post-minus-pre ball velocity, when large enough to matter
    pub velocity_change: Option<f64>,
    /// Seconds from the start of the analyzed frames
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy)]
struct Proximity {
    distance: f64,
    within_threshold: bool,
}

/// Finds the bat-ball contact frame.
#[derive(Debug, Clone)]
pub struct ContactDetector {
    /// Maximum bat-ball distance in pixels that counts as close
    pub proximity_threshold: f64,
    /// Minimum ball velocity change in pixels per frame
    pub velocity_threshold: f64,
}

impl Default for ContactDetector {
    fn default() -> Self {
        Self {
            proximity_threshold: 50.0,
            velocity_threshold: 5.0,
        }
    }
}

impl ContactDetector {
    pub fn new(proximity_threshold: f64, velocity_threshold: f64) -> Self {
        Self {
            proximity_threshold,
            velocity_threshold,
        }
    }

    /// Detect the contact frame.
    ///
    /// Missing bat angles count as 0°. Returns `None` with fewer than three
    /// frames, no angular motion, or a confidence of 0.3 or less.
    pub fn detect_contact(
        &self,
        bat_angles: &[Option<f64>],
        bat_positions: &[Option<Point>],
        ball_positions: &[Option<BallObservation>],
        fps: f64,
    ) -> Option<ContactResult> {
        if bat_angles.len() < MIN_ANGLES {
            return None;
        }

        let angles: Vec<f64> = bat_angles.iter().map(|a| a.unwrap_or(0.0)).collect();
        let dt = if fps > 0.0 { 1.0 / fps } else { 1.0 };
        let velocities = angular_velocity(&angles, dt);

        let peak = find_peak(&velocities)?;
        let proximity = self.check_proximity(peak, bat_positions, ball_positions);
        let velocity_change = self.check_velocity_change(peak, ball_positions);
        let av = velocities[peak];
        let confidence = self.confidence(av, proximity, velocity_change);

        debug!(frame = peak, angular_velocity = av, confidence, "Contact candidate");

        if confidence <= MIN_CONFIDENCE {
            return None;
        }

        Some(ContactResult {
            frame: peak,
            confidence,
            angular_velocity: av,
            proximity: proximity.map(|p| p.distance),
            velocity_change,
            timestamp: if fps > 0.0 { peak as f64 / fps } else { 0.0 },
        })
    }

    fn check_proximity(
        &self,
        frame: usize,
        bat_positions: &[Option<Point>],
        ball_positions: &[Option<BallObservation>],
    ) -> Option<Proximity> {
        let bat = (*bat_positions.get(frame)?)?;
        let ball = ball_positions.get(frame)?.as_ref()?;
        let center = ball.detection.center?;
        let distance = bat.distance(&center);
        Some(Proximity {
            distance,
            within_threshold: distance <= self.proximity_threshold,
        })
    }

    fn check_velocity_change(
        &self,
        frame: usize,
        ball_positions: &[Option<BallObservation>],
    ) -> Option<f64> {
        let len = ball_positions.len();
        if frame + 1 >= len {
            return None;
        }

        let velocities = |range: std::ops::Range<usize>| -> Vec<f64> {
            ball_positions[range]
                .iter()
                .flatten()
                .map(|b| b.velocity)
                .collect()
        };

        let before = mean(&velocities(frame.saturating_sub(3)..frame)).unwrap_or(0.0);
        let after = mean(&velocities(frame + 1..(frame + 4).min(len))).unwrap_or(0.0);
        let change = after - before;

        (change.abs() >= self.velocity_threshold).then_some(change)
    }

    fn confidence(
        &self,
        angular_velocity: f64,
        proximity: Option<Proximity>,
        velocity_change: Option<f64>,
    ) -> f64 {
        let mut confidence = 0.0;

        if angular_velocity > 0.0 {
            confidence += (angular_velocity / FULL_SCORE_ANGULAR_VELOCITY).min(1.0) * 0.4;
        }

        if let Some(p) = proximity {
            if p.within_threshold {
                confidence += (1.0 - (p.distance / self.proximity_threshold).min(1.0)) * 0.4;
            } else {
                confidence += 0.1;
            }
        }

        if let Some(change) = velocity_change {
            if change > 0.0 {
                confidence += (change / (self.velocity_threshold * 2.0)).min(1.0) * 0.2;
            }
        }

        confidence.min(1.0)
    }
}

/// Highest peak at least half the maximum, spaced 5 frames apart.
///
/// Falls back to the global maximum when no interior peak exists.
fn find_peak(velocities: &[f64]) -> Option<usize> {
    let max = velocities.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return None;
    }

    let peaks = find_peaks(
        velocities,
        PeakOptions {
            height: Some(max * PEAK_HEIGHT_RATIO),
            distance: Some(PEAK_DISTANCE),
        },
    );

    if let Some(best) = peaks
        .into_iter()
        .reduce(|a, b| if velocities[b] > velocities[a] { b } else { a })
    {
        return Some(best);
    }

    // First index of the maximum.
    let idx = velocities.iter().position(|&v| v == max)?;
    (velocities[idx] > 0.0).then_some(idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use swinglab_models::{BoundingBox, Detection, ObjectClass};

    /// Angles whose frame-to-frame change rises to a single peak at `peak`.
    fn swing_angles(n: usize, peak: usize) -> Vec<Option<f64>> {
        let mut angle = 0.0;
        let mut out = vec![Some(angle)];
        for i in 1..n {
            let step = 10.0 - (i as f64 - peak as f64).abs();
            angle += step.max(0.5);
            out.push(Some(angle));
        }
        out
    }

    fn ball_at(x: f64, y: f64, velocity: f64) -> Option<BallObservation> {
        let mut d = Detection::new(
            BoundingBox::from_center(x, y, 10.0, 10.0),
            0.7,
            ObjectClass::Ball,
        );
        d.center = Some(Point::new(x, y));
        Some(BallObservation {
            detection: d,
            velocity,
            tracked: true,
        })
    }

    #[test]
    fn test_too_few_angles() {
        let detector = ContactDetector::default();
        assert!(detector
            .detect_contact(&[Some(1.0), Some(2.0)], &[], &[], 30.0)
            .is_none());
    }

    #[test]
    fn test_single_clear_peak() {
        let detector = ContactDetector::default();
        let angles = swing_angles(20, 10);
        let result = detector.detect_contact(&angles, &[], &[], 30.0).unwrap();

        assert_eq!(result.frame, 10);
        assert!(result.confidence > 0.3);
        assert!((result.angular_velocity - 300.0).abs() < 1e-9);
        assert!((result.timestamp - 10.0 / 30.0).abs() < 1e-9);
        assert!(result.proximity.is_none());
    }

    #[test]
    fn test_no_motion_returns_none() {
        let detector = ContactDetector::default();
        let angles = vec![Some(30.0); 10];
        assert!(detector.detect_contact(&angles, &[], &[], 30.0).is_none());
    }

    #[test]
    fn test_missing_angles_count_as_zero() {
        let detector = ContactDetector::default();
        let mut angles = vec![Some(0.0); 10];
        angles[5] = Some(40.0);
        angles[6] = None;
        let result = detector.detect_contact(&angles, &[], &[], 1.0);
        // 0 -> 40 and 40 -> 0 tie; the flat top reports its left half.
        assert_eq!(result.unwrap().frame, 5);
    }

    #[test]
    fn test_proximity_and_velocity_raise_confidence() {
        let detector = ContactDetector::default();
        // Slow swing: 4 deg/frame at 1 fps stays below the 0.3 acceptance bar on its own.
        let mut angles = vec![Some(0.0); 12];
        let mut a = 0.0;
        for (i, slot) in angles.iter_mut().enumerate() {
            a += if i == 6 { 12.0 } else { 1.0 };
            *slot = Some(a);
        }
        assert!(detector.detect_contact(&angles, &[], &[], 1.0).is_none());

        let bat_positions = vec![Some(Point::new(100.0, 100.0)); 12];
        let mut balls: Vec<Option<BallObservation>> = vec![None; 12];
        for (i, slot) in balls.iter_mut().enumerate() {
            let v = if i > 6 { 20.0 } else { 2.0 };
            *slot = ball_at(105.0, 100.0, v);
        }

        let result = detector
            .detect_contact(&angles, &bat_positions, &balls, 1.0)
            .unwrap();
        assert_eq!(result.frame, 6);
        assert_eq!(result.proximity, Some(5.0));
        assert_eq!(result.velocity_change, Some(18.0));
        // 0.4 * 12/50 + 0.4 * 0.9 + 0.2 * 1.0
        assert!((result.confidence - (0.096 + 0.36 + 0.2)).abs() < 1e-9);
    }

    #[test]
    fn test_small_velocity_change_ignored() {
        let detector = ContactDetector::default();
        let balls: Vec<Option<BallObservation>> =
            (0..10).map(|_| ball_at(0.0, 0.0, 3.0)).collect();
        assert!(detector.check_velocity_change(4, &balls).is_none());
        assert!(detector.check_velocity_change(9, &balls).is_none());
    }
}
