//! Picking the characteristic that carries live gyroscope data.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};
use tracing::{debug, info};

use crate::gatt::CANDIDATE_CHARACTERISTICS;
use crate::link::{poke, MotionLink};
use crate::payload::parse_sample;

/// Channels with fewer samples than this are ignored.
pub const MIN_CHANNEL_SAMPLES: usize = 5;

/// Unbiased sample variance. 0 for fewer than two values.
pub fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mu = values.iter().sum::<f64>() / n;
    values.iter().map(|w| (w - mu).powi(2)).sum::<f64>() / (n - 1.0)
}

/// The channel whose angular speed varied the most during warmup.
pub fn pick_channel(seen: &BTreeMap<String, Vec<f64>>) -> Option<String> {
    let mut best: Option<(&String, f64)> = None;
    for (channel, omegas) in seen {
        if omegas.len() < MIN_CHANNEL_SAMPLES {
            continue;
        }
        let var = sample_variance(omegas);
        if best.map_or(true, |(_, b)| var > b) {
            best = Some((channel, var));
        }
    }
    best.map(|(c, _)| c.clone())
}

/// Subscribe to every candidate, listen for `warmup`, and keep only the
/// liveliest channel.
///
/// Returns every subscribed channel when none produced enough samples.
pub async fn auto_pick_channels(
    link: &mut dyn MotionLink,
    warmup: Duration,
    poke_gap: Duration,
) -> Vec<String> {
    let mut subscribed = Vec::new();
    for characteristic in CANDIDATE_CHARACTERISTICS {
        match link.subscribe(characteristic).await {
            Ok(()) => subscribed.push(characteristic.to_string()),
            Err(e) => debug!(characteristic, error = %e, "Subscribe failed"),
        }
    }

    if !subscribed.is_empty() {
        poke(link, &subscribed, poke_gap, "auto-pick").await;
    }

    let mut seen: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let deadline = Instant::now() + warmup;
    while Instant::now() < deadline {
        let Ok(Ok(Some(n))) = timeout_at(deadline, link.next_notification()).await else {
            break;
        };
        if let Some(sample) = parse_sample(&n.data) {
            seen.entry(n.characteristic).or_default().push(sample.omega());
        }
    }

    let Some(best) = pick_channel(&seen) else {
        debug!(channels = subscribed.len(), "No channel stood out, keeping all");
        return subscribed;
    };

    for characteristic in subscribed.iter().filter(|c| **c != best) {
        let _ = link.unsubscribe(characteristic).await;
    }
    info!(channel = %best, "Picked data channel");
    vec![best]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::fake::{notification, spin_payload, FakeLink};

    #[test]
    fn test_pick_highest_variance() {
        let mut seen = BTreeMap::new();
        seen.insert("a".to_string(), vec![10.0; 8]);
        seen.insert("b".to_string(), vec![10.0, 50.0, 5.0, 80.0, 20.0]);
        seen.insert("c".to_string(), vec![0.0, 500.0, 0.0]);
        assert_eq!(pick_channel(&seen), Some("b".to_string()));
    }

    #[test]
    fn test_pick_needs_enough_samples() {
        let mut seen = BTreeMap::new();
        seen.insert("a".to_string(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(pick_channel(&seen), None);
        assert_eq!(sample_variance(&[]), 0.0);
        assert!((sample_variance(&[1.0, 3.0]) - 2.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_auto_pick_unsubscribes_quiet_channels() {
        let [a, b, c] = CANDIDATE_CHARACTERISTICS;
        let mut script = Vec::new();
        for i in 0..6 {
            script.push(notification(a, spin_payload(5.0), i as f64));
            script.push(notification(b, spin_payload(if i % 2 == 0 { 5.0 } else { 150.0 }), i as f64));
        }
        script.push(notification(c, spin_payload(200.0), 7.0));

        let mut link = FakeLink::with_script(script);
        let picked = auto_pick_channels(&mut link, Duration::from_millis(200), Duration::ZERO).await;

        assert_eq!(picked, vec![b.to_string()]);
        assert_eq!(link.subscribed, vec![b.to_string()]);
    }

    #[tokio::test]
    async fn test_auto_pick_keeps_all_without_data() {
        let mut link = FakeLink::default();
        let picked = auto_pick_channels(&mut link, Duration::from_millis(10), Duration::ZERO).await;
        assert_eq!(picked.len(), 3);
        assert_eq!(link.subscribed.len(), 3);
    }
}
