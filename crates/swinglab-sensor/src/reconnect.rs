//! Delay between reconnect attempts.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    /// Growth per attempt. 1.0 keeps the delay fixed.
    pub multiplier: f64,
    pub max_delay: Duration,
    /// `None` retries forever
    pub max_retries: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(3),
            multiplier: 1.0,
            max_delay: Duration::from_secs(60),
            max_retries: None,
        }
    }
}

impl ReconnectPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            base_delay: delay,
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(i32::MAX as u32) as i32);
        let secs = self.base_delay.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay.max(self.base_delay);
        }
        Duration::from_secs_f64(secs)
    }

    pub fn allows(&self, attempt: u32) -> bool {
        self.max_retries.map_or(true, |max| attempt < max)
    }
}
