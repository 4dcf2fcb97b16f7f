use crate::config::BlinkConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Random blinking: one short blink every few seconds.
#[derive(Clone, Debug)]
pub struct BlinkScheduler {
    config: BlinkConfig,
    rng: StdRng,
    next_blink_at: Duration,
    blink_until: Duration,
}

impl BlinkScheduler {
    pub fn new(config: BlinkConfig, now: Duration) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut scheduler = Self {
            config,
            rng,
            next_blink_at: now,
            blink_until: Duration::ZERO,
        };
        scheduler.next_blink_at = now + scheduler.next_interval();
        scheduler
    }

    /// Whether the eyes are closed at `now`. Calls must not go back in time.
    pub fn update(&mut self, now: Duration) -> bool {
        if now >= self.next_blink_at {
            self.blink_until = now + Duration::from_millis(self.config.blink_ms);
            self.next_blink_at = now + self.next_interval();
            tracing::trace!(at_ms = now.as_millis() as u64, "blink");
        }
        now < self.blink_until
    }

    pub fn next_blink_at(&self) -> Duration {
        self.next_blink_at
    }

    fn next_interval(&mut self) -> Duration {
        let jitter = self.rng.random_range(0..=self.config.jitter_ms);
        Duration::from_millis(self.config.min_interval_ms + jitter)
    }
}
