//! Capped exponential backoff
//!
//! Delay schedule for reconnect loops: grows by a multiplier after each
//! failure, capped at a maximum, reset on success. Retries are unbounded;
//! giving up is the caller's decision (fatal errors only).

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// First delay after a failure
    pub initial_delay: Duration,
    /// Multiplier applied after each failed attempt
    pub multiplier: f64,
    /// Upper bound on the delay
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

/// Mutable backoff state for one reconnect loop
#[derive(Debug)]
pub struct Backoff {
    config: BackoffConfig,
    next: Duration,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        let next = config.initial_delay;
        Self { config, next }
    }

    /// Delay to sleep before the next attempt; advances the schedule
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = Duration::from_secs_f64(
            (self.next.as_secs_f64() * self.config.multiplier)
                .min(self.config.max_delay.as_secs_f64()),
        );
        delay
    }

    /// Return to the initial delay after a successful attempt
    pub fn reset(&mut self) {
        self.next = self.config.initial_delay;
    }
}

// ── Tests ──────────────────────────────────────────────────────
