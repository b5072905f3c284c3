//! Reconnect backoff schedule (spec.md §4.2: "reconnects with exponential
//! backoff starting at 1s and capped at 60s... reports aggregate reconnect
//! attempts rather than per-attempt log lines").
//!
//! Unlike the teacher's `ReconnectConfig` (bounded at `max_retries`, then a
//! permanent `ReconnectFailed` state), the page-bridge's socket to the
//! broker is unbounded: a browser extension has nowhere else to go, so it
//! keeps retrying for the life of the process.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(60),
        }
    }
}

/// Tracks the current delay and the running attempt count across an
/// unbounded reconnect loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    config: BackoffConfig,
    current: Duration,
    attempts: u32,
}

impl Backoff {
    #[must_use]
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            current: config.initial,
            config,
            attempts: 0,
        }
    }

    /// The delay to wait before the next attempt, then advance the
    /// schedule (doubling, capped at `max`) and bump the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.config.max);
        self.attempts += 1;
        delay
    }

    /// Reset to the initial delay after a successful connection, keeping
    /// the lifetime attempt count (used only for aggregate reporting).
    pub fn reset(&mut self) {
        self.current = self.config.initial;
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_and_caps_at_max() {
        let mut backoff = Backoff::new(BackoffConfig {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(8),
        });
        let delays: Vec<Duration> = (0..5).map(|_| backoff.next_delay()).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
                Duration::from_secs(8),
            ]
        );
        assert_eq!(backoff.attempts(), 5);
    }

    #[test]
    fn reset_restores_initial_delay_but_keeps_attempt_count() {
        let mut backoff = Backoff::new(BackoffConfig::default());
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.attempts(), 3);
    }
}
