//! Bounded exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

use crate::config::MonitorConfig;

/// Calculate exponential backoff delay with jitter.
///
/// Attempt 1 waits `base_ms`, each further attempt doubles, capped at `max_ms`,
/// plus up to 10% jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 2u64.saturating_pow(attempt - 1);
    let capped = base_ms.saturating_mul(factor).min(max_ms);

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}

/// Attempt counter for reconnect loops with a hard attempt limit.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    base_ms: u64,
    max_ms: u64,
    max_attempts: u32,
    attempt: u32,
}

impl ReconnectBackoff {
    pub fn new(base_ms: u64, max_ms: u64, max_attempts: u32) -> Self {
        Self {
            base_ms,
            max_ms,
            max_attempts,
            attempt: 0,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(
            config.reconnect_base_delay_ms,
            config.reconnect_max_delay_ms,
            config.max_reconnect_attempts,
        )
    }

    /// Register a failed attempt and return the delay before the next one,
    /// or `None` once the attempt budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        self.attempt += 1;
        Some(calculate_backoff(self.attempt, self.base_ms, self.max_ms))
    }

    /// Failed attempts since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Forget previous failures after a healthy period.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
