//! Retry policy for batched store writes.
//!
//! Uses `backon` for exponential backoff. The defaults give three attempts
//! in total with at least 200ms between them.

use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use serde::Deserialize;

/// Configuration for batch-write retries.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first (minimum 1).
    pub max_attempts: usize,
    /// Delay before the first retry.
    pub min_delay_ms: u64,
    /// Cap on any single delay.
    pub max_delay_ms: u64,
    /// Randomize delays to avoid synchronized retries.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay_ms: 200,
            max_delay_ms: 2_000,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn attempts(&self) -> usize {
        self.max_attempts.max(1)
    }

    /// Backoff builder yielding one delay per retry (`attempts() - 1` delays).
    pub fn backoff(&self) -> ExponentialBuilder {
        let min = Duration::from_millis(self.min_delay_ms);
        let builder = ExponentialBuilder::default()
            .with_min_delay(min)
            .with_max_delay(Duration::from_millis(self.max_delay_ms).max(min))
            .with_max_times(self.attempts() - 1);
        if self.jitter {
            builder.with_jitter()
        } else {
            builder
        }
    }

    /// Delays to wait before each attempt; the first attempt waits zero.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        std::iter::once(Duration::ZERO).chain(self.backoff().build())
    }
}
