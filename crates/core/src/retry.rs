//! Retry policy for remote model calls.
//!
//! Both the embedding gateway and the generator client retry transient
//! failures with capped exponential backoff. The policy itself is plain data
//! so it can live in the configuration file; the sleeping happens in the
//! async callers.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Capped exponential backoff: `min(initial * 2^attempt, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms,
            max_backoff_ms,
        }
    }

    /// A policy that retries without sleeping. Used by tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, 0, 0)
    }

    /// Delay to wait after the given zero-based failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(delay)
    }

    /// Whether another attempt is allowed after `attempt` (zero-based) failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts.max(1)
    }
}
