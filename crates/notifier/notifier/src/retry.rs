//! Retry strategies for notification delivery.
//!
//! These are provider-agnostic: a strategy only knows how many attempts are
//! allowed and how long to wait between them. Which failures are worth
//! retrying is decided by [`is_retryable_status`] and the transport error
//! classification in the client.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::duration_ms;

/// Trait for retry strategies.
pub trait RetryStrategy: Send + Sync {
    /// Returns the delay to wait after attempt number `attempt` (1-based)
    /// failed, or `None` if no further attempt is allowed.
    fn next_delay(&self, attempt: u32) -> Option<Duration>;

    /// Returns the maximum number of attempts, including the first one.
    fn max_attempts(&self) -> u32;

    /// Checks if another attempt may follow attempt number `attempt`.
    fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts()
    }
}

/// Returns true if a response with this status is worth retrying.
///
/// Server errors and `429 Too Many Requests` are transient; every other
/// non-2xx status is final.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || status >= 500
}

/// Exponential backoff retry strategy.
///
/// Delay after attempt `n` is `base * 2^(n-1)`, capped at `max_delay`,
/// plus up to `jitter * delay` of random spread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExponentialBackoff {
    /// Base delay.
    #[serde(with = "duration_ms", rename = "base_ms")]
    pub base: Duration,
    /// Maximum delay cap.
    #[serde(with = "duration_ms", rename = "max_delay_ms")]
    pub max_delay: Duration,
    /// Maximum number of attempts.
    pub max_attempts: u32,
    /// Jitter factor (0.0 to 1.0).
    pub jitter: f64,
}

impl ExponentialBackoff {
    /// Creates a new exponential backoff strategy: 5 attempts, 1s base,
    /// 30s cap.
    pub fn new() -> Self {
        Self {
            base: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
            jitter: 0.1,
        }
    }

    /// Sets the base delay.
    pub fn base(mut self, base: Duration) -> Self {
        self.base = base;
        self
    }

    /// Sets the maximum delay.
    pub fn max_delay(mut self, max: Duration) -> Self {
        self.max_delay = max;
        self
    }

    /// Sets the maximum attempts.
    pub fn max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }

    /// Sets the jitter factor.
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if !self.should_retry(attempt) {
            return None;
        }

        let exponent = attempt.saturating_sub(1);
        let multiplier = 2_u32.checked_pow(exponent).unwrap_or(u32::MAX);
        let delay = std::cmp::min(self.base.saturating_mul(multiplier), self.max_delay);

        if self.jitter > 0.0 {
            let jitter_range = (delay.as_millis() as f64 * self.jitter) as u64;
            let jitter_offset = if jitter_range > 0 {
                rand::rng().random_range(0..=jitter_range)
            } else {
                0
            };
            Some(delay + Duration::from_millis(jitter_offset))
        } else {
            Some(delay)
        }
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Fixed delay retry strategy.
///
/// Always uses the same delay between attempts.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    /// Fixed delay between attempts.
    pub delay: Duration,
    /// Maximum number of attempts.
    pub max_attempts: u32,
}

impl FixedDelay {
    /// Creates a new fixed delay strategy.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: 3,
        }
    }

    /// Sets the maximum attempts.
    pub fn max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }
}

impl RetryStrategy for FixedDelay {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        self.should_retry(attempt).then_some(self.delay)
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// No retry strategy - a single attempt.
#[derive(Debug, Clone, Default)]
pub struct NoRetry;

impl RetryStrategy for NoRetry {
    fn next_delay(&self, _attempt: u32) -> Option<Duration> {
        None
    }

    fn max_attempts(&self) -> u32 {
        1
    }
}
