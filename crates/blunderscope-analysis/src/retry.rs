//! Bounded retry with exponential backoff.

use std::{fmt, thread, time::Duration};

use serde::{Deserialize, Serialize};

/// How often and how patiently to retry a failing call.
///
/// The wait before retry `n` (1-based) is
/// `initial_backoff_ms * backoff_multiplier^(n - 1)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that retries without waiting.
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            backoff_multiplier: 1.0,
        }
    }

    /// Wait after the failed attempt `attempt` (1-based).
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use blunderscope_analysis::retry::RetryPolicy;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.backoff(1), Duration::from_secs(1));
    /// assert_eq!(policy.backoff(3), Duration::from_secs(4));
    /// ```
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let millis = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(millis / 1000.0).unwrap_or(Duration::MAX)
    }

    /// Runs `operation` until it succeeds or the attempts are used up.
    ///
    /// The closure receives the 1-based attempt number. The last error is
    /// returned on exhaustion.
    pub fn run<T, E, F>(&self, what: &str, mut operation: F) -> Result<T, E>
    where
        E: fmt::Display,
        F: FnMut(u32) -> Result<T, E>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation(attempt) {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(what, attempt, "succeeded after retrying");
                    }
                    return Ok(value);
                }
                Err(err) if attempt < max_attempts => {
                    let backoff = self.backoff(attempt);
                    tracing::warn!(what, attempt, %err, ?backoff, "attempt failed, retrying");
                    thread::sleep(backoff);
                    attempt += 1;
                }
                Err(err) => {
                    tracing::error!(what, attempts = attempt, %err, "giving up");
                    return Err(err);
                }
            }
        }
    }
}
