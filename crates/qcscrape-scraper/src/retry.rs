//! Bounded retry with exponential backoff for the browser-side procedures
//! that commonly fail on the first try (location picker, container lookup).
//!
//! The policy is plain data. Callers own the loop because each attempt needs
//! a fresh mutable borrow of the browser driver:
//!
//! ```ignore
//! let mut attempt = 1;
//! loop {
//!     let err = match try_once(driver).await {
//!         Ok(v) => return Ok(v),
//!         Err(e) => e,
//!     };
//!     if !policy.backoff("container-find", attempt, &err).await {
//!         return Err(err);
//!     }
//!     attempt += 1;
//! }
//! ```

use std::fmt::Display;
use std::time::Duration;

use qcscrape_core::AppConfig;

/// How many times to try an operation and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. `0` is treated as `1`.
    pub max_attempts: u32,
    /// Delay before the n-th retry is `backoff_base_ms * 2^(n-1)`.
    pub backoff_base_ms: u64,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, backoff_base_ms: u64) -> Self {
        Self {
            max_attempts,
            backoff_base_ms,
        }
    }

    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.retry_max_attempts, config.retry_backoff_base_ms)
    }

    /// A single attempt with no waiting.
    #[must_use]
    pub fn once() -> Self {
        Self::new(1, 0)
    }

    #[must_use]
    pub fn effective_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay before retry number `retry` (1-based).
    ///
    /// | Retry | Delay (`backoff_base_ms = 1000`) |
    /// |-------|----------------------------------|
    /// | 1 | 1 s |
    /// | 2 | 2 s |
    /// | 3 | 4 s |
    #[must_use]
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(32);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }

    /// Handles the failure of attempt `attempt` (1-based).
    ///
    /// Returns `false` once the attempts are used up. Otherwise logs the
    /// failure, sleeps for the backoff delay and returns `true`.
    pub async fn backoff(&self, what: &str, attempt: u32, err: &dyn Display) -> bool {
        let max_attempts = self.effective_attempts();
        if attempt >= max_attempts {
            return false;
        }

        let delay = self.delay_before_retry(attempt);
        tracing::warn!(
            what,
            attempt,
            max_attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "attempt failed, retrying after backoff"
        );
        tokio::time::sleep(delay).await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_per_retry() {
        let policy = RetryPolicy::new(4, 100);
        assert_eq!(policy.delay_before_retry(1), Duration::from_millis(100));
        assert_eq!(policy.delay_before_retry(2), Duration::from_millis(200));
        assert_eq!(policy.delay_before_retry(3), Duration::from_millis(400));
    }

    #[test]
    fn delay_saturates_on_extreme_values() {
        let policy = RetryPolicy::new(100, u64::MAX);
        assert_eq!(policy.delay_before_retry(60), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn zero_attempts_means_one() {
        assert_eq!(RetryPolicy::new(0, 0).effective_attempts(), 1);
        assert_eq!(RetryPolicy::once().effective_attempts(), 1);
    }

    #[tokio::test]
    async fn backoff_allows_retries_until_attempts_exhausted() {
        let policy = RetryPolicy::new(3, 0);
        assert!(policy.backoff("test", 1, &"first failure").await);
        assert!(policy.backoff("test", 2, &"second failure").await);
        assert!(!policy.backoff("test", 3, &"third failure").await);
    }

    #[tokio::test]
    async fn caller_loop_stops_after_max_attempts() {
        let policy = RetryPolicy::new(2, 0);
        let mut calls = 0u32;
        let mut attempt = 1;
        let result: Result<(), String> = loop {
            calls += 1;
            let err = format!("failure {attempt}");
            if !policy.backoff("test", attempt, &err).await {
                break Err(err);
            }
            attempt += 1;
        };
        assert_eq!(calls, 2);
        assert_eq!(result.unwrap_err(), "failure 2");
    }

    #[tokio::test]
    async fn once_never_retries() {
        assert!(!RetryPolicy::once().backoff("test", 1, &"nope").await);
    }
}
