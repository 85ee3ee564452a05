//! Retry logic with linear backoff for transient failures.
//!
//! A request is retried when it produced no response at all, or when the
//! API answered 429 or a 5xx other than 501. Any other status is returned
//! to the caller untouched.

use log::warn;
use std::thread;
use std::time::Duration;

use crate::error::Result;
use crate::gateway::Response;

/// Retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub wait_min: Duration,
    /// Upper bound for any delay.
    pub wait_max: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            wait_min: Duration::from_secs(1),
            wait_max: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    /// Policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt + 1` (0-indexed attempt).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.wait_min
            .saturating_mul(attempt.saturating_add(1))
            .min(self.wait_max)
    }
}

/// Whether a status is worth retrying.
#[must_use]
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || ((500..600).contains(&status) && status != 501)
}

/// Execute a request with retry logic.
///
/// # Returns
/// The first non-retryable response, the last response once retries are
/// exhausted, or the last transport error.
pub fn with_retry<F>(config: &RetryConfig, what: &str, mut operation: F) -> Result<Response>
where
    F: FnMut() -> Result<Response>,
{
    let mut attempt = 0;
    loop {
        let result = operation();
        let retry_reason = match &result {
            Ok(response) if is_retryable_status(response.status) => {
                Some(format!("HTTP {}", response.status))
            }
            Err(e) if e.is_retryable() => Some(e.to_string()),
            _ => None,
        };

        let Some(retry_reason) = retry_reason else {
            return result;
        };
        if attempt >= config.max_retries {
            return result;
        }

        let delay = config.delay_for_attempt(attempt);
        warn!(
            "{} failed ({}), retry {}/{} in {}ms",
            what,
            retry_reason,
            attempt + 1,
            config.max_retries,
            delay.as_millis()
        );
        thread::sleep(delay);
        attempt += 1;
    }
}
