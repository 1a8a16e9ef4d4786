//! Retry decision helpers: attempt accounting and backoff delays

use std::time::Duration;

use crate::models::{Job, RetryBackoff};

/// Delay before retrying a failed attempt.
///
/// `attempt` is 1-based: the delay after attempt N gates attempt N + 1.
/// Exponential backoff doubles from the configured base:
/// `retry_delay_ms * 2^(attempt - 1)`.
pub fn delay_for_attempt(backoff: RetryBackoff, base_delay_ms: u64, attempt: u32) -> Duration {
    let millis = match backoff {
        RetryBackoff::Fixed => base_delay_ms,
        RetryBackoff::Exponential => {
            let exponent = attempt.saturating_sub(1).min(30);
            base_delay_ms.saturating_mul(1u64 << exponent)
        }
    };
    Duration::from_millis(millis)
}

/// Check whether the given attempt exhausted the job's retry budget: the
/// initial try counts as attempt 1, up to `max_retries` retries follow.
pub fn is_last_attempt(attempt: u32, max_retries: u32) -> bool {
    attempt >= max_retries + 1
}

/// Convenience over a job row
pub fn retry_delay(job: &Job, attempt: u32) -> Duration {
    delay_for_attempt(job.retry_backoff, job.retry_delay_ms as u64, attempt)
}
