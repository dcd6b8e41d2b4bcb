//! Exponential backoff for store and channel operations.
//!
//! `delay(attempt) = min(initial_delay * 2^(attempt - 1), max_delay)` plus up
//! to a quarter of that in random jitter, re-clamped to `max_delay`. Errors
//! the caller marks as permanent short-circuit immediately.

use std::future::Future;
use std::time::Duration;

use rand::Rng as _;
use tracing::warn;

use crate::config::RetryConfig;

/// Delay before attempt `attempt + 1`, where `attempt` is 1-based.
pub fn compute_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let base = 2_u64
        .checked_pow(exponent)
        .and_then(|factor| config.initial_delay_ms.checked_mul(factor))
        .unwrap_or(config.max_delay_ms)
        .min(config.max_delay_ms);

    let quarter = base / 4;
    let jitter = if quarter == 0 {
        0
    } else {
        rand::rng().random_range(0..=quarter)
    };
    Duration::from_millis(base.saturating_add(jitter).min(config.max_delay_ms))
}

/// Run `operation` until it succeeds, fails permanently, or the attempts in
/// `config` are spent. The last error is returned.
///
/// # Errors
///
/// Returns the error of the final attempt.
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    label: &str,
    retryable: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt: u32 = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_attempts || !retryable(&e) => {
                warn!(operation = label, attempt, error = %e, "giving up");
                return Err(e);
            }
            Err(e) => {
                let delay = compute_delay(config, attempt);
                warn!(
                    operation = label,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "retrying"
                );
                tokio::time::sleep(delay).await;
                attempt = attempt.saturating_add(1);
            }
        }
    }
}
