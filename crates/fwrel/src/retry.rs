//! Retry logic with exponential backoff
//!
//! Only manifest write conflicts are retried. Each attempt re-runs the whole
//! load, plan and save cycle, so it always starts from the latest manifest.

use fwrel_release::Result;
use std::thread;
use std::time::Duration;

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Base for exponential backoff calculation
    pub exponential_base: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            exponential_base: 2.0,
        }
    }
}

/// Execute an operation, retrying while it fails with a write conflict
///
/// # Errors
///
/// Returns the first non-conflict error, or the last conflict once all
/// attempts are used.
pub fn with_retry<T, F>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        match operation() {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_conflict() || attempt >= config.max_attempts => return Err(e),
            Err(e) => {
                tracing::warn!(
                    attempt,
                    max_attempts = config.max_attempts,
                    ?delay,
                    error = %e,
                    "Manifest changed during update, retrying"
                );

                thread::sleep(delay);

                let next_delay = delay.mul_f32(config.exponential_base);
                delay = next_delay.min(config.max_delay);
            }
        }
    }
}
