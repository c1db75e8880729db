//! Retry helper
//!
//! Runs an operation until it succeeds, fails permanently, or the deadline
//! passes. Waits between attempts grow exponentially.

use super::error::{ProviderError, Result};
use backoff::backoff::Backoff;
use backoff::exponential::ExponentialBackoff;
use backoff::Clock;
use std::future::Future;
use std::time::{Duration, Instant};

/// Outcome of a failed attempt
#[derive(Debug)]
pub enum RetryError {
    /// Try again after a backoff
    Retryable(ProviderError),
    /// Give up now
    NonRetryable(ProviderError),
}

impl RetryError {
    pub fn retryable(err: ProviderError) -> Self {
        Self::Retryable(err)
    }

    pub fn non_retryable(err: ProviderError) -> Self {
        Self::NonRetryable(err)
    }
}

/// Deadline and backoff for [`retry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Doubling backoff without jitter, exhausted once `timeout` has elapsed
    fn backoff(&self) -> ExponentialBackoff<TokioClock> {
        let clock = TokioClock;
        ExponentialBackoff {
            current_interval: self.initial_delay,
            initial_interval: self.initial_delay,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: self.max_delay,
            start_time: clock.now(),
            max_elapsed_time: Some(self.timeout),
            clock,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3 * 60),
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Reads time from Tokio so a paused test clock drives the deadline
#[derive(Debug, Clone, Copy, Default)]
struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}

/// Run `op` until it returns `Ok`, a non-retryable error, or the policy's
/// timeout elapses. On timeout the last retryable error is returned inside
/// [`ProviderError::Timeout`].
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, RetryError>>,
{
    let mut backoff = policy.backoff();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(RetryError::NonRetryable(err)) => return Err(err),
            Err(RetryError::Retryable(err)) => err,
        };

        let Some(delay) = backoff.next_backoff() else {
            tracing::warn!("giving up after {} attempts: {}", attempt, err);
            return Err(ProviderError::Timeout {
                elapsed: backoff.get_elapsed_time(),
                last_error: Box::new(err),
            });
        };

        tracing::debug!("attempt {} failed, retrying in {:?}: {}", attempt, delay, err);
        tokio::time::sleep(delay).await;
    }
}
