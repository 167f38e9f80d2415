// src/services/retry.rs

//! Exponential backoff shared by the API client and the content fetcher.

use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Ceiling for a single backoff sleep.
const MAX_DELAY: Duration = Duration::from_secs(60);

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// The error that ended a retry loop, with the number of attempts made.
#[derive(Debug)]
pub struct Failure<E> {
    pub attempts: u32,
    pub error: E,
}

/// Bounded retry with exponential backoff and jitter.
///
/// The first attempt is not a retry: a policy with `max_retries = 3` makes
/// at most four attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay: MAX_DELAY,
        }
    }

    /// Policy that never retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Sleep before retry number `retry` (0-based): `initial * 2^retry`
    /// plus up to 25% jitter, capped at the policy maximum.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let base = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(retry))
            .min(self.max_delay);
        base.saturating_add(jitter(base / 4, retry))
            .min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails permanently, or the budget runs out.
    ///
    /// `op` receives the 0-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, Failure<E>>
    where
        E: Retryable + fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt < self.max_retries => {
                    let delay = self.backoff_delay(attempt);
                    log::warn!(
                        "{label}: attempt {}/{} failed ({error}), retrying in {}ms",
                        attempt + 1,
                        self.max_attempts(),
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    return Err(Failure {
                        attempts: attempt + 1,
                        error,
                    });
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

fn jitter(max_jitter: Duration, retry: u32) -> Duration {
    let nanos = max_jitter.as_nanos().min(u128::from(u64::MAX)) as u64;
    if nanos == 0 {
        return Duration::ZERO;
    }

    let seed = u64::from(retry)
        .wrapping_mul(6_364_136_223_846_793_005)
        .wrapping_add(1_442_695_040_888_963_407);
    Duration::from_nanos(seed % nanos.saturating_add(1))
}
