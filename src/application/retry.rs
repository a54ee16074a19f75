//! Retry with exponential backoff and jitter.
//!
//! One policy object is shared by the market data fetch, swap calls and
//! message delivery. Only failures that classify themselves as transient
//! are retried.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::error::{DeliveryError, SnapshotError, SwapError};

/// Errors that know whether another attempt could succeed.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for SnapshotError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl Transient for SwapError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl Transient for DeliveryError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Exponential backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Always at least 1.
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Same backoff shape with a different attempt budget.
    #[must_use]
    pub fn with_attempts(self, max_attempts: u32) -> Self {
        Self::new(max_attempts, self.base_delay, self.max_delay)
    }

    /// Delay before retry number `retry` (1-based).
    ///
    /// `base * 2^(retry-1)` plus up to 20% jitter, capped at `max_delay`.
    /// Doubling outgrows the jitter, so successive delays never shrink.
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(20);
        let base = self.base_delay.saturating_mul(1u32 << exp);
        let jitter = rand::thread_rng().gen_range(0.0..=0.2);
        base.mul_f64(1.0 + jitter).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, E, F, Fut>(&self, label: &'static str, mut op: F) -> Attempts<T, E>
    where
        E: Transient + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut delays = Vec::new();
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => {
                    return Attempts {
                        result: Ok(value),
                        attempts: attempt,
                        delays,
                    }
                }
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    debug!(
                        op = label,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient failure, retrying"
                    );
                    delays.push(delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    return Attempts {
                        result: Err(err),
                        attempts: attempt,
                        delays,
                    }
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500), Duration::from_secs(30))
    }
}

/// Outcome of [`RetryPolicy::run`] with the backoff that was applied.
#[derive(Debug)]
pub struct Attempts<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
    pub delays: Vec<Duration>,
}

impl<T, E> Attempts<T, E> {
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delays_grow_and_respect_cap() {
        let policy = RetryPolicy::new(10, Duration::from_millis(100), Duration::from_millis(1000));
        let mut previous = Duration::ZERO;
        for retry in 1..10 {
            let delay = policy.delay_for(retry);
            assert!(delay >= previous, "retry {retry}: {delay:?} < {previous:?}");
            assert!(delay <= Duration::from_millis(1000));
            previous = delay;
        }
    }

    #[test]
    fn first_delay_stays_within_jitter_band() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100), Duration::from_secs(10));
        for _ in 0..50 {
            let delay = policy.delay_for(1);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(120));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_then_succeeds() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(5, Duration::from_millis(10), Duration::from_secs(1));
        let out = policy
            .run("test", || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(SnapshotError::Transient("timeout".into()))
                } else {
                    Ok(42)
                }
            })
            .await;
        assert_eq!(out.result, Ok(42));
        assert_eq!(out.attempts, 3);
        assert_eq!(out.delays.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_is_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(5, Duration::from_millis(10), Duration::from_secs(1));
        let out: Attempts<(), _> = policy
            .run("test", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SnapshotError::Permanent("bad schema".into()))
            })
            .await;
        assert!(out.result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(out.delays.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(4, Duration::from_millis(10), Duration::from_secs(1));
        let out: Attempts<(), _> = policy
            .run("test", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SwapError::Transient("503".into()))
            })
            .await;
        assert_eq!(out.result, Err(SwapError::Transient("503".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(out.delays.len(), 3);
    }
}
