//! Exponential backoff + circuit breaker for transient store failures
//! (§7: "Transient store errors... retried with bounded exponential
//! backoff (3 attempts); if still failing, the record is marked `errored`
//! and the task continues.").
//!
//! # Backoff schedule (defaults)
//!
//! | Attempt | Delay (base) |
//! |---------|--------------|
//! | 0       | 50ms         |
//! | 1       | 100ms        |
//! | 2       | 200ms        |
//!
//! # Circuit breaker
//!
//! After 5 consecutive failures the circuit opens for 30s, failing fast
//! with [`StoreError::CircuitOpen`]. A successful call after the reset
//! window closes the circuit.

use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::StoreError;

const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY_MS: u64 = 50;

/// Thread-safe circuit breaker guarding store access.
pub struct CircuitBreaker {
    failures: AtomicU32,
    open_until_us: AtomicU64,
    threshold: u32,
    reset_duration: Duration,
    epoch: Instant,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreaker {
    #[must_use]
    pub fn new() -> Self {
        Self::with_params(5, Duration::from_secs(30))
    }

    #[must_use]
    pub fn with_params(threshold: u32, reset_duration: Duration) -> Self {
        Self {
            failures: AtomicU32::new(0),
            open_until_us: AtomicU64::new(0),
            threshold,
            reset_duration,
            epoch: Instant::now(),
        }
    }

    fn now_us(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        let open_until = self.open_until_us.load(Ordering::Acquire);
        open_until > 0 && self.now_us() < open_until
    }

    #[must_use]
    pub fn seconds_until_reset(&self) -> f64 {
        let open_until = self.open_until_us.load(Ordering::Acquire);
        let now = self.now_us();
        if open_until <= now {
            0.0
        } else {
            (open_until - now) as f64 / 1_000_000.0
        }
    }

    pub fn record_success(&self) {
        self.failures.store(0, Ordering::Release);
        self.open_until_us.store(0, Ordering::Release);
    }

    pub fn record_failure(&self) {
        let failures = self.failures.fetch_add(1, Ordering::AcqRel) + 1;
        if failures >= self.threshold {
            let open_until = self.now_us() + self.reset_duration.as_micros() as u64;
            self.open_until_us.store(open_until, Ordering::Release);
        }
    }

    /// Guard a single call: fail fast with `CircuitOpen` if the breaker is
    /// open, otherwise run `f` and record the outcome.
    pub async fn guard<T, F, Fut>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        if self.is_open() {
            return Err(StoreError::CircuitOpen {
                failures: self.failures.load(Ordering::Acquire),
                reset_after_secs: self.seconds_until_reset(),
            });
        }
        match f().await {
            Ok(v) => {
                self.record_success();
                Ok(v)
            }
            Err(e) => {
                self.record_failure();
                Err(e)
            }
        }
    }
}

/// Retry `f` up to [`MAX_ATTEMPTS`] times with bounded exponential
/// backoff, stopping early on an error `retryable` reports as permanent.
/// Generic over the error type so callers outside this crate (e.g. the
/// PRIMARY source's `linkage_core::Error`) can reuse the same schedule
/// instead of re-deriving it (§7 "retried with bounded exponential
/// backoff").
pub async fn with_backoff<T, E, F, Fut>(retryable: impl Fn(&E) -> bool, mut f: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        match f(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) if retryable(&e) && attempt + 1 < MAX_ATTEMPTS => {
                let delay = BASE_DELAY_MS * 2u64.pow(attempt);
                tokio::time::sleep(Duration::from_millis(delay)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn retries_transient_errors_up_to_max_attempts() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), StoreError> = with_backoff(StoreError::is_retryable, |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::Transient("boom".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS as usize);
    }

    #[tokio::test]
    async fn does_not_retry_persistent_errors() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), StoreError> = with_backoff(StoreError::is_retryable, |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::Persistent("missing collection".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn circuit_opens_after_threshold_failures() {
        let breaker = CircuitBreaker::with_params(2, Duration::from_secs(30));
        for _ in 0..2 {
            let _: Result<(), StoreError> =
                breaker.guard(|| async { Err(StoreError::Transient("x".into())) }).await;
        }
        assert!(breaker.is_open());
    }
}
