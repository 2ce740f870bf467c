//! Retry with exponential backoff.
//!
//! A single executor wraps any fallible async operation: webhook handler
//! processing and every outbound API call go through [`RetryPolicy::execute`].
//! Failures are classified through the [`Retryable`] trait; terminal errors
//! propagate immediately, transient ones are retried with
//! `initial * 2^(attempt-1)` backoff, ±jitter, capped at the maximum delay.

mod config;

pub use config::{RetryConfig, RetryConfigBuilder};

use crate::error::BridgeError;
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Classification hook used by the retry executor
pub trait Retryable {
    /// Whether another attempt may succeed
    fn is_retryable(&self) -> bool;

    /// Delay requested by the failing party, overriding the computed backoff
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for BridgeError {
    fn is_retryable(&self) -> bool {
        BridgeError::is_retryable(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        BridgeError::retry_after(self)
    }
}

/// Failure returned by the executor
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The operation failed with an error that is never retried
    #[error("{0}")]
    Terminal(E),

    /// Every attempt failed with a retryable error; carries the last one
    #[error("retries exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    /// Total number of attempts made before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Terminal(_) => 1,
            Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// The last error observed, discarding the retry tag
    pub fn into_inner(self) -> E {
        match self {
            Self::Terminal(err) => err,
            Self::Exhausted { last, .. } => last,
        }
    }
}

impl From<RetryError<BridgeError>> for BridgeError {
    fn from(err: RetryError<BridgeError>) -> Self {
        match err {
            RetryError::Terminal(err) => err,
            RetryError::Exhausted { attempts, last } => BridgeError::RetriesExhausted {
                attempts,
                source: Box::new(last),
            },
        }
    }
}

/// Per-invocation retry bookkeeping, created fresh for every call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryAttemptState {
    /// Retries performed so far (0 while the first attempt runs)
    pub attempt: u32,
    pub max_retries: u32,
    pub next_delay: Duration,
}

impl RetryAttemptState {
    fn new(max_retries: u32) -> Self {
        Self {
            attempt: 0,
            max_retries,
            next_delay: Duration::ZERO,
        }
    }

    fn exhausted(&self) -> bool {
        self.attempt >= self.max_retries
    }
}

/// Exponential backoff policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_delay: Duration,
    max_delay: Duration,
    jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
            jitter_factor: 0.1,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: config.initial_delay(),
            max_delay: config.max_delay(),
            jitter_factor: config.jitter_factor.clamp(0.0, 1.0),
        }
    }

    /// Policy that never retries
    pub fn no_retry() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    #[must_use]
    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Un-jittered delay before retry number `attempt` (1-based)
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63);
        let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
        let delay_ms = (self.initial_delay.as_millis() as u64).saturating_mul(factor);
        Duration::from_millis(delay_ms).min(self.max_delay)
    }

    /// Jittered delay before retry number `attempt` (1-based), never above the cap
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt).as_secs_f64();
        let jitter = if self.jitter_factor > 0.0 {
            rand::thread_rng().gen_range(-self.jitter_factor..=self.jitter_factor)
        } else {
            0.0
        };
        Duration::from_secs_f64((base * (1.0 + jitter)).max(0.0)).min(self.max_delay)
    }

    fn delay_for(&self, attempt: u32, requested: Option<Duration>) -> Duration {
        match requested {
            Some(delay) => delay.min(self.max_delay),
            None => self.delay_for_attempt(attempt),
        }
    }

    /// Run `operation` until it succeeds, fails terminally, or the budget runs out
    ///
    /// `operation_name` is the classification context attached to every log
    /// line emitted for this invocation.
    pub async fn execute<T, E, F, Fut>(
        &self,
        operation_name: &str,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut state = RetryAttemptState::new(self.max_retries);

        loop {
            match operation().await {
                Ok(value) => {
                    if state.attempt > 0 {
                        tracing::debug!(
                            operation = operation_name,
                            retries = state.attempt,
                            "Operation succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_retryable() => {
                    tracing::debug!(
                        operation = operation_name,
                        attempt = state.attempt + 1,
                        error = %err,
                        "Operation failed with non-retryable error"
                    );
                    return Err(RetryError::Terminal(err));
                }
                Err(err) if state.exhausted() => {
                    let attempts = state.attempt + 1;
                    tracing::error!(
                        operation = operation_name,
                        attempts,
                        error = %err,
                        "Retries exhausted"
                    );
                    return Err(RetryError::Exhausted {
                        attempts,
                        last: err,
                    });
                }
                Err(err) => {
                    state.attempt += 1;
                    state.next_delay = self.delay_for(state.attempt, err.retry_after());

                    tracing::warn!(
                        operation = operation_name,
                        attempt = state.attempt,
                        max_retries = state.max_retries,
                        delay_ms = state.next_delay.as_millis() as u64,
                        error = %err,
                        "Retrying after transient error"
                    );

                    tokio::time::sleep(state.next_delay).await;
                }
            }
        }
    }
}

/// Run `operation` under `policy`; see [`RetryPolicy::execute`]
pub async fn execute_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    policy.execute(operation_name, operation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn default_policy() -> RetryPolicy {
        RetryPolicy::from_config(&RetryConfig::default())
    }

    fn within(actual: Duration, expected_ms: f64, tolerance: f64) -> bool {
        let ms = actual.as_secs_f64() * 1000.0;
        ms >= expected_ms * (1.0 - tolerance) - 1.0 && ms <= expected_ms * (1.0 + tolerance) + 1.0
    }

    #[test]
    fn test_default_delay_sequence() {
        let policy = default_policy();

        for _ in 0..50 {
            assert!(within(policy.delay_for_attempt(1), 1000.0, 0.1));
            assert!(within(policy.delay_for_attempt(2), 2000.0, 0.1));
            assert!(within(policy.delay_for_attempt(3), 4000.0, 0.1));
        }
    }

    #[test]
    fn test_delay_never_exceeds_cap() {
        let policy = RetryPolicy::new(20, Duration::from_secs(1), Duration::from_secs(60));

        for attempt in 1..=20 {
            assert!(policy.delay_for_attempt(attempt) <= Duration::from_secs(60));
        }
        assert_eq!(policy.base_delay(10), Duration::from_secs(60));
    }

    #[test]
    fn test_base_delay_handles_huge_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1000), Duration::from_secs(60));
        assert_eq!(policy.base_delay(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_zero_jitter_is_exact() {
        let policy = default_policy().with_jitter(0.0);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_two_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result: Result<&str, RetryError<BridgeError>> = default_policy()
            .execute("flaky", || {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(BridgeError::from(std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            "ECONNRESET",
                        )))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        // three attempts, two retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(within(started.elapsed(), 3000.0, 0.1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_attempted_once() {
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), RetryError<BridgeError>> = default_policy()
            .execute("bad_request", || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(BridgeError::from_status(400, "bad request", None))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let err = result.unwrap_err();
        assert_eq!(err.attempts(), 1);
        assert!(matches!(err, RetryError::Terminal(BridgeError::Api { status: 400, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_reports_last_error() {
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), RetryError<BridgeError>> = default_policy()
            .execute("always_503", || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(BridgeError::from_status(503, "unavailable", None))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        let err: BridgeError = result.unwrap_err().into();
        match err {
            BridgeError::RetriesExhausted { attempts, source } => {
                assert_eq!(attempts, 4);
                assert!(matches!(*source, BridgeError::Server { status: 503, .. }));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_overrides_backoff() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result: Result<u32, RetryError<BridgeError>> = default_policy()
            .execute("rate_limited", || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(BridgeError::RateLimited {
                            retry_after: Some(Duration::from_secs(7)),
                        })
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(7) && elapsed < Duration::from_millis(7010));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_is_capped() {
        let policy = RetryPolicy::new(1, Duration::from_millis(100), Duration::from_secs(2));
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let _ = policy
            .execute("capped", || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(BridgeError::RateLimited {
                            retry_after: Some(Duration::from_secs(3600)),
                        })
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_millis(2010));
    }

    #[tokio::test]
    async fn test_no_retry_policy() {
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), RetryError<BridgeError>> = RetryPolicy::no_retry()
            .execute("once", || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(BridgeError::network("socket hang up"))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 1, .. })));
    }

    #[tokio::test]
    async fn test_custom_retryable_type() {
        #[derive(Debug)]
        struct Flaky(bool);

        impl Display for Flaky {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "flaky({})", self.0)
            }
        }

        impl Retryable for Flaky {
            fn is_retryable(&self) -> bool {
                self.0
            }
        }

        let policy = RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(5));
        let result: Result<(), _> = execute_with_retry(&policy, "custom", || async {
            Err(Flaky(false))
        })
        .await;

        assert!(matches!(result, Err(RetryError::Terminal(Flaky(false)))));
    }
}
