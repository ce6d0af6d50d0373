//! Bounded retries with exponential backoff and jitter.
//!
//! Only transient provider failures (429, 5xx, rate-limit messages) are retried.
//! Every wait races the caller's cancellation token.

use crate::error::{ProviderFailure, Result, ThumbnailError};
use async_trait::async_trait;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first call.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Jitter is drawn uniformly from `[0, max_jitter)`.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_jitter: Duration::from_millis(300),
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_jitter(mut self, jitter: Duration) -> Self {
        self.max_jitter = jitter;
        self
    }

    /// `base * 2^(attempt-1)` for the attempt that just failed (1-based).
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay_for(attempt) + self.jitter()
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
    }
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

#[derive(Clone)]
pub struct Retrier {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl Retrier {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_sleeper(policy, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` until it succeeds, fails non-transiently, runs out of
    /// attempts, or `cancel` fires. The closure receives the 1-based attempt.
    pub async fn execute<F, Fut, T>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<(T, u32)>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, ProviderFailure>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return Err(ThumbnailError::Cancelled);
            }

            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(ThumbnailError::Cancelled),
                outcome = operation(attempt) => outcome,
            };

            let failure = match outcome {
                Ok(value) => return Ok((value, attempt)),
                Err(failure) => failure,
            };

            if !failure.is_transient() {
                log::warn!("Non-transient provider error on attempt {}: {}", attempt, failure);
                return Err(failure.into_error());
            }

            if attempt >= max_attempts {
                log::error!(
                    "Giving up after {} attempts, last transient error: {}",
                    attempt,
                    failure
                );
                return Err(ThumbnailError::RetryExhausted {
                    attempts: attempt,
                    last: Box::new(failure.into_error()),
                });
            }

            let delay = self.policy.delay_for(attempt);
            log::warn!(
                "Transient error (attempt {}/{}) {} retrying after {}ms",
                attempt,
                max_attempts,
                failure,
                delay.as_millis()
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(ThumbnailError::Cancelled),
                _ = self.sleeper.sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, delay: Duration) {
            self.delays.lock().unwrap().push(delay);
        }
    }

    #[test]
    fn test_base_delays_double() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.base_delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.base_delay_for(2), Duration::from_millis(1000));
        assert_eq!(policy.base_delay_for(3), Duration::from_millis(2000));
    }

    #[test]
    fn test_jitter_bounds() {
        let policy = RetryPolicy::default();
        for attempt in 1..=3 {
            let base = policy.base_delay_for(attempt);
            for _ in 0..50 {
                let delay = policy.delay_for(attempt);
                assert!(delay >= base);
                assert!(delay < base + Duration::from_millis(300));
            }
        }

        let no_jitter = RetryPolicy::default().with_max_jitter(Duration::ZERO);
        assert_eq!(no_jitter.delay_for(2), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_recovers_after_server_error() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let retrier = Retrier::with_sleeper(
            RetryPolicy::default().with_max_jitter(Duration::ZERO),
            sleeper.clone(),
        );
        let calls = AtomicU32::new(0);

        let (value, attempts) = retrier
            .execute(&CancellationToken::new(), |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(ProviderFailure::new(Some(503), "unavailable"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, "done");
        assert_eq!(attempts, 2);
        assert_eq!(*sleeper.delays.lock().unwrap(), vec![Duration::from_millis(500)]);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let retrier = Retrier::new(RetryPolicy::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = AtomicU32::new(0);

        let result: Result<((), u32)> = retrier
            .execute(&cancel, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;

        assert!(matches!(result, Err(ThumbnailError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_backoff_skips_retries() {
        let retrier = Retrier::new(
            RetryPolicy::default().with_base_delay(Duration::from_secs(60)),
        );
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let counter = calls.clone();
        let result: Result<((), u32)> = retrier
            .execute(&cancel, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderFailure::new(Some(429), "slow down")) }
            })
            .await;

        assert!(matches!(result, Err(ThumbnailError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_aborts_in_flight_call() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let retrier = Retrier::with_sleeper(RetryPolicy::default(), sleeper.clone());
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let counter = calls.clone();
        let result: Result<((), u32)> = retrier
            .execute(&cancel, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                futures::future::pending::<std::result::Result<(), ProviderFailure>>()
            })
            .await;

        assert!(matches!(result, Err(ThumbnailError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.delays.lock().unwrap().is_empty());
    }
}
