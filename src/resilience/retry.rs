//! Retry engine for transient failures.
//!
//! Exponential backoff with jitter, a retryable-error predicate, and
//! cancellation-aware sleeps.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{EngineError, Result};

/// Predicate deciding whether an error is worth another attempt.
pub type RetryPredicate = Arc<dyn Fn(&EngineError) -> bool + Send + Sync>;

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total invocation budget, including the first attempt (>= 1)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Backoff multiplier applied per retry (>= 1.0)
    pub multiplier: f64,
    /// Uniform jitter fraction; 0.1 perturbs each delay by up to +/-10%
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl RetryConfig {
    /// A single attempt and no sleeping; wraps the operation as-is.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            jitter: 0.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts < 1 {
            return Err(EngineError::Configuration(
                "retry max_attempts must be >= 1".into(),
            ));
        }
        if self.max_delay < self.initial_delay {
            return Err(EngineError::Configuration(
                "retry max_delay must be >= initial_delay".into(),
            ));
        }
        if self.multiplier < 1.0 {
            return Err(EngineError::Configuration(
                "retry multiplier must be >= 1.0".into(),
            ));
        }
        Ok(())
    }
}

/// Default classification: transient I/O and timeouts retry; everything
/// else, in particular `CircuitOpen`, fails fast.
pub fn is_retryable_default(error: &EngineError) -> bool {
    matches!(
        error,
        EngineError::Io(_) | EngineError::Timeout(_) | EngineError::Internal(_)
    )
}

/// Executes an operation up to `max_attempts` times with backoff between
/// attempts.
#[derive(Clone)]
pub struct Retrier {
    config: RetryConfig,
    retryable: RetryPredicate,
}

impl Retrier {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            retryable: Arc::new(is_retryable_default),
        }
    }

    pub fn with_retryable<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&EngineError) -> bool + Send + Sync + 'static,
    {
        self.retryable = Arc::new(predicate);
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Backoff for the n-th retry (0-based): `min(initial * multiplier^n,
    /// max)` perturbed by uniform jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.config.initial_delay.as_millis() as f64
            * self.config.multiplier.powi(attempt as i32);
        let capped_ms = base_ms.min(self.config.max_delay.as_millis() as f64);
        let jittered_ms = if self.config.jitter > 0.0 {
            let offset = self.config.jitter * (2.0 * rand::random::<f64>() - 1.0);
            (capped_ms * (1.0 + offset)).max(0.0)
        } else {
            capped_ms
        };
        Duration::from_millis(jittered_ms as u64)
    }

    /// Run `op` until it succeeds, fails non-retryably, is cancelled, or the
    /// attempt budget is spent.
    ///
    /// With `max_attempts = 1` this is a pass-through wrapper: the single
    /// failure is returned without `RetryExhausted` framing.
    pub async fn execute<F, Fut, T>(&self, cancel: &CancellationToken, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error: Option<EngineError> = None;

        for attempt in 0..self.config.max_attempts {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled("retry loop cancelled".into()));
            }

            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !(self.retryable)(&err) {
                        return Err(err);
                    }
                    debug!(attempt, error = %err, "retryable failure");
                    last_error = Some(err);

                    let retries_left = attempt + 1 < self.config.max_attempts;
                    if retries_left {
                        let delay = self.delay_for_attempt(attempt);
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                return Err(EngineError::Cancelled(
                                    "cancelled while backing off between retries".into(),
                                ));
                            }
                            _ = sleep(delay) => {}
                        }
                    }
                }
            }
        }

        let source = last_error.unwrap_or_else(|| {
            EngineError::Internal("retry loop ended without recording an error".into())
        });
        if self.config.max_attempts == 1 {
            return Err(source);
        }
        Err(EngineError::RetryExhausted {
            attempts: self.config.max_attempts,
            source: Box::new(source),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            multiplier: 2.0,
            jitter: 0.0,
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let retrier = Retrier::new(fast_config(5));
        assert_eq!(retrier.delay_for_attempt(0), Duration::from_millis(1));
        assert_eq!(retrier.delay_for_attempt(1), Duration::from_millis(2));
        assert_eq!(retrier.delay_for_attempt(2), Duration::from_millis(4));
        // Capped at max_delay
        assert_eq!(retrier.delay_for_attempt(10), Duration::from_millis(10));
    }

    #[test]
    fn config_validation() {
        assert!(RetryConfig::default().validate().is_ok());
        assert!(RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default()
        }
        .validate()
        .is_err());
        assert!(RetryConfig {
            multiplier: 0.5,
            ..RetryConfig::default()
        }
        .validate()
        .is_err());
        assert!(RetryConfig {
            initial_delay: Duration::from_secs(60),
            ..RetryConfig::default()
        }
        .validate()
        .is_err());
    }

    #[tokio::test]
    async fn fails_once_then_succeeds() {
        let retrier = Retrier::new(fast_config(3));
        let cancel = CancellationToken::new();
        let attempts = AtomicU32::new(0);

        let result = retrier
            .execute(&cancel, || async {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(EngineError::Internal("transient".into()))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invocation_count_never_exceeds_max_attempts() {
        let retrier = Retrier::new(fast_config(3));
        let cancel = CancellationToken::new();
        let attempts = AtomicU32::new(0);

        let result = retrier
            .execute(&cancel, || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(EngineError::Internal("persistent".into()))
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        match result {
            Err(EngineError::RetryExhausted { attempts: n, .. }) => assert_eq!(n, 3),
            other => panic!("expected RetryExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn single_attempt_is_a_pass_through() {
        let retrier = Retrier::new(fast_config(1));
        let cancel = CancellationToken::new();
        let attempts = AtomicU32::new(0);

        let result = retrier
            .execute(&cancel, || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(EngineError::Internal("boom".into()))
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        // No RetryExhausted framing when retry is disabled
        assert!(matches!(result, Err(EngineError::Internal(_))));
    }

    #[tokio::test]
    async fn non_retryable_error_returns_immediately() {
        let retrier = Retrier::new(fast_config(5));
        let cancel = CancellationToken::new();
        let attempts = AtomicU32::new(0);

        let result = retrier
            .execute(&cancel, || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(EngineError::Validation("bad input".into()))
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[tokio::test]
    async fn circuit_open_is_not_retried_by_default() {
        let retrier = Retrier::new(fast_config(5));
        let cancel = CancellationToken::new();
        let attempts = AtomicU32::new(0);

        let result = retrier
            .execute(&cancel, || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(EngineError::CircuitOpen("fs".into()))
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(EngineError::CircuitOpen(_))));
    }

    #[tokio::test]
    async fn cancellation_short_circuits_the_backoff() {
        let retrier = Retrier::new(RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(30),
            multiplier: 1.0,
            jitter: 0.0,
        });
        let cancel = CancellationToken::new();
        let attempts = AtomicU32::new(0);

        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel_clone.cancel();
        });

        let started = std::time::Instant::now();
        let result = retrier
            .execute(&cancel, || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(EngineError::Internal("down".into()))
            })
            .await;

        // The 30s backoff must be abandoned as soon as the token fires
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(matches!(result, Err(EngineError::Cancelled(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn custom_predicate_overrides_default() {
        let retrier = Retrier::new(fast_config(3))
            .with_retryable(|e| matches!(e, EngineError::NotFound(_)));
        let cancel = CancellationToken::new();
        let attempts = AtomicU32::new(0);

        let result = retrier
            .execute(&cancel, || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(EngineError::NotFound("eventually appears".into()))
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(EngineError::RetryExhausted { .. })));
    }
}
