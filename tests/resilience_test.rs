//! Resilience substrate scenarios: circuit opening and recovery, bounded
//! retries, and the composed executor's fast-fail behavior.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use runeforge::resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, ResilientExecutor, Retrier, RetryConfig,
};
use runeforge::EngineError;

#[tokio::test]
async fn circuit_opens_after_two_failures_and_recovers_after_timeout() {
    let breaker = CircuitBreaker::new(
        "scenario",
        CircuitBreakerConfig {
            max_failures: 2,
            timeout: Duration::from_millis(100),
            max_requests: 1,
        },
    );

    for _ in 0..2 {
        let _ = breaker
            .call(async { Err::<(), _>(EngineError::Internal("down".into())) })
            .await;
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    // While open, the wrapped operation must not run
    let invocations = AtomicU32::new(0);
    let result = breaker
        .call(async {
            invocations.fetch_add(1, Ordering::SeqCst);
            Ok::<_, EngineError>(())
        })
        .await;
    assert!(matches!(result, Err(EngineError::CircuitOpen(_))));
    assert_eq!(invocations.load(Ordering::SeqCst), 0);

    // After the timeout a successful probe closes the circuit
    tokio::time::sleep(Duration::from_millis(110)).await;
    breaker
        .call(async { Ok::<_, EngineError>(()) })
        .await
        .unwrap();
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.stats().consecutive_failures, 0);
}

#[tokio::test]
async fn retrier_recovers_after_a_single_transient_failure() {
    let retrier = Retrier::new(RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
        multiplier: 2.0,
        jitter: 0.0,
    });
    let cancel = CancellationToken::new();
    let invocations = AtomicU32::new(0);

    let result = retrier
        .execute(&cancel, || async {
            let n = invocations.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(EngineError::Internal("flaky".into()))
            } else {
                Ok("recovered")
            }
        })
        .await;

    assert_eq!(result.unwrap(), "recovered");
    assert_eq!(invocations.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn executor_fast_fails_once_its_circuit_opens() {
    let executor = ResilientExecutor::new(
        "scenario-exec",
        CircuitBreakerConfig {
            max_failures: 3,
            timeout: Duration::from_secs(60),
            max_requests: 1,
        },
        RetryConfig {
            max_attempts: 10,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            multiplier: 1.0,
            jitter: 0.0,
        },
    );
    let cancel = CancellationToken::new();
    let invocations = AtomicU32::new(0);

    // Ten attempts are budgeted, but the breaker opens after three
    // failures and the retry loop stops on CircuitOpen.
    let result = executor
        .execute(&cancel, || async {
            invocations.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(EngineError::Internal("down hard".into()))
        })
        .await;

    assert_eq!(invocations.load(Ordering::SeqCst), 3);
    assert!(matches!(result, Err(EngineError::CircuitOpen(_))));
}

#[tokio::test]
async fn breaker_reset_restores_a_clean_closed_state() {
    let breaker = CircuitBreaker::new(
        "reset-scenario",
        CircuitBreakerConfig {
            max_failures: 1,
            timeout: Duration::from_secs(60),
            max_requests: 1,
        },
    );

    let _ = breaker
        .call(async { Err::<(), _>(EngineError::Internal("x".into())) })
        .await;
    assert_eq!(breaker.state(), CircuitState::Open);

    breaker.reset();
    breaker
        .call(async { Ok::<_, EngineError>(()) })
        .await
        .unwrap();

    let stats = breaker.stats();
    assert_eq!(stats.state, CircuitState::Closed);
    assert_eq!(stats.consecutive_failures, 0);
}
