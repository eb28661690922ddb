//! Resilient executor: retry wrapped around a circuit breaker.
//!
//! The retry engine sits outside the breaker so it observes `CircuitOpen`
//! as a distinct signal and fails fast instead of hammering an open
//! circuit. Three pre-configured executors cover the process's fallible
//! I/O: filesystem writes, network calls, and configuration loads.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::resilience::circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry,
};
use crate::resilience::retry::{RetryConfig, Retrier};

/// Process-wide breaker registry; executors and ad-hoc callers share
/// breakers by dependency name.
pub static BREAKER_REGISTRY: Lazy<CircuitBreakerRegistry> =
    Lazy::new(CircuitBreakerRegistry::with_defaults);

/// Composition of (retry ∘ circuit-breaker ∘ op) under one interface.
pub struct ResilientExecutor {
    breaker: CircuitBreaker,
    retrier: Retrier,
}

impl ResilientExecutor {
    pub fn new(name: &str, breaker_config: CircuitBreakerConfig, retry_config: RetryConfig) -> Self {
        let breaker = BREAKER_REGISTRY.register(name, breaker_config);
        Self {
            breaker,
            retrier: Retrier::new(retry_config),
        }
    }

    pub fn name(&self) -> &str {
        self.breaker.name()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Execute an operation under the composed policy.
    ///
    /// Errors from admitted operations surface unchanged; `CircuitOpen` and
    /// `RetryExhausted` framing appear only when the executor's own
    /// mechanisms triggered.
    pub async fn execute<F, Fut, T>(&self, cancel: &CancellationToken, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.retrier
            .execute(cancel, || self.breaker.call(op()))
            .await
    }

    pub async fn read_to_string(
        &self,
        cancel: &CancellationToken,
        path: impl AsRef<Path>,
    ) -> Result<String> {
        let path = path.as_ref().to_path_buf();
        self.execute(cancel, move || {
            let path = path.clone();
            async move { Ok(tokio::fs::read_to_string(&path).await?) }
        })
        .await
    }

    pub async fn write(
        &self,
        cancel: &CancellationToken,
        path: impl AsRef<Path>,
        contents: impl Into<Vec<u8>>,
    ) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        let contents = contents.into();
        debug!(path = %path.display(), bytes = contents.len(), "resilient write");
        self.execute(cancel, move || {
            let path = path.clone();
            let contents = contents.clone();
            async move { Ok(tokio::fs::write(&path, &contents).await?) }
        })
        .await
    }

    pub async fn create_dir_all(
        &self,
        cancel: &CancellationToken,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        self.execute(cancel, move || {
            let path = path.clone();
            async move { Ok(tokio::fs::create_dir_all(&path).await?) }
        })
        .await
    }

    /// Remove a directory tree; a missing tree is not an error.
    pub async fn remove_dir_all(
        &self,
        cancel: &CancellationToken,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        self.execute(cancel, move || {
            let path = path.clone();
            async move {
                match tokio::fs::remove_dir_all(&path).await {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    Err(e) => Err(EngineError::from(e)),
                }
            }
        })
        .await
    }

    pub async fn path_exists(
        &self,
        cancel: &CancellationToken,
        path: impl AsRef<Path>,
    ) -> Result<bool> {
        let path: PathBuf = path.as_ref().to_path_buf();
        self.execute(cancel, move || {
            let path = path.clone();
            async move { Ok(tokio::fs::try_exists(&path).await?) }
        })
        .await
    }
}

/// Filesystem executor: moderate retry, moderate breaker.
pub static FILESYSTEM_EXECUTOR: Lazy<ResilientExecutor> = Lazy::new(|| {
    ResilientExecutor::new(
        "filesystem",
        CircuitBreakerConfig {
            max_failures: 5,
            timeout: Duration::from_secs(10),
            max_requests: 2,
        },
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: 0.1,
        },
    )
});

/// Network executor: the most tolerant tuning; remote peers flap.
pub static NETWORK_EXECUTOR: Lazy<ResilientExecutor> = Lazy::new(|| {
    ResilientExecutor::new(
        "network",
        CircuitBreakerConfig {
            max_failures: 8,
            timeout: Duration::from_secs(30),
            max_requests: 3,
        },
        RetryConfig {
            max_attempts: 4,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: 0.2,
        },
    )
});

/// Config-loader executor: strict; a bad config file will not get better.
pub static CONFIG_EXECUTOR: Lazy<ResilientExecutor> = Lazy::new(|| {
    ResilientExecutor::new(
        "config-loader",
        CircuitBreakerConfig {
            max_failures: 2,
            timeout: Duration::from_secs(5),
            max_requests: 1,
        },
        RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(25),
            max_delay: Duration::from_millis(500),
            multiplier: 2.0,
            jitter: 0.0,
        },
    )
});

pub fn filesystem() -> &'static ResilientExecutor {
    &FILESYSTEM_EXECUTOR
}

pub fn network() -> &'static ResilientExecutor {
    &NETWORK_EXECUTOR
}

pub fn config_loader() -> &'static ResilientExecutor {
    &CONFIG_EXECUTOR
}

/// Reset all singleton breaker state. Tests share a process; without this
/// a breaker opened by one test would fast-fail the next.
pub fn reset_all_for_tests() {
    filesystem().breaker().reset();
    network().breaker().reset();
    config_loader().breaker().reset();
}
