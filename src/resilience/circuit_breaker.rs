//! # Circuit Breaker
//!
//! Wraps fallible operations against a downstream dependency so that
//! persistent failure trips to fast-failure instead of cascading timeouts,
//! with automatic probing for recovery.
//!
//! ## State Transitions
//!
//! ```text
//! ┌─────────┐
//! │ CLOSED  │ ◄──────────┐
//! └────┬────┘            │
//!      │                 │
//!      │ Failures >= MaxFailures
//!      │                 │
//!      ▼                 │
//! ┌─────────┐       Probe success
//! │  OPEN   │            │
//! └────┬────┘            │
//!      │                 │
//!      │ After Timeout   │
//!      │                 │
//!      ▼                 │
//! ┌──────────┐           │
//! │HALF-OPEN │───────────┘
//! └──────────┘
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, operations pass through
    Closed,
    /// Circuit is open, operations fail immediately
    Open,
    /// Circuit is half-open, probing whether the dependency recovered
    HalfOpen,
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub max_failures: u32,
    /// Duration to wait in Open before admitting a probe
    pub timeout: Duration,
    /// Maximum concurrent operations admitted in HalfOpen
    pub max_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            timeout: Duration::from_secs(30),
            max_requests: 1,
        }
    }
}

/// Snapshot of a breaker's counters and state
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub last_failure_at: Option<Instant>,
    pub last_transition_at: Option<Instant>,
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub rejected_calls: u64,
}

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_in_flight: u32,
    opened_at: Option<Instant>,
    last_failure_at: Option<Instant>,
    last_transition_at: Option<Instant>,
    config: CircuitBreakerConfig,
}

enum Admission {
    /// Admitted while Closed
    Normal,
    /// Admitted as a HalfOpen probe; must release the probe slot
    Probe,
}

/// Circuit breaker guarding one logical dependency.
///
/// Admitted calls return the wrapped operation's error unchanged; the
/// breaker only injects `CircuitOpen` when it rejects an operation itself.
/// Deadlines belong to the caller, not the breaker.
pub struct CircuitBreaker {
    name: String,
    inner: Arc<RwLock<BreakerInner>>,
    total_calls: Arc<AtomicU64>,
    successful_calls: Arc<AtomicU64>,
    failed_calls: Arc<AtomicU64>,
    rejected_calls: Arc<AtomicU64>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(RwLock::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                half_open_in_flight: 0,
                opened_at: None,
                last_failure_at: None,
                last_transition_at: None,
                config,
            })),
            total_calls: Arc::new(AtomicU64::new(0)),
            successful_calls: Arc::new(AtomicU64::new(0)),
            failed_calls: Arc::new(AtomicU64::new(0)),
            rejected_calls: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.inner.read().state
    }

    /// Execute an operation through the breaker.
    ///
    /// While Open the operation is not invoked at all and the call fails
    /// with `EngineError::CircuitOpen` carrying the breaker name.
    pub async fn call<F, T>(&self, op: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.total_calls.fetch_add(1, Ordering::Relaxed);

        let admission = match self.try_admit() {
            Some(a) => a,
            None => {
                self.rejected_calls.fetch_add(1, Ordering::Relaxed);
                return Err(EngineError::CircuitOpen(self.name.clone()));
            }
        };

        let result = op.await;
        match &result {
            Ok(_) => self.on_success(&admission),
            Err(_) => self.on_failure(&admission),
        }
        result
    }

    fn try_admit(&self) -> Option<Admission> {
        let mut inner = self.inner.write();
        match inner.state {
            CircuitState::Closed => Some(Admission::Normal),
            CircuitState::Open => {
                let expired = inner
                    .opened_at
                    .map_or(false, |t| t.elapsed() >= inner.config.timeout);
                if expired {
                    info!("Circuit breaker '{}' transitioning to HALF-OPEN", self.name);
                    inner.state = CircuitState::HalfOpen;
                    inner.last_transition_at = Some(Instant::now());
                    inner.half_open_in_flight = 1;
                    Some(Admission::Probe)
                } else {
                    None
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_in_flight < inner.config.max_requests {
                    inner.half_open_in_flight += 1;
                    Some(Admission::Probe)
                } else {
                    None
                }
            }
        }
    }

    fn on_success(&self, admission: &Admission) {
        self.successful_calls.fetch_add(1, Ordering::Relaxed);

        let mut inner = self.inner.write();
        inner.consecutive_failures = 0;
        if let Admission::Probe = admission {
            inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
        }
        if inner.state == CircuitState::HalfOpen {
            info!("Circuit breaker '{}' transitioning to CLOSED", self.name);
            inner.state = CircuitState::Closed;
            inner.opened_at = None;
            inner.half_open_in_flight = 0;
            inner.last_transition_at = Some(Instant::now());
        }
    }

    fn on_failure(&self, admission: &Admission) {
        self.failed_calls.fetch_add(1, Ordering::Relaxed);

        let mut inner = self.inner.write();
        inner.consecutive_failures += 1;
        inner.last_failure_at = Some(Instant::now());
        if let Admission::Probe = admission {
            inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
        }

        match inner.state {
            CircuitState::Closed => {
                if inner.consecutive_failures >= inner.config.max_failures {
                    warn!(
                        "Circuit breaker '{}' transitioning to OPEN (failures: {})",
                        self.name, inner.consecutive_failures
                    );
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    inner.last_transition_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen => {
                warn!(
                    "Circuit breaker '{}' transitioning back to OPEN from HALF-OPEN",
                    self.name
                );
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.half_open_in_flight = 0;
                inner.last_transition_at = Some(Instant::now());
            }
            CircuitState::Open => {
                // Late probe result after another probe re-opened; stay open
            }
        }
    }

    /// Force the breaker back to Closed and clear all counters.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.half_open_in_flight = 0;
        inner.opened_at = None;
        inner.last_failure_at = None;
        inner.last_transition_at = Some(Instant::now());
        drop(inner);

        self.total_calls.store(0, Ordering::Relaxed);
        self.successful_calls.store(0, Ordering::Relaxed);
        self.failed_calls.store(0, Ordering::Relaxed);
        self.rejected_calls.store(0, Ordering::Relaxed);

        debug!("Circuit breaker '{}' reset to CLOSED", self.name);
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.inner.read();
        CircuitBreakerStats {
            name: self.name.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            last_failure_at: inner.last_failure_at,
            last_transition_at: inner.last_transition_at,
            total_calls: self.total_calls.load(Ordering::Relaxed),
            successful_calls: self.successful_calls.load(Ordering::Relaxed),
            failed_calls: self.failed_calls.load(Ordering::Relaxed),
            rejected_calls: self.rejected_calls.load(Ordering::Relaxed),
        }
    }
}

impl Clone for CircuitBreaker {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            inner: Arc::clone(&self.inner),
            total_calls: Arc::clone(&self.total_calls),
            successful_calls: Arc::clone(&self.successful_calls),
            failed_calls: Arc::clone(&self.failed_calls),
            rejected_calls: Arc::clone(&self.rejected_calls),
        }
    }
}

/// Registry of breakers keyed by dependency name.
///
/// All callers of the same dependency share one breaker; clones share
/// internal state.
pub struct CircuitBreakerRegistry {
    breakers: RwLock<HashMap<String, CircuitBreaker>>,
    default_config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            default_config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }

    pub fn get_or_create(&self, name: &str) -> CircuitBreaker {
        {
            let breakers = self.breakers.read();
            if let Some(breaker) = breakers.get(name) {
                return breaker.clone();
            }
        }

        let mut breakers = self.breakers.write();

        // Double-check after acquiring write lock
        if let Some(breaker) = breakers.get(name) {
            return breaker.clone();
        }

        let breaker = CircuitBreaker::new(name, self.default_config.clone());
        breakers.insert(name.to_string(), breaker.clone());
        info!("Created circuit breaker: {}", name);

        breaker
    }

    pub fn register(&self, name: &str, config: CircuitBreakerConfig) -> CircuitBreaker {
        let mut breakers = self.breakers.write();
        let breaker = CircuitBreaker::new(name, config);
        breakers.insert(name.to_string(), breaker.clone());
        info!("Registered circuit breaker: {}", name);
        breaker
    }

    pub fn get(&self, name: &str) -> Option<CircuitBreaker> {
        self.breakers.read().get(name).cloned()
    }

    pub fn remove(&self, name: &str) -> Option<CircuitBreaker> {
        let removed = self.breakers.write().remove(name);
        if removed.is_some() {
            info!("Removed circuit breaker: {}", name);
        }
        removed
    }

    pub fn clear(&self) {
        self.breakers.write().clear();
    }

    pub fn count(&self) -> usize {
        self.breakers.read().len()
    }

    pub fn all_stats(&self) -> Vec<CircuitBreakerStats> {
        self.breakers
            .read()
            .values()
            .map(|breaker| breaker.stats())
            .collect()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
