// Resilience substrate: circuit breakers, retries, and their composition.
// All fallible external I/O in the engine goes through a ResilientExecutor.

pub mod circuit_breaker;
pub mod executor;
pub mod retry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitBreakerStats, CircuitState,
};
pub use executor::{
    config_loader, filesystem, network, reset_all_for_tests, ResilientExecutor, BREAKER_REGISTRY,
};
pub use retry::{is_retryable_default, Retrier, RetryConfig, RetryPredicate};
