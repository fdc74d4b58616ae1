//! Resilience control layer for fallible operations
//!
//! Guardrail wraps arbitrary fallible operations (network calls, connector
//! I/O) in two independent, composable primitives:
//!
//! - [`CircuitBreaker`] - tracks the health of a named downstream dependency
//!   through a closed / open / half-open state machine and rejects calls
//!   fast while the dependency is presumed unavailable.
//! - [`RetryPolicy`] - re-invokes an operation with exponentially
//!   increasing, jittered delay, filtering which error kinds are worth
//!   reattempting.
//!
//! The two compose by one wrapping the other's invocation; see
//! [`wrap::retry_with_circuit_breaker`] for the retry-over-breaker shape.
//!
//! ## Modules
//!
//! - [`error`] - error taxonomy, kind tags, and recovery classification
//! - [`backoff`] - backoff strategies and delay math
//! - [`retry`] - retry configuration, filter, and policy
//! - [`circuit_breaker`] - the breaker state machine and its metrics
//! - [`wrap`] - adapters bundling an operation with its policy or breaker
//!
//! ## Example
//!
//! ```
//! use guardrail_core::{CircuitBreaker, GuardError, RetryConfig, RetryPolicy};
//!
//! # async fn example() -> Result<String, GuardError> {
//! let breaker = CircuitBreaker::new("metadata-store");
//! let policy = RetryPolicy::with_config(RetryConfig::for_network())?;
//!
//! let value = policy
//!     .execute(|| breaker.call(|| async { Ok("ready".to_string()) }), None)
//!     .await?;
//! # Ok(value)
//! # }
//! ```

pub mod backoff;
pub mod circuit_breaker;
pub mod error;
pub mod retry;
pub mod wrap;

pub use backoff::{BackoffConfig, BackoffStrategy, ConstantBackoff, ExponentialBackoff};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState,
};
pub use error::{ErrorClass, ErrorKind, GuardError, Result};
pub use retry::{RetryConfig, RetryOn, RetryPolicy, retry, retry_with_config};
pub use wrap::{
    GuardedOperation, RetryingOperation, retry_with_circuit_breaker, with_circuit_breaker,
    with_retry,
};
