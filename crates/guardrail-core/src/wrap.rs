//! Adapters that bundle an operation with its resilience policy
//!
//! Call-sites that wrap the same operation repeatedly construct one of these
//! once instead of re-assembling a policy or breaker at every invocation.
//! The breaker handle stays reachable through [`GuardedOperation::breaker`]
//! so surrounding code can inspect or reset it.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::error::Result;
use crate::retry::{RetryConfig, RetryPolicy};

/// An operation bundled with a retry configuration.
///
/// Every [`call`](Self::call) builds a fresh [`RetryPolicy`], so each
/// invocation gets an independent attempt sequence; nothing carries over
/// between calls.
pub struct RetryingOperation<F> {
    config: RetryConfig,
    operation: F,
}

/// Wrap an operation so every call runs under the given retry config.
///
/// The config is validated here, not at call time.
pub fn with_retry<F>(config: RetryConfig, operation: F) -> Result<RetryingOperation<F>> {
    config.validate()?;
    Ok(RetryingOperation { config, operation })
}

impl<F> RetryingOperation<F> {
    /// Invoke the operation with an independent retry sequence
    pub async fn call<T, Fut>(&mut self) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let policy = RetryPolicy::with_config(self.config.clone())?;
        policy.execute(&mut self.operation, None).await
    }

    /// The retry configuration applied on every call
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

/// An operation bundled with the circuit breaker guarding it.
///
/// One breaker is constructed at wrap time and shared by every call: the
/// breaker models one logical dependency, not one invocation.
pub struct GuardedOperation<F> {
    breaker: Arc<CircuitBreaker>,
    operation: F,
}

/// Wrap an operation behind a named circuit breaker.
pub fn with_circuit_breaker<F>(
    name: impl Into<String>,
    config: CircuitBreakerConfig,
    operation: F,
) -> Result<GuardedOperation<F>> {
    let breaker = Arc::new(CircuitBreaker::with_config(name, config)?);
    Ok(GuardedOperation { breaker, operation })
}

impl<F> GuardedOperation<F> {
    /// Invoke the operation through the shared breaker
    pub async fn call<T, Fut>(&mut self) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let Self { breaker, operation } = self;
        breaker.call(|| operation()).await
    }

    /// Handle to the underlying breaker, for inspection or manual reset
    pub fn breaker(&self) -> Arc<CircuitBreaker> {
        Arc::clone(&self.breaker)
    }
}

/// Execute an operation with retries, each attempt routed through the
/// circuit breaker.
///
/// The operation must be re-invocable (`Fn`): every retry attempt asks the
/// breaker for admission again, so an open circuit surfaces as
/// [`GuardError::CircuitOpen`](crate::GuardError::CircuitOpen) to the retry
/// filter instead of hammering the dependency.
pub async fn retry_with_circuit_breaker<T, F, Fut>(
    policy: &RetryPolicy,
    breaker: &CircuitBreaker,
    operation: F,
    cancel: Option<CancellationToken>,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    policy.execute(|| breaker.call(&operation), cancel).await
}
