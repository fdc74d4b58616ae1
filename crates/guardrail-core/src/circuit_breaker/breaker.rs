//! Circuit breaker implementation

use std::future::Future;

use parking_lot::Mutex;
use tokio::time::Instant;

use super::types::{CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState};
use crate::error::{GuardError, Result};

/// Circuit breaker for protecting against failing dependencies.
///
/// One instance guards one named downstream dependency. All state lives
/// behind a single mutex; the admit check and the outcome recording are
/// each a critical section, and the lock is never held while the wrapped
/// operation is awaited, so concurrent callers through the same breaker
/// are not serialized behind downstream I/O.
pub struct CircuitBreaker {
    /// Dependency name (for logging and metrics)
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    /// Consecutive failures while closed
    failure_count: u32,
    /// Consecutive successes while half-open
    success_count: u32,
    /// Calls admitted since entering half-open
    half_open_calls: u32,
    /// Set on every transition into open; gates the half-open probe
    last_failure_time: Option<Instant>,
    total_calls: u64,
    total_successes: u64,
    total_failures: u64,
    state_changes: Vec<(Instant, CircuitState)>,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            half_open_calls: 0,
            last_failure_time: None,
            total_calls: 0,
            total_successes: 0,
            total_failures: 0,
            state_changes: Vec::new(),
        }
    }

    fn transition_to(&mut self, name: &str, new_state: CircuitState) {
        if self.state == new_state {
            return;
        }

        match new_state {
            CircuitState::Open => tracing::warn!(
                circuit = %name,
                from = %self.state,
                failures = self.failure_count,
                "circuit breaker opened"
            ),
            CircuitState::HalfOpen => tracing::info!(
                circuit = %name,
                "circuit breaker entering half-open"
            ),
            CircuitState::Closed => tracing::info!(
                circuit = %name,
                "circuit breaker closed"
            ),
        }

        self.state = new_state;
        self.state_changes.push((Instant::now(), new_state));

        match new_state {
            CircuitState::Open => {
                self.last_failure_time = Some(Instant::now());
            }
            CircuitState::HalfOpen => {
                self.half_open_calls = 0;
                self.success_count = 0;
            }
            CircuitState::Closed => {
                self.failure_count = 0;
                self.success_count = 0;
            }
        }
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default config
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: CircuitBreakerConfig::default(),
            inner: Mutex::new(BreakerState::new()),
        }
    }

    /// Create a new circuit breaker with custom config.
    ///
    /// Fails fast on an invalid config rather than surfacing the problem
    /// mid-call.
    pub fn with_config(name: impl Into<String>, config: CircuitBreakerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerState::new()),
        })
    }

    /// Get the dependency name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the current state, without side effects.
    ///
    /// The open-to-half-open transition happens inside [`call`](Self::call),
    /// never here.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Execute an operation through the circuit breaker.
    ///
    /// Counts the call, routes it according to the current state, then
    /// invokes the operation and records the outcome. A rejected call fails
    /// with [`GuardError::CircuitOpen`] carrying the remaining wait; the
    /// operation's own error is always re-raised unchanged.
    pub async fn call<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.admit()?;

        match operation().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(error) => {
                self.on_failure(&error);
                Err(error)
            }
        }
    }

    /// Get a snapshot of the breaker's counters
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.inner.lock();
        let success_rate = if inner.total_calls > 0 {
            inner.total_successes as f64 / inner.total_calls as f64
        } else {
            0.0
        };

        CircuitBreakerMetrics {
            name: self.name.clone(),
            state: inner.state,
            total_calls: inner.total_calls,
            total_successes: inner.total_successes,
            total_failures: inner.total_failures,
            failure_count: inner.failure_count,
            success_rate,
            last_failure_time: inner.last_failure_time,
        }
    }

    /// Chronological log of state transitions
    pub fn state_changes(&self) -> Vec<(Instant, CircuitState)> {
        self.inner.lock().state_changes.clone()
    }

    /// Manually force the breaker back to closed.
    ///
    /// Operator override, not a normal transition: transient counters and
    /// the reopen gate are cleared; cumulative totals and the transition
    /// log survive.
    pub fn reset(&self) {
        tracing::info!(circuit = %self.name, "manually resetting circuit breaker");
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.half_open_calls = 0;
        inner.last_failure_time = None;
    }

    /// Count the call and decide whether it may proceed.
    fn admit(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.total_calls += 1;

        if inner.state == CircuitState::Open {
            let elapsed = inner.last_failure_time.map(|opened| opened.elapsed());
            match elapsed {
                Some(elapsed) if elapsed >= self.config.reset_timeout => {
                    inner.transition_to(&self.name, CircuitState::HalfOpen);
                }
                _ => {
                    let retry_after = elapsed
                        .map(|elapsed| self.config.reset_timeout.saturating_sub(elapsed))
                        .unwrap_or(self.config.reset_timeout);
                    return Err(GuardError::CircuitOpen {
                        name: self.name.clone(),
                        retry_after,
                    });
                }
            }
        }

        if inner.state == CircuitState::HalfOpen {
            if inner.half_open_calls >= self.config.half_open_max_calls {
                // Probe budget exhausted without recovery: reopen and
                // reject without attempting the call.
                inner.transition_to(&self.name, CircuitState::Open);
                return Err(GuardError::CircuitOpen {
                    name: self.name.clone(),
                    retry_after: self.config.reset_timeout,
                });
            }
            inner.half_open_calls += 1;
        }

        Ok(())
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock();
        inner.total_successes += 1;
        inner.failure_count = 0;

        if inner.state == CircuitState::HalfOpen {
            inner.success_count += 1;
            if inner.success_count >= self.config.success_threshold {
                inner.transition_to(&self.name, CircuitState::Closed);
            }
        }
    }

    fn on_failure(&self, error: &GuardError) {
        let mut inner = self.inner.lock();
        inner.total_failures += 1;
        inner.failure_count += 1;

        tracing::error!(
            circuit = %self.name,
            state = %inner.state,
            failures = inner.failure_count,
            error = %error,
            "operation failed through circuit breaker"
        );

        if inner.state == CircuitState::HalfOpen {
            // A single failure while probing reopens the circuit.
            inner.transition_to(&self.name, CircuitState::Open);
        } else if inner.failure_count >= self.config.failure_threshold {
            inner.transition_to(&self.name, CircuitState::Open);
        }
    }
}
