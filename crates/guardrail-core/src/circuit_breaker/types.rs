//! Circuit breaker types and configuration

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::{GuardError, Result};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, operations proceed normally
    Closed,
    /// Circuit is open, operations are rejected
    Open,
    /// Circuit is half-open, limited operations allowed to test recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Time to wait before transitioning from open to half-open
    #[serde(with = "humantime_serde")]
    pub reset_timeout: Duration,
    /// Maximum calls admitted in half-open state before forcing open again
    pub half_open_max_calls: u32,
    /// Consecutive successes needed in half-open state to close
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
            half_open_max_calls: 3,
            success_threshold: 2,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a config for aggressive circuit breaking
    pub fn aggressive() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(15),
            half_open_max_calls: 1,
            success_threshold: 2,
        }
    }

    /// Create a config for lenient circuit breaking
    pub fn lenient() -> Self {
        Self {
            failure_threshold: 10,
            reset_timeout: Duration::from_secs(120),
            half_open_max_calls: 5,
            success_threshold: 5,
        }
    }

    /// Validate the configuration, rejecting thresholds that can never fire.
    pub fn validate(&self) -> Result<()> {
        if self.failure_threshold < 1 {
            return Err(GuardError::config("failure_threshold must be at least 1"));
        }
        if self.success_threshold < 1 {
            return Err(GuardError::config("success_threshold must be at least 1"));
        }
        if self.half_open_max_calls < 1 {
            return Err(GuardError::config("half_open_max_calls must be at least 1"));
        }
        Ok(())
    }
}

/// Point-in-time snapshot of a circuit breaker's counters
#[derive(Debug, Clone)]
pub struct CircuitBreakerMetrics {
    pub name: String,
    pub state: CircuitState,
    pub total_calls: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    /// Consecutive failures in the current window
    pub failure_count: u32,
    /// `total_successes / total_calls`, 0.0 when no calls were made
    pub success_rate: f64,
    /// When the circuit last transitioned into open
    pub last_failure_time: Option<Instant>,
}
