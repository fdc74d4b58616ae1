//! Retry policies and utilities for handling transient failures
//!
//! Provides configurable retry behavior with exponential backoff, a
//! declarative filter over which error kinds are worth reattempting, and
//! cooperative cancellation of the delay between attempts.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::backoff::{BackoffConfig, BackoffStrategy, ExponentialBackoff};
use crate::error::{ErrorClass, ErrorKind, GuardError, Result};

/// Which errors should trigger a retry
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryOn {
    /// Retry on all errors
    All,
    /// Retry only on errors classified as transient
    Transient,
    /// Retry only on the listed error kinds
    Kinds(Vec<ErrorKind>),
    /// Custom retry predicate
    #[serde(skip)]
    Custom(Arc<dyn Fn(&GuardError) -> bool + Send + Sync>),
}

impl RetryOn {
    /// Check if an error should be retried
    pub fn should_retry(&self, error: &GuardError) -> bool {
        match self {
            RetryOn::All => true,
            RetryOn::Transient => error.class() == ErrorClass::Transient,
            RetryOn::Kinds(kinds) => kinds.contains(&error.kind()),
            RetryOn::Custom(predicate) => predicate(error),
        }
    }
}

impl Default for RetryOn {
    fn default() -> Self {
        RetryOn::All
    }
}

impl fmt::Debug for RetryOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryOn::All => write!(f, "RetryOn::All"),
            RetryOn::Transient => write!(f, "RetryOn::Transient"),
            RetryOn::Kinds(kinds) => write!(f, "RetryOn::Kinds({kinds:?})"),
            RetryOn::Custom(_) => write!(f, "RetryOn::Custom(<predicate>)"),
        }
    }
}

/// Configuration for retry behavior
///
/// # Example
/// ```
/// use guardrail_core::retry::RetryConfig;
/// use std::time::Duration;
///
/// let config = RetryConfig::default()
///     .with_max_attempts(5)
///     .with_initial_delay(Duration::from_millis(200))
///     .with_max_delay(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first call
    pub max_attempts: u32,
    /// Delay before the first retry
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,
    /// Maximum delay between retries
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    /// Base for the exponential backoff calculation
    pub exponential_base: f64,
    /// Add random jitter to prevent thundering herd
    #[serde(default = "default_jitter")]
    pub jitter: bool,
    /// Which error kinds trigger a retry
    #[serde(default)]
    pub retry_on: RetryOn,
}

fn default_jitter() -> bool {
    true
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_base: 2.0,
            jitter: true,
            retry_on: RetryOn::All,
        }
    }
}

impl RetryConfig {
    /// Create a new RetryConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config with a custom attempt budget
    pub fn limited(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Create a config for network operations
    pub fn for_network() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            exponential_base: 2.0,
            jitter: true,
            retry_on: RetryOn::Transient,
        }
    }

    /// Create a config for storage operations
    pub fn for_storage() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            exponential_base: 2.0,
            jitter: true,
            retry_on: RetryOn::Kinds(vec![
                ErrorKind::Connection,
                ErrorKind::Timeout,
                ErrorKind::Io,
            ]),
        }
    }

    /// Set max attempts
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }

    /// Set the delay before the first retry
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay between retries
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the exponential base
    pub fn with_exponential_base(mut self, base: f64) -> Self {
        self.exponential_base = base;
        self
    }

    /// Enable or disable jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Set the retry filter
    pub fn with_retry_on(mut self, retry_on: RetryOn) -> Self {
        self.retry_on = retry_on;
        self
    }

    /// Validate the configuration, rejecting values that make the retry
    /// loop meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts < 1 {
            return Err(GuardError::config("max_attempts must be at least 1"));
        }
        if !self.exponential_base.is_finite() || self.exponential_base <= 0.0 {
            return Err(GuardError::config(
                "exponential_base must be a positive finite number",
            ));
        }
        Ok(())
    }

    /// Convert to BackoffConfig for use with backoff strategies
    pub fn to_backoff_config(&self) -> BackoffConfig {
        BackoffConfig {
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            multiplier: self.exponential_base,
            jitter: self.jitter,
        }
    }

    /// Create an ExponentialBackoff from this config
    pub fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::with_config(self.to_backoff_config())
    }
}

/// Retry policy for operations
///
/// Stateless executor bound to one validated [`RetryConfig`]; every call to
/// [`execute`](Self::execute) runs an independent attempt sequence.
pub struct RetryPolicy {
    config: RetryConfig,
    backoff: Box<dyn BackoffStrategy>,
}

impl RetryPolicy {
    /// Create a new retry policy with default config and exponential backoff
    pub fn new() -> Self {
        let config = RetryConfig::default();
        let backoff = config.create_backoff();
        Self {
            config,
            backoff: Box::new(backoff),
        }
    }

    /// Create a new retry policy with custom config.
    ///
    /// Fails fast on an invalid config rather than surfacing the problem
    /// mid-call.
    pub fn with_config(config: RetryConfig) -> Result<Self> {
        config.validate()?;
        let backoff = config.create_backoff();
        Ok(Self {
            config,
            backoff: Box::new(backoff),
        })
    }

    /// Set custom backoff strategy
    pub fn with_backoff<B: BackoffStrategy + 'static>(mut self, backoff: B) -> Self {
        self.backoff = Box::new(backoff);
        self
    }

    /// The configuration this policy executes under
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an operation with retries.
    ///
    /// The operation is attempted up to `max_attempts` times. A success
    /// returns immediately; an error not matched by the retry filter
    /// propagates immediately; a retryable error on the final attempt
    /// propagates as-is. The delay between attempts is a suspension point:
    /// cancelling `cancel` during it (or before an attempt) aborts the loop
    /// with [`GuardError::Cancelled`].
    pub async fn execute<T, F, Fut>(
        &self,
        mut operation: F,
        cancel: Option<CancellationToken>,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;

        loop {
            if let Some(token) = &cancel {
                if token.is_cancelled() {
                    return Err(GuardError::Cancelled);
                }
            }

            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !self.config.retry_on.should_retry(&error) {
                        return Err(error);
                    }

                    if attempt + 1 >= self.config.max_attempts {
                        tracing::error!(
                            attempts = self.config.max_attempts,
                            error = %error,
                            "all retry attempts failed"
                        );
                        return Err(error);
                    }

                    let delay = self.backoff.delay_for_attempt(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = self.config.max_attempts,
                        delay = ?delay,
                        error = %error,
                        "attempt failed; retrying"
                    );
                    attempt += 1;

                    match &cancel {
                        Some(token) => {
                            tokio::select! {
                                _ = token.cancelled() => return Err(GuardError::Cancelled),
                                _ = sleep(delay) => {}
                            }
                        }
                        None => sleep(delay).await,
                    }
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience function to retry an async operation with a default config
pub async fn retry<T, F, Fut>(
    max_attempts: u32,
    operation: F,
    cancel: Option<CancellationToken>,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let policy = RetryPolicy::with_config(RetryConfig::limited(max_attempts))?;
    policy.execute(operation, cancel).await
}

/// Retry with custom config
pub async fn retry_with_config<T, F, Fut>(
    config: RetryConfig,
    operation: F,
    cancel: Option<CancellationToken>,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let policy = RetryPolicy::with_config(config)?;
    policy.execute(operation, cancel).await
}
