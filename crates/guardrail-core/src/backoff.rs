//! Backoff strategies for retry operations
//!
//! Provides configurable backoff algorithms for handling transient failures.

use std::time::Duration;

use rand::Rng;

/// Jitter multiplies the capped delay by a uniform factor in this range.
const JITTER_MIN: f64 = 0.5;
const JITTER_MAX: f64 = 1.5;

/// Configuration for backoff behavior
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Add random jitter to prevent thundering herd
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Backoff strategy trait
pub trait BackoffStrategy: Send + Sync {
    /// Get the delay for the given attempt number (0-indexed)
    fn delay_for_attempt(&self, attempt: u32) -> Duration;
}

/// Exponential backoff with optional jitter.
///
/// The raw delay is `initial_delay * multiplier^attempt`, capped at
/// `max_delay`. Jitter is applied after capping, so a jittered delay can
/// exceed `max_delay` by up to 50%.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    config: BackoffConfig,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff with default config
    pub fn new() -> Self {
        Self::with_config(BackoffConfig::default())
    }

    /// Create a new exponential backoff with custom config
    pub fn with_config(config: BackoffConfig) -> Self {
        Self { config }
    }

    fn add_jitter(&self, delay: Duration) -> Duration {
        if !self.config.jitter {
            return delay;
        }

        let factor = rand::thread_rng().gen_range(JITTER_MIN..=JITTER_MAX);
        Duration::from_secs_f64(delay.as_secs_f64() * factor)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new()
    }
}

impl BackoffStrategy for ExponentialBackoff {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let raw_delay =
            self.config.initial_delay.as_secs_f64() * self.config.multiplier.powi(attempt as i32);

        let capped = raw_delay.min(self.config.max_delay.as_secs_f64());

        self.add_jitter(Duration::from_secs_f64(capped))
    }
}

/// Constant backoff - same delay for all attempts
#[derive(Debug, Clone)]
pub struct ConstantBackoff {
    delay: Duration,
}

impl ConstantBackoff {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl BackoffStrategy for ConstantBackoff {
    fn delay_for_attempt(&self, _attempt: u32) -> Duration {
        self.delay
    }
}
