//! Error types for the resilience layer

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for operations routed through the resilience layer
pub type Result<T> = std::result::Result<T, GuardError>;

/// Failure surface of wrapped operations, plus the layer's own error kinds.
///
/// Wrapped operations (connector calls, HTTP requests, similar I/O) report
/// their failures through this enum; the retry filter and the error
/// classification both operate on its [`ErrorKind`] tag. `CircuitOpen` is
/// the one kind a caller can observe without the operation ever having been
/// attempted.
#[derive(Error, Debug, Clone)]
pub enum GuardError {
    /// Connection could not be established or was lost
    #[error("Connection error: {0}")]
    Connection(String),

    /// Operation exceeded its deadline
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Downstream throttled the caller
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(String),

    /// Malformed response or unexpected wire-level behavior
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation was cancelled
    #[error("Operation was cancelled")]
    Cancelled,

    /// A circuit breaker rejected the call before the operation ran
    #[error("Circuit breaker '{name}' is open; retry after {retry_after:?}")]
    CircuitOpen {
        name: String,
        retry_after: Duration,
    },

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

impl GuardError {
    /// Create a new connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a new timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    /// Create a new rate-limit error
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited(message.into())
    }

    /// Create a new protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// The tag identifying this error's kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection(_) => ErrorKind::Connection,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::Io(_) => ErrorKind::Io,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Config(_) => ErrorKind::Config,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            Self::Other(_) => ErrorKind::Other,
        }
    }

    /// Recovery classification of this error
    pub fn class(&self) -> ErrorClass {
        self.kind().class()
    }
}

impl From<std::io::Error> for GuardError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

/// Tag enum mirroring [`GuardError`]'s variants.
///
/// Retry filters are declared over these tags so "is this retryable" stays a
/// pure function of the tag, independent of the error's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Connection,
    Timeout,
    RateLimited,
    Io,
    Protocol,
    InvalidInput,
    Config,
    Cancelled,
    CircuitOpen,
    Other,
}

impl ErrorKind {
    /// Classify this kind for recovery decisions.
    ///
    /// `CircuitOpen` is deliberately permanent: a retry layer wrapped around
    /// a breaker must not hammer a circuit that is already rejecting calls.
    pub fn class(self) -> ErrorClass {
        match self {
            Self::Connection | Self::Timeout | Self::RateLimited | Self::Io => {
                ErrorClass::Transient
            }
            Self::InvalidInput | Self::Config | Self::Cancelled | Self::CircuitOpen => {
                ErrorClass::Permanent
            }
            Self::Protocol | Self::Other => ErrorClass::Unknown,
        }
    }
}

/// Error classification for recovery decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient errors that may succeed on retry
    Transient,
    /// Permanent errors that will not succeed on retry
    Permanent,
    /// Unknown errors - retry only when the caller opted in
    Unknown,
}
