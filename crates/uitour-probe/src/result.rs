//! Result and error types for uitour-probe.

use thiserror::Error;

/// Result type for harness operations
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Errors that can occur while driving a tour test
///
/// Errors are `Clone` because a single settled outcome is handed to every
/// observer of a [`Promise`](crate::Promise).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// A polled predicate raised a fault
    #[error("Condition check failed: {message}")]
    ConditionFault {
        /// Fault description
        message: String,
    },

    /// A poll exhausted its retry bound
    #[error("{message}")]
    Timeout {
        /// Caller-supplied failure message
        message: String,
    },

    /// A panel event did not fire before the timeout
    #[error("{message}")]
    PanelEventTimeout {
        /// Event that was awaited
        event: String,
        /// Fixed timeout message
        message: String,
    },

    /// Assertion failed
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// The host collaborator reported a failure
    #[error("Host error: {message}")]
    Host {
        /// Error message
        message: String,
    },

    /// Invalid state error (operation called in wrong phase)
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },
}

impl ProbeError {
    /// Create a condition fault
    #[must_use]
    pub fn fault(message: impl Into<String>) -> Self {
        Self::ConditionFault {
            message: message.into(),
        }
    }

    /// Create a poll timeout carrying the caller's message
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create a host failure
    #[must_use]
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host {
            message: message.into(),
        }
    }

    /// Whether this error came from an exhausted bound rather than a fault
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::PanelEventTimeout { .. })
    }
}

impl From<serde_yaml_ng::Error> for ProbeError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ProbeError {
    fn from(err: std::io::Error) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}
