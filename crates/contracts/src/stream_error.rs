//! Stream error taxonomy
//!
//! Transports classify every failure before surfacing it: a retryable error
//! means the transport is already re-establishing the link, a fatal error
//! means it has given up.

use std::fmt;

use thiserror::Error;

/// Close frame received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseEvent {
    pub code: u16,
    pub reason: String,
}

impl CloseEvent {
    /// RFC 6455 "policy violation". The traffic controller closes slow
    /// consumers with this code.
    pub const POLICY_VIOLATION: u16 = 1008;

    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    pub fn is_policy_violation(&self) -> bool {
        self.code == Self::POLICY_VIOLATION
    }
}

impl fmt::Display for CloseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "close {}", self.code)
        } else {
            write!(f, "close {} ({})", self.code, self.reason)
        }
    }
}

/// Error surfaced on a transport's error channel.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StreamError {
    /// Recoverable; the transport keeps (or resumes) delivering.
    #[error("retryable stream error: {message}")]
    Retryable {
        message: String,
        /// Close frame that ended the previous connection, if any
        cause: Option<CloseEvent>,
    },

    /// The transport will not deliver anything further.
    #[error("fatal stream error: {message}")]
    Fatal { message: String },
}

impl StreamError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self::Retryable {
            message: message.into(),
            cause: None,
        }
    }

    pub fn closed(event: CloseEvent) -> Self {
        Self::Retryable {
            message: format!("connection closed by server: {event}"),
            cause: Some(event),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }
}
