//! Terminal status codes and the trailer status type.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status code attached to a stream trailer.
///
/// The set mirrors the subset of RPC codes the capture engine actually
/// emits, plus the transport-level codes agents report mid-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Code {
    /// Graceful completion.
    Ok,
    /// Malformed or invalid request content.
    InvalidArgument,
    /// The request is valid but cannot be served (disabled variant, no targets).
    FailedPrecondition,
    /// Token verification denied the request.
    PermissionDenied,
    /// The remote endpoint is unreachable or went away.
    Unavailable,
    /// The remote endpoint reported an internal failure.
    Internal,
    /// Unclassified failure.
    Unknown,
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Ok => "OK",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::Unavailable => "UNAVAILABLE",
            Self::Internal => "INTERNAL",
            Self::Unknown => "UNKNOWN",
        };
        write!(f, "{name}")
    }
}

/// Terminal status delivered as the last frame of a capture stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct Status {
    /// Status code.
    pub code: Code,
    /// Human-readable diagnostic.
    pub message: String,
}

impl Status {
    /// Create a status from a code and message.
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Graceful completion status.
    #[must_use]
    pub fn ok() -> Self {
        Self::new(Code::Ok, "")
    }

    /// `INVALID_ARGUMENT` status.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    /// `FAILED_PRECONDITION` status.
    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(Code::FailedPrecondition, message)
    }

    /// `PERMISSION_DENIED` status.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(Code::PermissionDenied, message)
    }

    /// `UNAVAILABLE` status.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }

    /// `UNKNOWN` status.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(Code::Unknown, message)
    }

    /// `INTERNAL` status.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }

    /// Whether this status is `OK`.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.code == Code::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let status = Status::unavailable("agent went away");
        assert_eq!(status.to_string(), "UNAVAILABLE: agent went away");
        assert_eq!(Status::ok().to_string(), "OK: ");
    }

    #[test]
    fn test_is_ok() {
        assert!(Status::ok().is_ok());
        assert!(!Status::unknown("boom").is_ok());
    }
}
