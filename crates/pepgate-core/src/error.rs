//! Shared error type across pepgate crates.

use thiserror::Error;

/// Stable error codes (API surface for integration layers).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// PDP response without a valid decision.
    MalformedDecision,
    /// Structurally broken content-filter constraint.
    ContentViolation,
    /// An obligation no provider claimed.
    UnhandledObligations,
    /// Access denied by decision or gate.
    AccessDenied,
    /// PDP unreachable.
    Transport,
    /// Invalid input / configuration.
    BadRequest,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Error raised by the protected producer.
    Upstream,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::MalformedDecision => "MALFORMED_DECISION",
            ErrorCode::ContentViolation => "CONTENT_VIOLATION",
            ErrorCode::UnhandledObligations => "UNHANDLED_OBLIGATIONS",
            ErrorCode::AccessDenied => "ACCESS_DENIED",
            ErrorCode::Transport => "TRANSPORT",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Upstream => "UPSTREAM",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, PepError>;

/// Unified error type used by core and client.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PepError {
    #[error("malformed decision: {0}")]
    MalformedDecision(String),
    #[error("content violation: {0}")]
    ContentViolation(String),
    #[error("Unhandled obligations: {0}")]
    UnhandledObligations(usize),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("upstream: {0}")]
    Upstream(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl PepError {
    /// Access denied with the stock message.
    pub fn access_denied() -> Self {
        PepError::AccessDenied("Access Denied. Action not permitted.".into())
    }

    /// Map an error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            PepError::MalformedDecision(_) => ErrorCode::MalformedDecision,
            PepError::ContentViolation(_) => ErrorCode::ContentViolation,
            PepError::UnhandledObligations(_) => ErrorCode::UnhandledObligations,
            PepError::AccessDenied(_) => ErrorCode::AccessDenied,
            PepError::Transport(_) => ErrorCode::Transport,
            PepError::BadRequest(_) => ErrorCode::BadRequest,
            PepError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            PepError::Upstream(_) => ErrorCode::Upstream,
            PepError::Internal(_) => ErrorCode::Internal,
        }
    }
}
