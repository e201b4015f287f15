//! Error types for tokenflight.
//!
//! This module provides a unified error type with explicit variants for
//! session, storage, randomness, and input validation failures, plus the
//! failure taxonomy reported by refresh transports.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The unified error type for tokenflight operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Session errors surfaced to callers of the coordinator.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// No cryptographically strong generator is reachable.
    #[error(transparent)]
    Random(#[from] RandomUnavailable),

    /// Persistent storage errors.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Input validation errors (endpoint URLs, client setup).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),
}

impl Error {
    /// Returns the session error, if this is one.
    pub fn as_auth(&self) -> Option<&AuthError> {
        match self {
            Error::Auth(err) => Some(err),
            _ => None,
        }
    }
}

/// Errors returned to callers asking for an access token.
///
/// Every waiter on the same refresh attempt receives an equal value, so this
/// type is `Clone`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No refresh credential, or the refresh was rejected. The user must
    /// authenticate again.
    #[error("session invalid ({reason})")]
    SessionInvalid { reason: LogoutReason },

    /// Transient failure; the session is intact and the caller may retry.
    #[error("refresh unavailable: {message}")]
    RefreshUnavailable { message: String },
}

impl AuthError {
    pub fn session_invalid(reason: LogoutReason) -> Self {
        AuthError::SessionInvalid { reason }
    }

    pub fn refresh_unavailable(message: impl Into<String>) -> Self {
        AuthError::RefreshUnavailable {
            message: message.into(),
        }
    }

    /// Check if the caller must treat the user as logged out.
    pub fn is_session_invalid(&self) -> bool {
        matches!(self, AuthError::SessionInvalid { .. })
    }

    /// Check if the original request may be retried after backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::RefreshUnavailable { .. })
    }
}

/// Machine-readable reason attached to a session teardown and to the
/// redirect-to-login signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutReason {
    /// No refresh credential is stored.
    NoSession,
    /// The refresh credential was rejected by the server.
    RefreshRejected,
    /// The refresh endpoint answered with something we cannot trust.
    MalformedResponse,
    /// The user logged out explicitly.
    LoggedOut,
    /// Another execution context cleared the session.
    ClearedElsewhere,
}

impl LogoutReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogoutReason::NoSession => "no_session",
            LogoutReason::RefreshRejected => "refresh_rejected",
            LogoutReason::MalformedResponse => "malformed_response",
            LogoutReason::LoggedOut => "logged_out",
            LogoutReason::ClearedElsewhere => "cleared_elsewhere",
        }
    }
}

impl fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures a refresh transport may report for one exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshFailure {
    /// The refresh credential is invalid, expired, or revoked.
    #[error("refresh rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// Network failure or timeout.
    #[error("refresh endpoint unreachable: {message}")]
    Unreachable { message: String },

    /// The response violated the expected schema.
    #[error("malformed refresh response: {message}")]
    MalformedResponse { message: String },
}

impl RefreshFailure {
    /// Terminal failures tear the session down. A malformed success is
    /// treated like a rejection.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RefreshFailure::Rejected { .. } | RefreshFailure::MalformedResponse { .. }
        )
    }

    /// The logout reason reported when this failure ends a session.
    pub fn logout_reason(&self) -> Option<LogoutReason> {
        match self {
            RefreshFailure::Rejected { .. } => Some(LogoutReason::RefreshRejected),
            RefreshFailure::MalformedResponse { .. } => Some(LogoutReason::MalformedResponse),
            RefreshFailure::Unreachable { .. } => None,
        }
    }
}

/// The environment cannot produce secure randomness.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("secure random source unavailable: {message}")]
pub struct RandomUnavailable {
    pub message: String,
}

impl RandomUnavailable {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Storage backend errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The backend could not be read or written.
    #[error("storage unavailable: {message}")]
    Unavailable { message: String },

    /// Stored data could not be decoded.
    #[error("corrupt entry '{key}': {reason}")]
    Corrupt { key: String, reason: String },
}

impl StorageError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        StorageError::Unavailable {
            message: message.into(),
        }
    }
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid refresh endpoint URL.
    #[error("invalid endpoint '{value}': {reason}")]
    Endpoint { value: String, reason: String },

    /// Generic invalid input.
    #[error("invalid input: {message}")]
    Other { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_failures() {
        let rejected = RefreshFailure::Rejected {
            status: 401,
            message: "revoked".into(),
        };
        let malformed = RefreshFailure::MalformedResponse {
            message: "missing access_token".into(),
        };
        let unreachable = RefreshFailure::Unreachable {
            message: "timed out".into(),
        };

        assert!(rejected.is_terminal());
        assert!(malformed.is_terminal());
        assert!(!unreachable.is_terminal());
        assert_eq!(
            malformed.logout_reason(),
            Some(LogoutReason::MalformedResponse)
        );
        assert_eq!(unreachable.logout_reason(), None);
    }

    #[test]
    fn logout_reason_codes_match_serde() {
        for reason in [
            LogoutReason::NoSession,
            LogoutReason::RefreshRejected,
            LogoutReason::MalformedResponse,
            LogoutReason::LoggedOut,
            LogoutReason::ClearedElsewhere,
        ] {
            let json = serde_json::to_string(&reason).unwrap();
            assert_eq!(json, format!("\"{}\"", reason.as_str()));
        }
    }

    #[test]
    fn auth_error_classification() {
        let invalid = AuthError::session_invalid(LogoutReason::RefreshRejected);
        let transient = AuthError::refresh_unavailable("connection refused");

        assert!(invalid.is_session_invalid());
        assert!(!invalid.is_retryable());
        assert!(transient.is_retryable());
        assert!(invalid.to_string().contains("refresh_rejected"));
    }
}
