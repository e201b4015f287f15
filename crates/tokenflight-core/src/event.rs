//! Cross-context session events.

use serde::{Deserialize, Serialize};

use crate::error::LogoutReason;

/// An event announced to sibling execution contexts.
///
/// Receivers treat these as hints to re-check storage; they never carry
/// credential values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A refresh finished and storage holds the new expiry.
    RefreshCompleted {
        /// Epoch milliseconds of the new access credential's expiry.
        expires_at: i64,
    },
    /// The session was torn down.
    SessionCleared { reason: LogoutReason },
}

impl SessionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::RefreshCompleted { .. } => "refresh-completed",
            SessionEvent::SessionCleared { .. } => "session-cleared",
        }
    }
}

/// An event tagged with the context that published it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Identifier of the publishing execution context.
    pub source: String,
    /// RFC 3339 publish time.
    pub time: String,
    #[serde(flatten)]
    pub event: SessionEvent,
}
