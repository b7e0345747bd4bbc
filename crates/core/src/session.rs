//! Session domain types.
//!
//! A session is one bounded period of continuous activity within a scope.
//! Lifecycle transitions are owned exclusively by the session manager in the
//! engine crate; these types carry no behavior beyond construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::ChatMessage;
use crate::scope::ScopeKey;

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a session.
///
/// Transitions: `Active` → `Summarizing` → `Closed`. At most one session per
/// scope is `Active` at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Summarizing,
    Closed,
}

/// One continuous conversation within a scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,

    /// Which scope this session belongs to
    pub scope: ScopeKey,

    /// Owning user for direct scopes; `None` for group scopes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_user_id: Option<String>,

    pub started_at: DateTime<Utc>,

    pub last_activity_at: DateTime<Utc>,

    pub status: SessionStatus,

    /// Messages attributed to this session so far
    pub message_count: u64,
}

impl Session {
    /// Create a fresh active session for a scope.
    pub fn new(scope: ScopeKey, owner_user_id: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::new(),
            scope,
            owner_user_id,
            started_at: now,
            last_activity_at: now,
            status: SessionStatus::Active,
            message_count: 0,
        }
    }

    /// Seconds since the last message attributed to this session.
    pub fn idle_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_activity_at).num_seconds()
    }
}

/// Immutable record produced when a session closes: the last few messages
/// plus a model-generated summary of the whole session.
///
/// Created exactly once per closed session. `summary_text` is empty when
/// summarization failed; the tail still provides continuity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,

    pub summary_text: String,

    /// The final messages of the session, in chronological order
    pub tail_messages: Vec<ChatMessage>,
}
