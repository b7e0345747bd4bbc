//! Conversational scopes and the inbound-message envelope.
//!
//! A scope is one distinguishable conversation context: a direct thread
//! with a single user, or a shared channel with many participants. All
//! orchestration state is keyed by scope.

use serde::{Deserialize, Serialize};

use crate::decision::Tier;

/// Identifier for a conversational scope (thread or channel).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeKey(pub String);

impl ScopeKey {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ScopeKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Whether a scope is a direct thread or a shared multi-participant channel.
///
/// Direct scopes always respond; group scopes pass through the response
/// decision engine first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    Direct,
    Group,
}

/// The envelope handed to the orchestrator for every platform message.
///
/// Adapters (Discord, web, etc.) construct this; everything downstream is
/// platform-agnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Which conversation this belongs to
    pub scope: ScopeKey,

    /// Direct thread or shared channel
    pub kind: ScopeKind,

    /// Platform user id of the author
    pub author_id: String,

    /// Display name of the author (used in channel context rendering)
    pub author_name: String,

    /// The message text
    pub text: String,

    /// Whether the assistant was explicitly addressed (@mention or command)
    #[serde(default)]
    pub is_direct_mention: bool,

    /// Explicit tier override extracted by the adapter (e.g. a `!high` prefix)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_override: Option<Tier>,

    /// Project this conversation is attached to, when the adapter knows one;
    /// widens memory retrieval to project-scoped facts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl InboundMessage {
    /// A direct-thread message from a single user.
    pub fn direct(
        scope: impl Into<ScopeKey>,
        author_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let author_id = author_id.into();
        Self {
            scope: scope.into(),
            kind: ScopeKind::Direct,
            author_name: author_id.clone(),
            author_id,
            text: text.into(),
            is_direct_mention: true,
            tier_override: None,
            project_id: None,
        }
    }

    /// A group-channel message that did not address the assistant.
    pub fn group(
        scope: impl Into<ScopeKey>,
        author_id: impl Into<String>,
        author_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            scope: scope.into(),
            kind: ScopeKind::Group,
            author_id: author_id.into(),
            author_name: author_name.into(),
            text: text.into(),
            is_direct_mention: false,
            tier_override: None,
            project_id: None,
        }
    }

    pub fn with_mention(mut self) -> Self {
        self.is_direct_mention = true;
        self
    }

    pub fn with_tier_override(mut self, tier: Tier) -> Self {
        self.tier_override = Some(tier);
        self
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }
}

impl From<String> for ScopeKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_messages_are_mentions() {
        let msg = InboundMessage::direct("thread-1", "alice", "hello");
        assert_eq!(msg.kind, ScopeKind::Direct);
        assert!(msg.is_direct_mention);
    }

    #[test]
    fn group_messages_default_unaddressed() {
        let msg = InboundMessage::group("chan-1", "u1", "Bob", "anyone around?");
        assert_eq!(msg.kind, ScopeKind::Group);
        assert!(!msg.is_direct_mention);
        assert!(msg.tier_override.is_none());
    }

    #[test]
    fn scope_key_display() {
        let key = ScopeKey::new("chan:general");
        assert_eq!(key.to_string(), "chan:general");
    }
}
