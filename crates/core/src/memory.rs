//! Memory store trait — the seam to the external long-term memory service.
//!
//! The real store does semantic search over extracted facts; this core treats
//! it as a black box: `search(query, filter) -> ranked facts` and
//! `add(messages, scope)`. Facts are fetched transiently per assembly call
//! and never cached here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;
use crate::message::ChatMessage;
use crate::session::SessionId;

/// Which level of memory a fact belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryScope {
    /// Facts about a user, shared across all their projects
    User,
    /// Facts scoped to one project/workspace
    Project,
}

/// An atomic piece of retrieved long-term information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryFact {
    /// The fact text
    pub text: String,

    /// User-level or project-level
    pub scope: MemoryScope,

    /// Ranking score from the store, higher is more relevant
    pub relevance_score: f32,

    /// Session the fact was extracted from, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_session_id: Option<SessionId>,
}

impl MemoryFact {
    pub fn new(text: impl Into<String>, scope: MemoryScope, relevance_score: f32) -> Self {
        Self {
            text: text.into(),
            scope,
            relevance_score,
            source_session_id: None,
        }
    }
}

/// Filter for a memory search: who is asking and, optionally, which project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopeFilter {
    /// User id whose memories to search
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// When set, also match project-scoped facts for this project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl ScopeFilter {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            project_id: None,
        }
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }
}

/// The memory store client trait.
///
/// Implementations: the external semantic store (out of scope here), an
/// in-memory keyword store, and a no-op store for memory-disabled deployments.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// The store name (e.g. "in_memory", "noop").
    fn name(&self) -> &str;

    /// Search for facts relevant to `query`, ranked by relevance descending.
    async fn search(
        &self,
        query: &str,
        filter: &ScopeFilter,
    ) -> std::result::Result<Vec<MemoryFact>, MemoryError>;

    /// Hand a slice of conversation to the store so it can extract and
    /// persist facts. The store decides what, if anything, to keep.
    async fn add(
        &self,
        messages: &[ChatMessage],
        filter: &ScopeFilter,
    ) -> std::result::Result<(), MemoryError>;
}
