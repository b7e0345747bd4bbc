//! In-memory store — useful for testing and ephemeral deployments.
//!
//! Ranks by naive keyword overlap rather than embeddings; the contract
//! (ranked facts, scope filtering) matches the external semantic store.

use async_trait::async_trait;
use parley_core::error::MemoryError;
use parley_core::memory::{MemoryFact, MemoryScope, MemoryStore, ScopeFilter};
use parley_core::message::{ChatMessage, Role};
use std::sync::Arc;
use tokio::sync::RwLock;

struct StoredFact {
    user_id: Option<String>,
    project_id: Option<String>,
    fact: MemoryFact,
}

/// A memory store that keeps facts in a Vec behind an RwLock.
pub struct InMemoryStore {
    facts: Arc<RwLock<Vec<StoredFact>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            facts: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Seed a fact directly (tests, profile bootstrapping).
    pub async fn insert_fact(&self, filter: &ScopeFilter, fact: MemoryFact) {
        self.facts.write().await.push(StoredFact {
            user_id: filter.user_id.clone(),
            project_id: filter.project_id.clone(),
            fact,
        });
    }

    pub async fn count(&self) -> usize {
        self.facts.read().await.len()
    }

    fn keyword_score(query: &str, text: &str) -> f32 {
        let text_lower = text.to_lowercase();
        let mut hits = 0usize;
        let mut terms = 0usize;
        for term in query.to_lowercase().split_whitespace() {
            if term.len() < 3 {
                continue;
            }
            terms += 1;
            if text_lower.contains(term) {
                hits += 1;
            }
        }
        if terms == 0 {
            return 0.0;
        }
        hits as f32 / terms as f32
    }

    fn visible(stored: &StoredFact, filter: &ScopeFilter) -> bool {
        if stored.user_id != filter.user_id {
            return false;
        }
        match stored.fact.scope {
            MemoryScope::User => true,
            MemoryScope::Project => {
                filter.project_id.is_some() && stored.project_id == filter.project_id
            }
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn search(
        &self,
        query: &str,
        filter: &ScopeFilter,
    ) -> Result<Vec<MemoryFact>, MemoryError> {
        let facts = self.facts.read().await;

        let mut results: Vec<MemoryFact> = facts
            .iter()
            .filter(|s| Self::visible(s, filter))
            .map(|s| {
                let mut fact = s.fact.clone();
                let keyword = Self::keyword_score(query, &fact.text);
                // Blend the stored relevance with the query match
                fact.relevance_score = (fact.relevance_score + keyword) / 2.0;
                fact
            })
            .filter(|f| f.relevance_score > 0.0)
            .collect();

        results.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(results)
    }

    async fn add(
        &self,
        messages: &[ChatMessage],
        filter: &ScopeFilter,
    ) -> Result<(), MemoryError> {
        // Stand-in for the external store's fact extraction: keep user turns
        // verbatim as facts.
        let scope = if filter.project_id.is_some() {
            MemoryScope::Project
        } else {
            MemoryScope::User
        };

        let mut facts = self.facts.write().await;
        for msg in messages {
            if msg.role != Role::User || msg.content.trim().is_empty() {
                continue;
            }
            facts.push(StoredFact {
                user_id: filter.user_id.clone(),
                project_id: filter.project_id.clone(),
                fact: MemoryFact::new(msg.content.clone(), scope, 0.5),
            });
        }
        Ok(())
    }
}
