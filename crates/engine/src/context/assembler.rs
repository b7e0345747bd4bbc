//! Context assembly — builds the ordered message list handed to the model.
//!
//! Layers, in output order:
//!
//! 1. **Persona** (system preamble) — never trimmed
//! 2. **Memory facts** (long-term store) — lowest relevance dropped first
//! 3. **Prior-session snapshot** (summary + tail) — oldest tail dropped
//! 4. **Recent turns** (current session window) — never trimmed
//! 5. **Query** (the inbound message) — never trimmed
//!
//! When the budget is exceeded, facts go before snapshot tail, and the
//! snapshot tail goes before anything in layers 1, 4, 5.
//!
//! # Determinism
//!
//! Assembly is deterministic: identical inputs always produce identical
//! outputs. No random or time-dependent logic is used during assembly.

use std::sync::Arc;

use parley_core::memory::{MemoryFact, MemoryStore, ScopeFilter};
use parley_core::message::ChatMessage;
use parley_core::session::SessionSnapshot;
use tracing::{debug, warn};

use crate::context::token;
use crate::scope::ScopeState;

/// Budget and window sizes for one assembly pass.
#[derive(Debug, Clone)]
pub struct ContextLimits {
    /// Total token budget for the assembled context.
    pub token_budget: usize,
    /// Maximum memory facts to include, pre-truncation.
    pub max_memory_facts: usize,
    /// How many current-session messages to carry.
    pub recent_window: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            token_budget: 4096,
            max_memory_facts: 10,
            recent_window: 20,
        }
    }
}

/// The assembled context plus accounting of what was kept and dropped.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    /// Ordered messages ready for the model call.
    pub messages: Vec<ChatMessage>,
    pub metadata: AssemblyMetadata,
}

/// What one assembly pass included and dropped.
#[derive(Debug, Clone, Default)]
pub struct AssemblyMetadata {
    /// Estimated tokens of the final message list.
    pub total_tokens: usize,
    /// The configured budget.
    pub budget: usize,
    pub facts_included: usize,
    pub facts_dropped: usize,
    pub tail_included: usize,
    pub tail_dropped: usize,
    /// Whether a prior-session snapshot made it into the context.
    pub snapshot_injected: bool,
}

/// The context assembler. Stateless between calls — create one and reuse it.
pub struct ContextAssembler {
    memory: Arc<dyn MemoryStore>,
    persona: String,
    limits: ContextLimits,
}

impl ContextAssembler {
    pub fn new(memory: Arc<dyn MemoryStore>, persona: impl Into<String>, limits: ContextLimits) -> Self {
        Self {
            memory,
            persona: persona.into(),
            limits,
        }
    }

    /// Assemble the context for one query against the scope's current state.
    ///
    /// `include_snapshot` is set by the caller only for the first assembly of
    /// a freshly created session; later calls in the same session rely on the
    /// recent window instead.
    ///
    /// A failed memory search degrades to an empty fact list. Pure otherwise:
    /// storing the new turn afterwards is the caller's responsibility.
    pub async fn assemble(
        &self,
        state: &ScopeState,
        filter: &ScopeFilter,
        query_text: &str,
        include_snapshot: bool,
    ) -> AssembledContext {
        let mut metadata = AssemblyMetadata {
            budget: self.limits.token_budget,
            ..Default::default()
        };

        let persona_msg = ChatMessage::system(self.persona.clone());
        let recent: Vec<ChatMessage> = state.recent_messages(self.limits.recent_window).to_vec();
        let query_msg = ChatMessage::user(query_text);

        // Persona, recent window, and the query are load-bearing: reserve
        // their tokens up front and never trim them.
        let reserved = token::estimate_message_tokens(&persona_msg)
            + token::estimate_messages_tokens(&recent)
            + token::estimate_message_tokens(&query_msg);
        let mut remaining = self.limits.token_budget.saturating_sub(reserved);

        // Snapshot fits before facts get a turn at the budget.
        let snapshot = if include_snapshot {
            state.prev_snapshot.as_ref()
        } else {
            None
        };
        let (snapshot_msgs, tail_included, tail_dropped) =
            Self::fit_snapshot(snapshot, &mut remaining);
        metadata.tail_included = tail_included;
        metadata.tail_dropped = tail_dropped;
        metadata.snapshot_injected = !snapshot_msgs.is_empty();

        let facts = self.fetch_facts(query_text, filter).await;
        let (facts_block, facts_included) = Self::fit_facts(&facts, &mut remaining);
        metadata.facts_included = facts_included;
        metadata.facts_dropped = facts.len() - facts_included;

        let mut messages = Vec::with_capacity(3 + snapshot_msgs.len() + recent.len());
        messages.push(persona_msg);
        if let Some(block) = facts_block {
            messages.push(block);
        }
        messages.extend(snapshot_msgs);
        messages.extend(recent);
        messages.push(query_msg);

        metadata.total_tokens = token::estimate_messages_tokens(&messages);
        debug!(
            scope = %state.scope,
            tokens = metadata.total_tokens,
            facts = metadata.facts_included,
            snapshot = metadata.snapshot_injected,
            "Assembled context"
        );

        AssembledContext { messages, metadata }
    }

    async fn fetch_facts(&self, query: &str, filter: &ScopeFilter) -> Vec<MemoryFact> {
        let mut facts = match self.memory.search(query, filter).await {
            Ok(facts) => facts,
            Err(e) => {
                warn!(store = self.memory.name(), "Memory search failed, continuing without facts: {e}");
                return Vec::new();
            }
        };
        // The store contract says relevance-descending; enforce it anyway so
        // truncation order never depends on a store quirk.
        facts.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        facts.truncate(self.limits.max_memory_facts);
        facts
    }

    /// Greedily keep the highest-relevance prefix of facts that fits, rendered
    /// as one system block. Returns the block and how many facts it carries.
    fn fit_facts(facts: &[MemoryFact], remaining: &mut usize) -> (Option<ChatMessage>, usize) {
        if facts.is_empty() {
            return (None, 0);
        }

        let mut block = String::from("Relevant long-term memory:");
        let mut included = 0;
        for fact in facts {
            let candidate = format!("{}\n- {}", block, fact.text);
            let cost = token::estimate_tokens(&candidate) + 4;
            if cost > *remaining {
                break;
            }
            block = candidate;
            included += 1;
        }

        if included == 0 {
            return (None, 0);
        }
        *remaining -= token::estimate_tokens(&block) + 4;
        (Some(ChatMessage::system(block)), included)
    }

    /// Fit the snapshot: summary first, then the newest suffix of the tail
    /// (dropping oldest-first when the budget runs short).
    fn fit_snapshot(
        snapshot: Option<&SessionSnapshot>,
        remaining: &mut usize,
    ) -> (Vec<ChatMessage>, usize, usize) {
        let Some(snap) = snapshot else {
            return (Vec::new(), 0, 0);
        };

        let mut msgs = Vec::new();
        if !snap.summary_text.is_empty() {
            let summary =
                ChatMessage::system(format!("Previous session summary: {}", snap.summary_text));
            let cost = token::estimate_message_tokens(&summary);
            if cost <= *remaining {
                *remaining -= cost;
                msgs.push(summary);
            }
        }

        // Walk the tail newest-first, keep what fits, restore chronology.
        let mut kept: Vec<ChatMessage> = Vec::new();
        for msg in snap.tail_messages.iter().rev() {
            let cost = token::estimate_message_tokens(msg);
            if cost > *remaining {
                break;
            }
            *remaining -= cost;
            kept.push(msg.clone());
        }
        kept.reverse();

        let included = kept.len();
        let dropped = snap.tail_messages.len() - included;
        msgs.extend(kept);
        (msgs, included, dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parley_core::error::MemoryError;
    use parley_core::memory::MemoryScope;
    use parley_core::scope::{ScopeKey, ScopeKind};
    use parley_core::session::{SessionId, SessionSnapshot};
    use parley_memory::InMemoryStore;

    struct FailingStore;

    #[async_trait]
    impl MemoryStore for FailingStore {
        fn name(&self) -> &str {
            "failing"
        }

        async fn search(
            &self,
            _query: &str,
            _filter: &ScopeFilter,
        ) -> Result<Vec<MemoryFact>, MemoryError> {
            Err(MemoryError::SearchFailed("store offline".into()))
        }

        async fn add(
            &self,
            _messages: &[ChatMessage],
            _filter: &ScopeFilter,
        ) -> Result<(), MemoryError> {
            Err(MemoryError::IngestFailed("store offline".into()))
        }
    }

    fn state_with_messages(msgs: &[&str]) -> ScopeState {
        let mut state = ScopeState::new(ScopeKey::new("thread-1"), ScopeKind::Direct);
        for m in msgs {
            state.push_message(ChatMessage::user(*m));
        }
        state
    }

    fn snapshot(tail: &[&str]) -> SessionSnapshot {
        SessionSnapshot {
            session_id: SessionId::new(),
            summary_text: "Earlier they discussed colors.".into(),
            tail_messages: tail.iter().map(|m| ChatMessage::user(*m)).collect(),
        }
    }

    fn assembler_with(memory: Arc<dyn MemoryStore>, budget: usize) -> ContextAssembler {
        ContextAssembler::new(
            memory,
            "You are Parley, a helpful assistant.",
            ContextLimits {
                token_budget: budget,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn persona_first_query_last() {
        let asm = assembler_with(Arc::new(InMemoryStore::new()), 4096);
        let state = state_with_messages(&["earlier turn"]);

        let ctx = asm
            .assemble(&state, &ScopeFilter::for_user("alice"), "what now?", false)
            .await;

        assert_eq!(ctx.messages.first().unwrap().content, "You are Parley, a helpful assistant.");
        assert_eq!(ctx.messages.last().unwrap().content, "what now?");
    }

    #[tokio::test]
    async fn facts_ranked_and_capped() {
        let store = InMemoryStore::new();
        let filter = ScopeFilter::for_user("alice");
        store
            .insert_fact(&filter, MemoryFact::new("likes blue paint", MemoryScope::User, 0.9))
            .await;
        store
            .insert_fact(&filter, MemoryFact::new("blue is calming", MemoryScope::User, 0.3))
            .await;

        let asm = assembler_with(Arc::new(store), 4096);
        let ctx = asm
            .assemble(&state_with_messages(&[]), &filter, "blue", false)
            .await;

        assert_eq!(ctx.metadata.facts_included, 2);
        let block = &ctx.messages[1].content;
        assert!(block.starts_with("Relevant long-term memory:"));
        // Higher relevance listed first
        assert!(block.find("blue paint").unwrap() < block.find("calming").unwrap());
    }

    #[tokio::test]
    async fn snapshot_injected_only_when_requested() {
        let asm = assembler_with(Arc::new(InMemoryStore::new()), 4096);
        let mut state = state_with_messages(&[]);
        state.prev_snapshot = Some(snapshot(&["my favorite color is blue"]));

        let filter = ScopeFilter::for_user("alice");
        let with = asm.assemble(&state, &filter, "hi", true).await;
        assert!(with.metadata.snapshot_injected);
        assert!(with
            .messages
            .iter()
            .any(|m| m.content.contains("Previous session summary")));

        let without = asm.assemble(&state, &filter, "hi", false).await;
        assert!(!without.metadata.snapshot_injected);
    }

    #[tokio::test]
    async fn truncation_drops_facts_before_snapshot_tail() {
        let store = InMemoryStore::new();
        let filter = ScopeFilter::for_user("alice");
        for i in 0..5 {
            store
                .insert_fact(
                    &filter,
                    MemoryFact::new(
                        format!("fact about blue number {i} with plenty of padding text"),
                        MemoryScope::User,
                        0.9 - i as f32 * 0.1,
                    ),
                )
                .await;
        }

        let asm = assembler_with(Arc::new(store), 120);
        let mut state = state_with_messages(&[]);
        state.prev_snapshot = Some(snapshot(&["old turn one", "old turn two"]));

        let ctx = asm.assemble(&state, &filter, "blue", true).await;

        // Budget pressure lands on the fact layer first; the snapshot tail
        // keeps its newest messages.
        assert!(ctx.metadata.facts_dropped > 0);
        assert!(ctx.metadata.tail_included > 0);
        assert!(ctx.metadata.total_tokens <= 120);
    }

    #[tokio::test]
    async fn oversized_tail_drops_oldest_first() {
        let asm = assembler_with(Arc::new(InMemoryStore::new()), 45);
        let mut state = state_with_messages(&[]);
        state.prev_snapshot = Some(SessionSnapshot {
            session_id: SessionId::new(),
            summary_text: String::new(),
            tail_messages: vec![
                ChatMessage::user("oldest tail message with some extra words in it"),
                ChatMessage::user("middle tail message with some extra words in it"),
                ChatMessage::user("newest tail"),
            ],
        });

        let ctx = asm
            .assemble(&state, &ScopeFilter::for_user("alice"), "hi", true)
            .await;

        assert!(ctx.metadata.tail_dropped > 0);
        let kept: Vec<_> = ctx
            .messages
            .iter()
            .filter(|m| m.content.contains("tail"))
            .collect();
        assert!(kept.iter().any(|m| m.content.contains("newest")));
        assert!(!kept.iter().any(|m| m.content.contains("oldest")));
    }

    #[tokio::test]
    async fn recent_messages_never_dropped() {
        let asm = assembler_with(Arc::new(InMemoryStore::new()), 80);
        let mut state = state_with_messages(&["turn one", "turn two", "turn three"]);
        state.prev_snapshot = Some(snapshot(&["old turn with plenty of extra padding words"]));

        let ctx = asm
            .assemble(&state, &ScopeFilter::for_user("alice"), "hi", true)
            .await;

        for turn in ["turn one", "turn two", "turn three"] {
            assert!(ctx.messages.iter().any(|m| m.content == turn));
        }
    }

    #[tokio::test]
    async fn memory_failure_degrades_to_no_facts() {
        let asm = assembler_with(Arc::new(FailingStore), 4096);
        let ctx = asm
            .assemble(
                &state_with_messages(&["hello"]),
                &ScopeFilter::for_user("alice"),
                "query",
                false,
            )
            .await;

        assert_eq!(ctx.metadata.facts_included, 0);
        // Persona, one recent turn, query
        assert_eq!(ctx.messages.len(), 3);
    }

    #[tokio::test]
    async fn assembly_is_deterministic() {
        let store = InMemoryStore::new();
        let filter = ScopeFilter::for_user("alice");
        store
            .insert_fact(&filter, MemoryFact::new("likes blue", MemoryScope::User, 0.8))
            .await;

        let asm = assembler_with(Arc::new(store), 4096);
        let state = state_with_messages(&["a turn"]);

        let a = asm.assemble(&state, &filter, "blue", false).await;
        let b = asm.assemble(&state, &filter, "blue", false).await;
        let texts = |ctx: &AssembledContext| {
            ctx.messages.iter().map(|m| m.content.clone()).collect::<Vec<_>>()
        };
        assert_eq!(texts(&a), texts(&b));
    }
}
