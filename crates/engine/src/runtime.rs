//! The orchestrator: one entry point per inbound message, per-scope
//! pipelines, and the idle-session sweeper.

use std::collections::HashMap;
use std::sync::Arc;

use parley_config::AppConfig;
use parley_core::clock::{Clock, SystemClock};
use parley_core::decision::Decision;
use parley_core::error::Result;
use parley_core::memory::{MemoryStore, ScopeFilter};
use parley_core::message::ChatMessage;
use parley_core::model::LanguageModel;
use parley_core::scope::{InboundMessage, ScopeKey, ScopeKind};
use parley_core::session::{Session, SessionSnapshot};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::context::{ContextAssembler, ContextLimits};
use crate::group::{ChannelPolicy, DecisionEngine, GateOutcome, GroupState};
use crate::scope::ScopeState;
use crate::session::SessionManager;
use crate::tier::TierSelector;

/// How many trailing session messages accompany a new exchange into the
/// memory store.
const MEMORY_INGEST_WINDOW: usize = 4;

/// Reply surfaced when an explicitly-addressed request fails outright.
const FAILURE_REPLY: &str = "Sorry, I could not complete that request.";

/// The orchestration core.
///
/// Holds one `Mutex<ScopeState>` per scope; the mutex is held for a scope's
/// whole pipeline, so messages within a scope run strictly in arrival order
/// while different scopes proceed in parallel. The scope map itself is
/// touched only to fetch or insert a handle.
pub struct Orchestrator {
    scopes: RwLock<HashMap<ScopeKey, Arc<Mutex<ScopeState>>>>,
    sessions: SessionManager,
    assembler: ContextAssembler,
    engine: DecisionEngine,
    tiers: TierSelector,
    model: Arc<dyn LanguageModel>,
    memory: Arc<dyn MemoryStore>,
    clock: Arc<dyn Clock>,
    config: AppConfig,
}

impl Orchestrator {
    pub fn new(
        config: AppConfig,
        model: Arc<dyn LanguageModel>,
        memory: Arc<dyn MemoryStore>,
    ) -> Self {
        Self::with_clock(config, model, memory, Arc::new(SystemClock))
    }

    /// Construct with an explicit clock; tests use `ManualClock` to drive
    /// idle boundaries deterministically.
    pub fn with_clock(
        config: AppConfig,
        model: Arc<dyn LanguageModel>,
        memory: Arc<dyn MemoryStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let sessions = SessionManager::new(
            model.clone(),
            config.session.idle_minutes,
            config.session.snapshot_tail_size,
        );
        let assembler = ContextAssembler::new(
            memory.clone(),
            config.persona.clone(),
            ContextLimits {
                token_budget: config.context.token_budget,
                max_memory_facts: config.context.max_memory_facts,
                recent_window: config.session.recent_window,
            },
        );
        let engine = DecisionEngine::new(model.clone(), config.organic.enabled);
        let tiers = TierSelector::new(config.tier.clone());

        Self {
            scopes: RwLock::new(HashMap::new()),
            sessions,
            assembler,
            engine,
            tiers,
            model,
            memory,
            clock,
            config,
        }
    }

    /// Handle one inbound message end to end and return the decision.
    ///
    /// Suppression is a normal outcome, never an error; collaborator
    /// failures degrade per the error-handling rules (empty facts, empty
    /// summary, fail-closed gating, generic reply only for explicit
    /// requests).
    pub async fn handle_message(&self, msg: InboundMessage) -> Result<Decision> {
        let now = self.clock.now();
        let handle = self.scope_handle(&msg.scope, msg.kind).await;
        let mut state = handle.lock().await;

        // The assistant's own output is never evaluated; it only enriches
        // the channel buffer.
        if msg.author_name == self.config.assistant_name {
            if let Some(group) = state.group.as_mut() {
                group.record_message(&msg.author_id, &msg.author_name, &msg.text, now);
            }
            return Ok(Decision::suppress(
                "self_message",
                self.config.tier.default_tier,
                msg.text,
            ));
        }

        // Group gate, skipped for direct scopes
        let resolved_text = if msg.kind == ScopeKind::Group {
            let organic = &self.config.organic;
            let group = state
                .group
                .get_or_insert_with(|| GroupState::new(ChannelPolicy::from_config(organic)));
            match self.engine.evaluate(group, &msg, now).await {
                GateOutcome::Respond { resolved_text, .. } => resolved_text,
                GateOutcome::Suppress {
                    reason,
                    resolved_text,
                } => {
                    let tier = self.tiers.select(&resolved_text, msg.tier_override);
                    return Ok(Decision::suppress(reason, tier, resolved_text));
                }
            }
        } else {
            msg.text.clone()
        };

        // Session resolution and context assembly
        let owner = (msg.kind == ScopeKind::Direct).then_some(msg.author_id.as_str());
        let created = self.sessions.resolve(&mut state, owner, now).await;
        self.sessions.touch(&mut state, now);

        let mut filter = ScopeFilter::for_user(&msg.author_id);
        if let Some(project) = &msg.project_id {
            filter = filter.with_project(project);
        }
        let context = self
            .assembler
            .assemble(&state, &filter, &resolved_text, created)
            .await;

        let tier = self.tiers.select(&resolved_text, msg.tier_override);

        match self.model.complete(&context.messages, tier).await {
            Ok(reply) => {
                state.push_message(ChatMessage::user(&msg.text).with_author(&msg.author_id).at(now));
                state.push_message(ChatMessage::assistant(&reply).at(now));
                self.ingest_exchange(&state, &filter).await;
                info!(scope = %msg.scope, %tier, "Responded");
                Ok(Decision::respond(reply, tier, resolved_text))
            }
            Err(e) => {
                warn!(scope = %msg.scope, "Model call failed: {e}");
                if msg.is_direct_mention || msg.kind == ScopeKind::Direct {
                    Ok(Decision::respond(FAILURE_REPLY, tier, resolved_text))
                } else {
                    Ok(Decision::suppress("model_failure", tier, resolved_text))
                }
            }
        }
    }

    /// Forward the fresh exchange to the memory store so it can extract
    /// facts. Failures are logged and ignored.
    async fn ingest_exchange(&self, state: &ScopeState, filter: &ScopeFilter) {
        let window = state.recent_messages(MEMORY_INGEST_WINDOW);
        if let Err(e) = self.memory.add(window, filter).await {
            warn!(store = self.memory.name(), "Memory ingestion failed: {e}");
        }
    }

    /// Proactively close and snapshot sessions whose scope went fully
    /// silent. Returns how many sessions were closed.
    pub async fn close_idle_sessions(&self) -> usize {
        let handles: Vec<_> = self.scopes.read().await.values().cloned().collect();
        let mut closed = 0;
        for handle in handles {
            let mut state = handle.lock().await;
            if self.sessions.is_idle(&state, self.clock.as_ref()) {
                if let Some(snapshot) = self.sessions.close_and_snapshot(&mut state).await {
                    state.prev_snapshot = Some(snapshot);
                    closed += 1;
                }
            }
        }
        closed
    }

    /// Run `close_idle_sessions` on an interval until the handle is dropped
    /// or aborted.
    pub fn spawn_idle_sweeper(
        self: &Arc<Self>,
        period: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let closed = orchestrator.close_idle_sessions().await;
                if closed > 0 {
                    debug!(closed, "Idle sweep closed sessions");
                }
            }
        })
    }

    /// Apply an operator change to a group scope's policy, creating the
    /// scope if it has not seen traffic yet.
    pub async fn update_policy(&self, scope: &ScopeKey, update: impl FnOnce(&mut ChannelPolicy)) {
        let handle = self.scope_handle(scope, ScopeKind::Group).await;
        let mut state = handle.lock().await;
        let organic = &self.config.organic;
        let group = state
            .group
            .get_or_insert_with(|| GroupState::new(ChannelPolicy::from_config(organic)));
        update(&mut group.policy);
    }

    /// The scope's current session, if any.
    pub async fn active_session(&self, scope: &ScopeKey) -> Option<Session> {
        let handle = self.scopes.read().await.get(scope)?.clone();
        let state = handle.lock().await;
        state.session.clone()
    }

    /// The scope's most recent closed-session snapshot, if any.
    pub async fn snapshot_for(&self, scope: &ScopeKey) -> Option<SessionSnapshot> {
        let handle = self.scopes.read().await.get(scope)?.clone();
        let state = handle.lock().await;
        state.prev_snapshot.clone()
    }

    async fn scope_handle(&self, scope: &ScopeKey, kind: ScopeKind) -> Arc<Mutex<ScopeState>> {
        if let Some(handle) = self.scopes.read().await.get(scope) {
            return handle.clone();
        }
        let mut map = self.scopes.write().await;
        map.entry(scope.clone())
            .or_insert_with(|| Arc::new(Mutex::new(ScopeState::new(scope.clone(), kind))))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;
    use chrono::{Duration, Utc};
    use parley_core::clock::ManualClock;
    use parley_core::decision::Tier;
    use parley_core::session::SessionStatus;
    use parley_memory::InMemoryStore;

    fn orchestrator(model: ScriptedModel) -> (Arc<Orchestrator>, Arc<ScriptedModel>) {
        let model = Arc::new(model);
        let orch = Orchestrator::new(
            AppConfig::default(),
            model.clone(),
            Arc::new(InMemoryStore::new()),
        );
        (Arc::new(orch), model)
    }

    #[tokio::test]
    async fn direct_message_gets_a_reply() {
        let (orch, model) = orchestrator(ScriptedModel::default().with_completion("Hi Alice!"));

        let decision = orch
            .handle_message(InboundMessage::direct("thread-1", "alice", "hello there"))
            .await
            .unwrap();

        assert!(decision.respond);
        assert_eq!(decision.response_text.as_deref(), Some("Hi Alice!"));
        assert_eq!(model.complete_calls(), 1);
        // Persona first, query last
        let ctx = model.context_at(0);
        assert!(ctx.first().unwrap().content.contains("Parley"));
        assert_eq!(ctx.last().unwrap().content, "hello there");
    }

    #[tokio::test]
    async fn successful_exchange_lands_in_session_buffer() {
        let (orch, _) = orchestrator(ScriptedModel::default().with_completion("noted"));

        orch.handle_message(InboundMessage::direct("thread-1", "alice", "remember this"))
            .await
            .unwrap();

        let session = orch.active_session(&ScopeKey::new("thread-1")).await.unwrap();
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.message_count, 1);
    }

    #[tokio::test]
    async fn own_output_is_never_evaluated() {
        let (orch, model) = orchestrator(ScriptedModel::default());

        let echo = InboundMessage::group("chan-1", "bot-1", "Parley", "my earlier reply");
        let decision = orch.handle_message(echo).await.unwrap();

        assert!(!decision.respond);
        assert_eq!(decision.suppressed_reason.as_deref(), Some("self_message"));
        assert_eq!(model.complete_calls(), 0);
        assert_eq!(model.classify_count(), 0);
    }

    #[tokio::test]
    async fn tier_override_reaches_the_model() {
        let (orch, model) = orchestrator(ScriptedModel::default());

        orch.handle_message(
            InboundMessage::direct("thread-1", "alice", "quick one").with_tier_override(Tier::High),
        )
        .await
        .unwrap();

        assert_eq!(model.tier_at(0), Tier::High);
    }

    #[tokio::test]
    async fn direct_failure_surfaces_generic_reply() {
        let (orch, _) = orchestrator(ScriptedModel::default().with_failing_completions());

        let decision = orch
            .handle_message(InboundMessage::direct("thread-1", "alice", "hello"))
            .await
            .unwrap();

        assert!(decision.respond);
        assert_eq!(decision.response_text.as_deref(), Some(FAILURE_REPLY));
    }

    #[tokio::test]
    async fn organic_failure_stays_silent() {
        let model = ScriptedModel::default()
            .with_fallback_score(0.9)
            .with_failing_completions();
        let (orch, _) = orchestrator(model);

        let decision = orch
            .handle_message(InboundMessage::group("chan-1", "u1", "Ann", "interesting point"))
            .await
            .unwrap();

        assert!(!decision.respond);
        assert_eq!(decision.suppressed_reason.as_deref(), Some("model_failure"));
    }

    #[tokio::test]
    async fn quiet_mode_policy_update_suppresses() {
        let (orch, _) = orchestrator(ScriptedModel::default().with_fallback_score(0.9));
        let scope = ScopeKey::new("chan-1");

        orch.update_policy(&scope, |p| p.quiet_mode = true).await;

        let decision = orch
            .handle_message(InboundMessage::group("chan-1", "u1", "Ann", "anyone?"))
            .await
            .unwrap();
        assert_eq!(decision.suppressed_reason.as_deref(), Some("quiet_mode"));
    }

    #[tokio::test]
    async fn sweeper_pass_closes_idle_sessions() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let model = Arc::new(ScriptedModel::default().with_completion("hi"));
        let orch = Orchestrator::with_clock(
            AppConfig::default(),
            model,
            Arc::new(InMemoryStore::new()),
            clock.clone(),
        );

        orch.handle_message(InboundMessage::direct("thread-1", "alice", "hello"))
            .await
            .unwrap();
        assert_eq!(orch.close_idle_sessions().await, 0);

        clock.advance(Duration::minutes(31));
        assert_eq!(orch.close_idle_sessions().await, 1);

        let snapshot = orch.snapshot_for(&ScopeKey::new("thread-1")).await.unwrap();
        assert_eq!(snapshot.tail_messages.len(), 2);
    }

    #[tokio::test]
    async fn scopes_do_not_share_sessions() {
        let (orch, _) = orchestrator(ScriptedModel::default());

        orch.handle_message(InboundMessage::direct("thread-1", "alice", "one"))
            .await
            .unwrap();
        orch.handle_message(InboundMessage::direct("thread-2", "bob", "two"))
            .await
            .unwrap();

        let a = orch.active_session(&ScopeKey::new("thread-1")).await.unwrap();
        let b = orch.active_session(&ScopeKey::new("thread-2")).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.owner_user_id.as_deref(), Some("alice"));
        assert_eq!(b.owner_user_id.as_deref(), Some("bob"));
    }
}
