//! Session lifecycle management.
//!
//! Owns session identity and the idle-timeout rollover: a session whose idle
//! gap exceeds the configured window is closed and snapshotted, and a fresh
//! session takes its place. The idle check runs lazily on access; the
//! orchestrator's sweeper adds timeliness for scopes that go fully silent.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parley_core::clock::Clock;
use parley_core::decision::Tier;
use parley_core::message::ChatMessage;
use parley_core::model::LanguageModel;
use parley_core::session::{Session, SessionSnapshot, SessionStatus};
use tracing::{debug, info, warn};

use crate::scope::ScopeState;

const SUMMARY_INSTRUCTION: &str = "Summarize this conversation in 2-3 sentences. \
Focus on key topics discussed, decisions made, and any important context for \
future conversations.";

/// Owns session creation, idle expiry, and close-and-snapshot.
///
/// No other component mutates `Session` fields.
pub struct SessionManager {
    model: Arc<dyn LanguageModel>,
    idle_window: Duration,
    snapshot_tail_size: usize,
}

impl SessionManager {
    pub fn new(model: Arc<dyn LanguageModel>, idle_minutes: u64, snapshot_tail_size: usize) -> Self {
        Self {
            model,
            idle_window: Duration::minutes(idle_minutes as i64),
            snapshot_tail_size,
        }
    }

    /// Return the active session for the scope, creating one if none exists
    /// or if the existing one has sat idle past the window. Returns whether
    /// a new session was created.
    ///
    /// A gap of exactly the window is still within the session; only a
    /// strictly longer gap expires it.
    pub async fn resolve(
        &self,
        state: &mut ScopeState,
        owner_user_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> bool {
        let expired = match &state.session {
            Some(sess) if sess.status == SessionStatus::Active => {
                (now - sess.last_activity_at) > self.idle_window
            }
            Some(_) => true, // closed by the sweeper, awaiting replacement
            None => true,
        };

        if !expired {
            return false;
        }

        if let Some(snapshot) = self.close_and_snapshot(state).await {
            state.prev_snapshot = Some(snapshot);
        }

        let session = Session::new(
            state.scope.clone(),
            owner_user_id.map(str::to_string),
            now,
        );
        info!(scope = %state.scope, session = %session.id, "Created session");
        state.session = Some(session);
        state.messages.clear();
        true
    }

    /// Update activity bookkeeping for the current session. Called once per
    /// message attributed to the session.
    pub fn touch(&self, state: &mut ScopeState, now: DateTime<Utc>) {
        if let Some(sess) = state.session.as_mut() {
            sess.last_activity_at = now;
            sess.message_count += 1;
        }
    }

    /// Close the current session and produce its snapshot: the last few
    /// messages plus a model-generated summary of the whole buffer.
    ///
    /// Idempotent — a session that is not `Active` (or a scope with no
    /// session) yields `None`. A failed summary never blocks the close: the
    /// session still transitions to `Closed` with an empty summary.
    pub async fn close_and_snapshot(&self, state: &mut ScopeState) -> Option<SessionSnapshot> {
        let sess = state.session.as_mut()?;
        if sess.status != SessionStatus::Active {
            return None;
        }

        sess.status = SessionStatus::Summarizing;
        debug!(scope = %state.scope, session = %sess.id, "Summarizing session");

        let summary_text = if state.messages.is_empty() {
            String::new()
        } else {
            match self.summarize(&state.messages).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(session = %sess.id, "Session summary failed, closing with tail only: {e}");
                    String::new()
                }
            }
        };

        let tail_start = state.messages.len().saturating_sub(self.snapshot_tail_size);
        let tail_messages = state.messages[tail_start..].to_vec();

        sess.status = SessionStatus::Closed;
        info!(scope = %state.scope, session = %sess.id, tail = tail_messages.len(), "Closed session");

        Some(SessionSnapshot {
            session_id: sess.id.clone(),
            summary_text,
            tail_messages,
        })
    }

    /// True when the scope's session has been idle past the window.
    pub fn is_idle(&self, state: &ScopeState, clock: &dyn Clock) -> bool {
        match &state.session {
            Some(sess) if sess.status == SessionStatus::Active => {
                (clock.now() - sess.last_activity_at) > self.idle_window
            }
            _ => false,
        }
    }

    async fn summarize(
        &self,
        messages: &[ChatMessage],
    ) -> Result<String, parley_core::error::ModelError> {
        let transcript = messages
            .iter()
            .map(|m| format!("{}: {}", role_label(m), m.content))
            .collect::<Vec<_>>()
            .join("\n");

        let context = vec![
            ChatMessage::system(SUMMARY_INSTRUCTION),
            ChatMessage::user(transcript),
        ];
        // Summaries are cheap bookkeeping, always low tier
        self.model.complete(&context, Tier::Low).await
    }
}

fn role_label(msg: &ChatMessage) -> &'static str {
    match msg.role {
        parley_core::message::Role::User => "USER",
        parley_core::message::Role::Assistant => "ASSISTANT",
        parley_core::message::Role::System => "SYSTEM",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;
    use parley_core::scope::{ScopeKey, ScopeKind};

    fn manager(model: ScriptedModel) -> SessionManager {
        SessionManager::new(Arc::new(model), 30, 10)
    }

    fn direct_state() -> ScopeState {
        ScopeState::new(ScopeKey::new("thread-1"), ScopeKind::Direct)
    }

    #[tokio::test]
    async fn first_message_creates_session() {
        let mgr = manager(ScriptedModel::default());
        let mut state = direct_state();
        let now = Utc::now();

        let created = mgr.resolve(&mut state, Some("alice"), now).await;
        assert!(created);
        let sess = state.session.as_ref().unwrap();
        assert_eq!(sess.status, SessionStatus::Active);
        assert_eq!(sess.owner_user_id.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn gap_at_exact_threshold_reuses_session() {
        let mgr = manager(ScriptedModel::default());
        let mut state = direct_state();
        let t0 = Utc::now();

        mgr.resolve(&mut state, None, t0).await;
        mgr.touch(&mut state, t0);
        let first_id = state.session.as_ref().unwrap().id.clone();

        // Exactly 30 minutes later: still the same session
        let created = mgr.resolve(&mut state, None, t0 + Duration::minutes(30)).await;
        assert!(!created);
        assert_eq!(state.session.as_ref().unwrap().id, first_id);
    }

    #[tokio::test]
    async fn gap_one_second_past_threshold_rolls_over() {
        let mgr = manager(ScriptedModel::default());
        let mut state = direct_state();
        let t0 = Utc::now();

        mgr.resolve(&mut state, None, t0).await;
        mgr.touch(&mut state, t0);
        state.push_message(ChatMessage::user("hello"));
        let first_id = state.session.as_ref().unwrap().id.clone();

        let later = t0 + Duration::minutes(30) + Duration::seconds(1);
        let created = mgr.resolve(&mut state, None, later).await;
        assert!(created);
        assert_ne!(state.session.as_ref().unwrap().id, first_id);
        // The old session left a snapshot behind and the buffer restarted
        assert!(state.prev_snapshot.is_some());
        assert!(state.messages.is_empty());
    }

    #[tokio::test]
    async fn gap_one_second_before_threshold_reuses_session() {
        let mgr = manager(ScriptedModel::default());
        let mut state = direct_state();
        let t0 = Utc::now();

        mgr.resolve(&mut state, None, t0).await;
        mgr.touch(&mut state, t0);
        let first_id = state.session.as_ref().unwrap().id.clone();

        let later = t0 + Duration::minutes(30) - Duration::seconds(1);
        assert!(!mgr.resolve(&mut state, None, later).await);
        assert_eq!(state.session.as_ref().unwrap().id, first_id);
    }

    #[tokio::test]
    async fn snapshot_carries_summary_and_tail() {
        let model = ScriptedModel::default().with_completion("They discussed colors.");
        let mgr = manager(model);
        let mut state = direct_state();
        let now = Utc::now();

        mgr.resolve(&mut state, None, now).await;
        state.push_message(ChatMessage::user("My favorite color is blue"));
        state.push_message(ChatMessage::assistant("Noted — blue it is."));

        let snapshot = mgr.close_and_snapshot(&mut state).await.unwrap();
        assert_eq!(snapshot.summary_text, "They discussed colors.");
        assert_eq!(snapshot.tail_messages.len(), 2);
        assert_eq!(
            state.session.as_ref().unwrap().status,
            SessionStatus::Closed
        );
    }

    #[tokio::test]
    async fn snapshot_tail_is_bounded() {
        let model = ScriptedModel::default().with_completion("long session");
        let mgr = SessionManager::new(Arc::new(model), 30, 3);
        let mut state = direct_state();

        mgr.resolve(&mut state, None, Utc::now()).await;
        for i in 0..8 {
            state.push_message(ChatMessage::user(format!("msg {i}")));
        }

        let snapshot = mgr.close_and_snapshot(&mut state).await.unwrap();
        assert_eq!(snapshot.tail_messages.len(), 3);
        assert_eq!(snapshot.tail_messages[0].content, "msg 5");
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let model = ScriptedModel::default().with_completion("summary");
        let mgr = manager(model);
        let mut state = direct_state();

        mgr.resolve(&mut state, None, Utc::now()).await;
        state.push_message(ChatMessage::user("hi"));

        assert!(mgr.close_and_snapshot(&mut state).await.is_some());
        // Second call is a no-op
        assert!(mgr.close_and_snapshot(&mut state).await.is_none());
    }

    #[tokio::test]
    async fn summary_failure_still_closes() {
        let model = ScriptedModel::default().with_failing_completions();
        let mgr = manager(model);
        let mut state = direct_state();

        mgr.resolve(&mut state, None, Utc::now()).await;
        state.push_message(ChatMessage::user("hello"));

        let snapshot = mgr.close_and_snapshot(&mut state).await.unwrap();
        assert!(snapshot.summary_text.is_empty());
        assert_eq!(snapshot.tail_messages.len(), 1);
        assert_eq!(
            state.session.as_ref().unwrap().status,
            SessionStatus::Closed
        );
    }
}
