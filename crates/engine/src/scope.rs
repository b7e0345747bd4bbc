//! Per-scope mutable state.
//!
//! One `ScopeState` exists per conversational scope, guarded by a per-scope
//! mutex in the orchestrator. Everything here is process-local and
//! rebuildable from channel history; durable storage belongs to external
//! collaborators.

use parley_core::message::ChatMessage;
use parley_core::scope::{ScopeKey, ScopeKind};
use parley_core::session::{Session, SessionSnapshot};

use crate::group::GroupState;

/// Upper bound on the current-session message buffer. Sessions that somehow
/// run past this keep only the most recent messages for summarization.
pub const MAX_SESSION_BUFFER: usize = 512;

/// All scope-local state: the active session, its message buffer, the last
/// closed session's snapshot, and (for group scopes) participant state.
pub struct ScopeState {
    pub scope: ScopeKey,

    pub kind: ScopeKind,

    /// The current session, if any. `None` before the first message; a
    /// non-`Active` session here is awaiting replacement.
    pub session: Option<Session>,

    /// Messages of the current session, chronological. Cleared on rollover.
    pub messages: Vec<ChatMessage>,

    /// Snapshot of the most recently closed session, injected into the first
    /// assembly of the session that follows it.
    pub prev_snapshot: Option<SessionSnapshot>,

    /// Group-scope decision state; `None` for direct scopes.
    pub group: Option<GroupState>,
}

impl ScopeState {
    pub fn new(scope: ScopeKey, kind: ScopeKind) -> Self {
        Self {
            scope,
            kind,
            session: None,
            messages: Vec::new(),
            prev_snapshot: None,
            group: None,
        }
    }

    /// Append a message to the current session's buffer, keeping it bounded.
    pub fn push_message(&mut self, msg: ChatMessage) {
        self.messages.push(msg);
        if self.messages.len() > MAX_SESSION_BUFFER {
            let excess = self.messages.len() - MAX_SESSION_BUFFER;
            self.messages.drain(..excess);
        }
    }

    /// The last `n` messages of the current session, chronological.
    pub fn recent_messages(&self, n: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }
}
