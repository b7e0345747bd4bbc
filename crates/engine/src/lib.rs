//! # Parley Engine
//!
//! The orchestration core: for every inbound message it decides which
//! session the message belongs to (and whether that session expired), what
//! prior context to inject, whether the assistant should respond at all in
//! multi-participant channels, and which cost tier to use.
//!
//! ## Pipeline
//!
//! ```text
//! InboundMessage
//!   → group gate (skipped for direct scopes; mentions bypass)
//!   → session resolution (idle check, snapshot on rollover)
//!   → context assembly (persona, memory facts, prior snapshot, recent turns)
//!   → tier selection
//!   → language-model call
//! ```
//!
//! ## Concurrency
//!
//! Each scope is an independent sequential pipeline: one `tokio::sync::Mutex`
//! per scope held for the whole pipeline. Messages from different scopes run
//! fully in parallel; a stalled collaborator call blocks only its own scope.

pub mod context;
pub mod group;
pub mod runtime;
pub mod scope;
pub mod session;
pub mod testing;
pub mod tier;

pub use context::{AssembledContext, ContextAssembler, ContextLimits};
pub use group::{ChannelPolicy, DecisionEngine, GateOutcome, GroupState, ParticipantState};
pub use runtime::Orchestrator;
pub use scope::ScopeState;
pub use session::SessionManager;
pub use tier::TierSelector;
