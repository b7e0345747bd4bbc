//! # Parley Core
//!
//! Domain types, traits, and error definitions for the Parley conversation
//! orchestrator. This crate has **zero framework dependencies** — it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is defined as a trait here. Implementations
//! live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod clock;
pub mod decision;
pub mod error;
pub mod memory;
pub mod message;
pub mod model;
pub mod scope;
pub mod session;

// Re-export key types at crate root for ergonomics
pub use clock::{Clock, ManualClock, SystemClock};
pub use decision::{Decision, Tier};
pub use error::{Error, Result};
pub use memory::{MemoryFact, MemoryScope, MemoryStore};
pub use message::{ChatMessage, Role};
pub use model::LanguageModel;
pub use scope::{InboundMessage, ScopeKey, ScopeKind};
pub use session::{Session, SessionId, SessionSnapshot, SessionStatus};
