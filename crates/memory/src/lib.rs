//! Memory store client implementations for Parley.
//!
//! The semantic store that extracts and embeds facts is an external service;
//! these implementations satisfy the same `MemoryStore` contract for tests
//! and deployments without one.

pub mod in_memory;
pub mod noop;

pub use in_memory::InMemoryStore;
pub use noop::NoopStore;
