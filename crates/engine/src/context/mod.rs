//! Context assembly: persona, memory facts, prior-session snapshot, recent
//! turns, and the query, fitted to a token budget.

pub mod assembler;
pub mod token;

pub use assembler::{AssembledContext, AssemblyMetadata, ContextAssembler, ContextLimits};
