//! No-op store — disables long-term memory entirely.

use async_trait::async_trait;
use parley_core::error::MemoryError;
use parley_core::memory::{MemoryFact, MemoryStore, ScopeFilter};
use parley_core::message::ChatMessage;

/// A memory store that keeps nothing and finds nothing.
pub struct NoopStore;

#[async_trait]
impl MemoryStore for NoopStore {
    fn name(&self) -> &str {
        "noop"
    }

    async fn search(
        &self,
        _query: &str,
        _filter: &ScopeFilter,
    ) -> Result<Vec<MemoryFact>, MemoryError> {
        Ok(Vec::new())
    }

    async fn add(
        &self,
        _messages: &[ChatMessage],
        _filter: &ScopeFilter,
    ) -> Result<(), MemoryError> {
        Ok(())
    }
}
