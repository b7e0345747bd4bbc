//! Language-model trait — the abstraction over LLM backends.
//!
//! The orchestrator needs exactly two capabilities: generate text from an
//! assembled context (`complete`, used for chat replies and session
//! summaries) and score a message for response-worthiness (`classify`, used
//! by the group decision engine). Transport, retries, and provider routing
//! live behind this seam.

use async_trait::async_trait;

use crate::decision::Tier;
use crate::error::ModelError;
use crate::message::ChatMessage;

/// The language-model client trait.
///
/// Implementations are selected at configuration time; the orchestration
/// pipeline calls through this trait without knowing which backend answers.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// A human-readable name for this client (e.g. "anthropic", "mock").
    fn name(&self) -> &str;

    /// Generate a completion for an assembled context at the given tier.
    async fn complete(
        &self,
        context: &[ChatMessage],
        tier: Tier,
    ) -> std::result::Result<String, ModelError>;

    /// Score a message's response-worthiness in [0, 1] given rendered
    /// channel context. Higher means the assistant more likely has something
    /// worth saying.
    async fn classify(
        &self,
        text: &str,
        channel_context: &str,
    ) -> std::result::Result<f32, ModelError>;
}
