//! Scripted collaborator implementations for tests.
//!
//! `ScriptedModel` answers `complete` from a queue (falling back to a fixed
//! reply once the queue drains) and `classify` from a queue of scores, and
//! records every call so tests can assert on the contexts the orchestrator
//! actually assembled.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use parley_core::decision::Tier;
use parley_core::error::ModelError;
use parley_core::message::ChatMessage;
use parley_core::model::LanguageModel;

/// A mock language model with scripted completions and classifier scores.
pub struct ScriptedModel {
    completions: Mutex<VecDeque<String>>,
    fallback_completion: String,
    fail_completions: bool,

    scores: Mutex<VecDeque<f32>>,
    fallback_score: f32,
    fail_classify: bool,

    seen_contexts: Mutex<Vec<Vec<ChatMessage>>>,
    seen_tiers: Mutex<Vec<Tier>>,
    classify_calls: Mutex<Vec<(String, String)>>,
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self {
            completions: Mutex::new(VecDeque::new()),
            fallback_completion: "Understood.".into(),
            fail_completions: false,
            scores: Mutex::new(VecDeque::new()),
            fallback_score: 0.0,
            fail_classify: false,
            seen_contexts: Mutex::new(Vec::new()),
            seen_tiers: Mutex::new(Vec::new()),
            classify_calls: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedModel {
    /// Queue the next completion text.
    pub fn with_completion(self, text: &str) -> Self {
        self.completions.lock().unwrap().push_back(text.to_string());
        self
    }

    /// Every `complete` call fails.
    pub fn with_failing_completions(mut self) -> Self {
        self.fail_completions = true;
        self
    }

    /// Queue the next classifier score.
    pub fn with_score(self, score: f32) -> Self {
        self.scores.lock().unwrap().push_back(score);
        self
    }

    /// Score returned once the queue drains.
    pub fn with_fallback_score(mut self, score: f32) -> Self {
        self.fallback_score = score;
        self
    }

    /// Every `classify` call fails.
    pub fn with_failing_classifier(mut self) -> Self {
        self.fail_classify = true;
        self
    }

    /// Number of `complete` calls made so far.
    pub fn complete_calls(&self) -> usize {
        self.seen_contexts.lock().unwrap().len()
    }

    /// Number of `classify` calls made so far.
    pub fn classify_count(&self) -> usize {
        self.classify_calls.lock().unwrap().len()
    }

    /// The context handed to the `n`-th `complete` call.
    pub fn context_at(&self, n: usize) -> Vec<ChatMessage> {
        self.seen_contexts.lock().unwrap()[n].clone()
    }

    /// The tier of the `n`-th `complete` call.
    pub fn tier_at(&self, n: usize) -> Tier {
        self.seen_tiers.lock().unwrap()[n]
    }

    /// The (text, channel_context) of the last `classify` call.
    pub fn last_classified(&self) -> Option<(String, String)> {
        self.classify_calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        context: &[ChatMessage],
        tier: Tier,
    ) -> Result<String, ModelError> {
        self.seen_contexts.lock().unwrap().push(context.to_vec());
        self.seen_tiers.lock().unwrap().push(tier);

        if self.fail_completions {
            return Err(ModelError::Unavailable("scripted failure".into()));
        }

        Ok(self
            .completions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback_completion.clone()))
    }

    async fn classify(&self, text: &str, channel_context: &str) -> Result<f32, ModelError> {
        self.classify_calls
            .lock()
            .unwrap()
            .push((text.to_string(), channel_context.to_string()));

        if self.fail_classify {
            return Err(ModelError::Timeout("scripted classifier down".into()));
        }

        Ok(self
            .scores
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback_score))
    }
}
