//! The group response decision engine.
//!
//! For channel messages that did not address the assistant, decide whether
//! to respond at all, before any model call for the reply is made. Gate
//! order: direct mention bypass, quiet mode, enabled flag, classifier score
//! against the channel threshold, cooldown, daily limit. Counters move
//! exactly once per accepted message.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parley_core::model::LanguageModel;
use parley_core::scope::InboundMessage;
use tracing::{debug, warn};

use super::{GroupState, coref};

/// How many buffered messages the classifier sees as channel context.
const CLASSIFIER_CONTEXT_MESSAGES: usize = 20;

/// The gate's verdict for one group message.
#[derive(Debug, Clone)]
pub enum GateOutcome {
    Respond {
        /// Message text after coreference annotation.
        resolved_text: String,
        /// Classifier score; `None` for the direct-mention bypass.
        score: Option<f32>,
    },
    Suppress {
        reason: &'static str,
        resolved_text: String,
    },
}

/// Decides response eligibility for group scopes.
pub struct DecisionEngine {
    model: Arc<dyn LanguageModel>,
    enabled: bool,
}

impl DecisionEngine {
    pub fn new(model: Arc<dyn LanguageModel>, enabled: bool) -> Self {
        Self { model, enabled }
    }

    /// Evaluate one inbound group message.
    ///
    /// Participant and buffer bookkeeping happens unconditionally before
    /// any gating, so suppressed messages still enrich later decisions.
    /// Classifier failure fails closed: without a score there is no organic
    /// response.
    pub async fn evaluate(
        &self,
        group: &mut GroupState,
        msg: &InboundMessage,
        now: DateTime<Utc>,
    ) -> GateOutcome {
        group.record_message(&msg.author_id, &msg.author_name, &msg.text, now);
        let resolved_text = coref::resolve(&msg.text, &msg.author_id, &group.participants);

        if msg.is_direct_mention {
            return GateOutcome::Respond {
                resolved_text,
                score: None,
            };
        }
        if group.policy.quiet_mode {
            return GateOutcome::Suppress {
                reason: "quiet_mode",
                resolved_text,
            };
        }
        if !self.enabled {
            return GateOutcome::Suppress {
                reason: "organic_disabled",
                resolved_text,
            };
        }

        let channel_context = group.render_context(CLASSIFIER_CONTEXT_MESSAGES, now);
        let score = match self.model.classify(&resolved_text, &channel_context).await {
            Ok(score) => score,
            Err(e) => {
                warn!(scope = %msg.scope, "Classifier unavailable, suppressing: {e}");
                return GateOutcome::Suppress {
                    reason: "classifier_unavailable",
                    resolved_text,
                };
            }
        };

        // Inclusive boundary: a score exactly at the threshold passes.
        if score < group.policy.sensitivity_threshold {
            debug!(scope = %msg.scope, score, threshold = group.policy.sensitivity_threshold, "Below threshold");
            return GateOutcome::Suppress {
                reason: "below_threshold",
                resolved_text,
            };
        }

        if let Some(reason) = group.policy.check_limits(now) {
            debug!(scope = %msg.scope, reason, "Rate limited");
            return GateOutcome::Suppress {
                reason,
                resolved_text,
            };
        }

        group.policy.record_response(now);
        debug!(scope = %msg.scope, score, "Organic response accepted");
        GateOutcome::Respond {
            resolved_text,
            score: Some(score),
        }
    }
}
