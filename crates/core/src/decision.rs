//! Response tiers and the orchestrator's outward-facing decision type.

use serde::{Deserialize, Serialize};

/// A named cost/capability level for model selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    High,
    Mid,
    Low,
}

impl Tier {
    /// Parse a tier name, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "mid" => Some(Self::Mid),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    /// Extract a `!high` / `!mid` / `!low` override prefix from a message,
    /// returning the tier and the remaining text.
    pub fn strip_prefix(text: &str) -> (Option<Self>, &str) {
        for (prefix, tier) in [
            ("!high", Self::High),
            ("!mid", Self::Mid),
            ("!low", Self::Low),
        ] {
            if let Some(rest) = text.strip_prefix(prefix) {
                return (Some(tier), rest.trim_start());
            }
        }
        (None, text)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::High => "high",
            Self::Mid => "mid",
            Self::Low => "low",
        };
        write!(f, "{s}")
    }
}

/// What the orchestrator decided for one inbound message.
///
/// `respond == false` means the message was absorbed silently (suppressed
/// organic candidate, or the assistant's own echo); this is never an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    /// Whether a response should be delivered
    pub respond: bool,

    /// The generated reply, present only when `respond` is true
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_text: Option<String>,

    /// The tier the response was (or would have been) generated with
    pub tier: Tier,

    /// The inbound text after coreference resolution; identical to the
    /// original text outside group scopes
    pub resolved_text: String,

    /// Why the message was suppressed, when it was
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppressed_reason: Option<String>,
}

impl Decision {
    pub fn respond(text: impl Into<String>, tier: Tier, resolved: impl Into<String>) -> Self {
        Self {
            respond: true,
            response_text: Some(text.into()),
            tier,
            resolved_text: resolved.into(),
            suppressed_reason: None,
        }
    }

    pub fn suppress(reason: impl Into<String>, tier: Tier, resolved: impl Into<String>) -> Self {
        Self {
            respond: false,
            response_text: None,
            tier,
            resolved_text: resolved.into(),
            suppressed_reason: Some(reason.into()),
        }
    }
}
