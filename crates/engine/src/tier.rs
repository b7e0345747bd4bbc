//! Automatic model tier selection.
//!
//! Tier assignment:
//! - LOW: simple chat, acknowledgments, quick facts
//! - MID: most conversations, moderate reasoning
//! - HIGH: complex analysis, multi-step reasoning, creative tasks
//!
//! Manual overrides always win. The selector is a pure function of its
//! inputs and configuration: identical inputs always return the same tier.

use parley_core::decision::Tier;
use parley_config::TierConfig;

/// Keyword phrases that strongly suggest the high tier.
const HIGH_TIER_KEYWORDS: &[&str] = &[
    "analyze",
    "analyse",
    "deep dive",
    "comprehensive",
    "thorough",
    "detailed analysis",
    "explain the implications",
    "trade-offs",
    "tradeoffs",
    "code review",
    "review this code",
    "security audit",
    "architecture review",
    "write a story",
    "write a poem",
    "creative writing",
    "brainstorm ideas",
    "create a plan",
    "design a system",
    "architect",
    "strategy",
    "step by step",
    "walk me through",
    "break down",
];

/// Single words for which the low tier is plenty.
const LOW_TIER_KEYWORDS: &[&str] = &[
    "hi", "hello", "hey", "thanks", "yes", "no", "ok", "okay", "sure", "cool", "nice",
    "goodbye", "bye",
];

/// A message longer than this counts as one complexity indicator.
const LONG_MESSAGE_CHARS: usize = 600;

/// How many high-tier indicators it takes to actually pick High.
const HIGH_TIER_INDICATORS: u32 = 2;

/// Maps a message to a cost/capability tier.
pub struct TierSelector {
    config: TierConfig,
}

impl TierSelector {
    pub fn new(config: TierConfig) -> Self {
        Self { config }
    }

    /// Select the tier for one message. `override_tier` (an explicit user
    /// directive) wins unconditionally; with auto-selection disabled the
    /// configured default is returned.
    pub fn select(&self, message_text: &str, override_tier: Option<Tier>) -> Tier {
        if let Some(tier) = override_tier {
            return tier;
        }
        if !self.config.auto_enabled {
            return self.config.default_tier;
        }

        let lower = message_text.to_lowercase();

        // Short greetings and acknowledgments go straight to low tier
        let words: Vec<&str> = lower.split_whitespace().collect();
        if words.len() <= 5
            && words
                .iter()
                .any(|w| LOW_TIER_KEYWORDS.contains(&w.trim_matches(|c: char| !c.is_alphanumeric())))
        {
            return Tier::Low;
        }

        if Self::high_tier_indicators(&lower, message_text) >= HIGH_TIER_INDICATORS {
            return Tier::High;
        }

        self.config.default_tier
    }

    fn high_tier_indicators(lower: &str, original: &str) -> u32 {
        let mut indicators = 0;
        for keyword in HIGH_TIER_KEYWORDS {
            if lower.contains(keyword) {
                indicators += 1;
            }
        }
        if original.contains("```") {
            indicators += 1;
        }
        if original.len() > LONG_MESSAGE_CHARS {
            indicators += 1;
        }
        indicators
    }
}
