//! Group-scope state: participants, the rolling channel buffer, and the
//! per-channel response policy.
//!
//! Everything here is process-local and rebuildable from channel history.

pub mod coref;
pub mod decision;

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use parley_config::OrganicConfig;

pub use decision::{DecisionEngine, GateOutcome};

/// Rolling channel buffer bounds: count and age.
pub const MAX_BUFFER_MESSAGES: usize = 50;
pub const MAX_BUFFER_AGE_MINUTES: i64 = 30;

/// Most participants tracked per channel; least recently seen is evicted.
pub const MAX_PARTICIPANTS: usize = 20;

/// A participant counts as active if seen within this window.
pub const ACTIVE_WINDOW_MINUTES: i64 = 30;

const MAX_ENTITY_MENTIONS: usize = 10;
const MAX_RATE_WINDOW: usize = 20;

/// One entity referent a participant mentioned, with when.
#[derive(Debug, Clone)]
pub struct EntityMention {
    pub entity: String,
    pub at: DateTime<Utc>,
}

/// Per-channel, per-user rolling state used for response decisioning.
#[derive(Debug, Clone)]
pub struct ParticipantState {
    pub user_id: String,
    pub display_name: String,
    pub last_seen_at: DateTime<Utc>,
    pub message_count: u64,
    /// Referents this participant mentioned, most recent first, bounded.
    pub recent_entity_mentions: VecDeque<EntityMention>,
    /// Timestamps of their recent messages, bounded.
    pub message_rate_window: VecDeque<DateTime<Utc>>,
}

impl ParticipantState {
    fn new(user_id: &str, display_name: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            display_name: display_name.to_string(),
            last_seen_at: now,
            message_count: 0,
            recent_entity_mentions: VecDeque::new(),
            message_rate_window: VecDeque::new(),
        }
    }

    fn record(&mut self, display_name: &str, entities: Vec<String>, now: DateTime<Utc>) {
        self.last_seen_at = now;
        self.message_count += 1;
        self.display_name = display_name.to_string();

        self.message_rate_window.push_back(now);
        while self.message_rate_window.len() > MAX_RATE_WINDOW {
            self.message_rate_window.pop_front();
        }

        for entity in entities {
            self.recent_entity_mentions
                .push_front(EntityMention { entity, at: now });
        }
        self.recent_entity_mentions.truncate(MAX_ENTITY_MENTIONS);
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now - self.last_seen_at < Duration::minutes(ACTIVE_WINDOW_MINUTES)
    }
}

/// A message in the rolling channel buffer.
#[derive(Debug, Clone)]
pub struct BufferedMessage {
    pub author_id: String,
    pub author_name: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Per-channel response tunables and organic-response accounting.
///
/// Counters are mutated only by the decision engine, exactly once per
/// accepted message. The daily counter resets on a rolling 24h boundary
/// anchored at the window's first accepted response.
#[derive(Debug, Clone)]
pub struct ChannelPolicy {
    pub sensitivity_threshold: f32,
    pub quiet_mode: bool,
    pub cooldown: Duration,
    pub daily_limit: u32,
    pub responses_today: u32,
    pub last_organic_response_at: Option<DateTime<Utc>>,
    window_started_at: Option<DateTime<Utc>>,
}

impl ChannelPolicy {
    pub fn from_config(config: &OrganicConfig) -> Self {
        Self {
            sensitivity_threshold: config.confidence_threshold,
            quiet_mode: false,
            cooldown: Duration::minutes(config.cooldown_minutes as i64),
            daily_limit: config.daily_limit,
            responses_today: 0,
            last_organic_response_at: None,
            window_started_at: None,
        }
    }

    fn maybe_reset_daily(&mut self, now: DateTime<Utc>) {
        if let Some(started) = self.window_started_at {
            if now - started >= Duration::hours(24) {
                self.responses_today = 0;
                self.window_started_at = None;
            }
        }
    }

    /// Check rate limits. Returns the suppression reason when limited.
    /// Both checks are hard caps regardless of score.
    pub fn check_limits(&mut self, now: DateTime<Utc>) -> Option<&'static str> {
        self.maybe_reset_daily(now);

        if let Some(last) = self.last_organic_response_at {
            if now - last < self.cooldown {
                return Some("cooldown");
            }
        }
        if self.responses_today >= self.daily_limit {
            return Some("daily_limit");
        }
        None
    }

    /// Account for one accepted organic response.
    pub fn record_response(&mut self, now: DateTime<Utc>) {
        self.last_organic_response_at = Some(now);
        self.responses_today += 1;
        if self.window_started_at.is_none() {
            self.window_started_at = Some(now);
        }
    }
}

/// All decision-engine state for one group scope.
#[derive(Debug, Clone)]
pub struct GroupState {
    pub participants: HashMap<String, ParticipantState>,
    pub buffer: VecDeque<BufferedMessage>,
    pub policy: ChannelPolicy,
}

impl GroupState {
    pub fn new(policy: ChannelPolicy) -> Self {
        Self {
            participants: HashMap::new(),
            buffer: VecDeque::new(),
            policy,
        }
    }

    /// Record one inbound message: participant bookkeeping, entity mentions,
    /// buffer append, pruning. Called once per message regardless of the
    /// decision outcome, including for the assistant's own output.
    pub fn record_message(
        &mut self,
        author_id: &str,
        author_name: &str,
        text: &str,
        now: DateTime<Utc>,
    ) {
        if !self.participants.contains_key(author_id)
            && self.participants.len() >= MAX_PARTICIPANTS
        {
            if let Some(oldest) = self
                .participants
                .values()
                .min_by_key(|p| p.last_seen_at)
                .map(|p| p.user_id.clone())
            {
                self.participants.remove(&oldest);
            }
        }

        let entities = coref::extract_entities(text, &self.participants);
        self.participants
            .entry(author_id.to_string())
            .or_insert_with(|| ParticipantState::new(author_id, author_name, now))
            .record(author_name, entities, now);

        self.buffer.push_back(BufferedMessage {
            author_id: author_id.to_string(),
            author_name: author_name.to_string(),
            text: text.to_string(),
            timestamp: now,
        });
        self.prune(now);
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let max_age = Duration::minutes(MAX_BUFFER_AGE_MINUTES);
        while self
            .buffer
            .front()
            .is_some_and(|m| now - m.timestamp > max_age)
        {
            self.buffer.pop_front();
        }
        while self.buffer.len() > MAX_BUFFER_MESSAGES {
            self.buffer.pop_front();
        }
    }

    pub fn active_participants(&self, now: DateTime<Utc>) -> Vec<&ParticipantState> {
        let mut active: Vec<_> = self
            .participants
            .values()
            .filter(|p| p.is_active(now))
            .collect();
        active.sort_by(|a, b| b.last_seen_at.cmp(&a.last_seen_at));
        active
    }

    /// Format the channel buffer for classifier evaluation.
    pub fn render_context(&self, count: usize, now: DateTime<Utc>) -> String {
        let mut lines = Vec::new();

        let active = self.active_participants(now);
        if !active.is_empty() {
            let names: Vec<_> = active
                .iter()
                .take(5)
                .map(|p| p.display_name.as_str())
                .collect();
            lines.push(format!("Active participants: {}", names.join(", ")));
        }

        let start = self.buffer.len().saturating_sub(count);
        for msg in self.buffer.iter().skip(start) {
            lines.push(format!(
                "[{}] {}: {}",
                msg.timestamp.format("%H:%M"),
                msg.author_name,
                msg.text
            ));
        }
        lines.join("\n")
    }
}
