//! Configuration loading, validation, and management for Parley.
//!
//! Loads configuration from a TOML file with environment variable overrides.
//! Validates all settings at startup — a malformed threshold is fatal here,
//! never per-message (the running core assumes validated configuration).

use std::path::{Path, PathBuf};

use parley_core::decision::Tier;
use serde::{Deserialize, Serialize};

/// The root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// The assistant's display name; messages authored under this id are
    /// never evaluated for a response (no self-triggering)
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,

    /// The persona/system preamble injected at the top of every context.
    /// Opaque to the orchestration core.
    #[serde(default = "default_persona")]
    pub persona: String,

    /// Session lifecycle settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Context assembly settings
    #[serde(default)]
    pub context: ContextConfig,

    /// Organic (unaddressed) response settings for group scopes
    #[serde(default)]
    pub organic: OrganicConfig,

    /// Model tier selection settings
    #[serde(default)]
    pub tier: TierConfig,
}

fn default_assistant_name() -> String {
    "Parley".into()
}

fn default_persona() -> String {
    "You are Parley, a helpful conversational assistant.".into()
}

/// Session lifecycle tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle minutes after which a session expires and is snapshotted
    #[serde(default = "default_idle_minutes")]
    pub idle_minutes: u64,

    /// How many recent messages of the current session enter the context
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,

    /// How many final messages a snapshot carries forward
    #[serde(default = "default_snapshot_tail")]
    pub snapshot_tail_size: usize,
}

fn default_idle_minutes() -> u64 {
    30
}
fn default_recent_window() -> usize {
    20
}
fn default_snapshot_tail() -> usize {
    10
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_minutes: default_idle_minutes(),
            recent_window: default_recent_window(),
            snapshot_tail_size: default_snapshot_tail(),
        }
    }
}

/// Context assembly tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Total token budget for an assembled context (4 chars ≈ 1 token)
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,

    /// Maximum memory facts injected per assembly
    #[serde(default = "default_max_facts")]
    pub max_memory_facts: usize,
}

fn default_token_budget() -> usize {
    4096
}
fn default_max_facts() -> usize {
    10
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            token_budget: default_token_budget(),
            max_memory_facts: default_max_facts(),
        }
    }
}

/// Organic response tunables — defaults for each channel's policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganicConfig {
    /// Whether organic responses are enabled at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum classifier score to respond, inclusive
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// Minutes to wait after an organic response before another
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: u64,

    /// Maximum organic responses per channel per rolling 24h window
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
}

fn default_true() -> bool {
    true
}
fn default_confidence_threshold() -> f32 {
    0.4
}
fn default_cooldown_minutes() -> u64 {
    3
}
fn default_daily_limit() -> u32 {
    50
}

impl Default for OrganicConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            confidence_threshold: default_confidence_threshold(),
            cooldown_minutes: default_cooldown_minutes(),
            daily_limit: default_daily_limit(),
        }
    }
}

/// Model tier selection tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    /// Whether automatic tier selection is enabled
    #[serde(default = "default_true")]
    pub auto_enabled: bool,

    /// Tier used when auto-selection is disabled or inconclusive
    #[serde(default = "default_tier")]
    pub default_tier: Tier,
}

fn default_tier() -> Tier {
    Tier::Mid
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            auto_enabled: true,
            default_tier: Tier::Mid,
        }
    }
}

impl AppConfig {
    /// Load configuration from a file, then apply environment overrides and
    /// validate. A missing file yields defaults (still env-overridable).
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        } else {
            tracing::info!("No config file found at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply the recognized environment variable overrides.
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(v) = env_parse::<u64>("SESSION_IDLE_MINUTES")? {
            self.session.idle_minutes = v;
        }
        if let Some(v) = env_parse::<usize>("SESSION_RECENT_WINDOW")? {
            self.session.recent_window = v;
        }
        if let Some(v) = env_parse::<usize>("SNAPSHOT_TAIL_SIZE")? {
            self.session.snapshot_tail_size = v;
        }
        if let Some(v) = env_bool("ORGANIC_RESPONSE_ENABLED") {
            self.organic.enabled = v;
        }
        if let Some(v) = env_parse::<f32>("ORGANIC_CONFIDENCE_THRESHOLD")? {
            self.organic.confidence_threshold = v;
        }
        if let Some(v) = env_parse::<u64>("ORGANIC_COOLDOWN_MINUTES")? {
            self.organic.cooldown_minutes = v;
        }
        if let Some(v) = env_parse::<u32>("ORGANIC_DAILY_LIMIT")? {
            self.organic.daily_limit = v;
        }
        if let Some(v) = env_bool("AUTO_TIER_ENABLED") {
            self.tier.auto_enabled = v;
        }
        if let Ok(raw) = std::env::var("MODEL_TIER") {
            self.tier.default_tier = Tier::parse(&raw).ok_or_else(|| {
                ConfigError::ValidationError(format!("MODEL_TIER must be high/mid/low, got {raw:?}"))
            })?;
        }
        Ok(())
    }

    /// Validate the configuration. Called once at startup; violations are
    /// fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.idle_minutes == 0 {
            return Err(ConfigError::ValidationError(
                "session.idle_minutes must be > 0".into(),
            ));
        }
        if self.session.recent_window == 0 {
            return Err(ConfigError::ValidationError(
                "session.recent_window must be > 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.organic.confidence_threshold) {
            return Err(ConfigError::ValidationError(format!(
                "organic.confidence_threshold must be in [0, 1], got {}",
                self.organic.confidence_threshold
            )));
        }
        if self.context.token_budget == 0 {
            return Err(ConfigError::ValidationError(
                "context.token_budget must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            assistant_name: default_assistant_name(),
            persona: default_persona(),
            session: SessionConfig::default(),
            context: ContextConfig::default(),
            organic: OrganicConfig::default(),
            tier: TierConfig::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::ValidationError(format!("{name}={raw:?}: {e}"))),
        Err(_) => Ok(None),
    }
}

fn env_bool(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| v.to_ascii_lowercase() == "true")
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
