//! ============================================================================
//! Core Types for White Rabbit
//! ============================================================================
//! Profile, reward and settings records. These are stored as JSON in synced
//! key-value storage, so field names keep the extension's camelCase keys.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::RabbitError;

/// Cap for health and food
pub const VITALS_MAX: i64 = 10;

/// XP required per level is `LEVEL_XP_STEP * level`
pub const LEVEL_XP_STEP: i64 = 100;

/// Default instruction used for rewrite/summarize/translate/explain requests
pub const DEFAULT_SYSTEM_PROMPT: &str = "You rewrite, summarize, translate, or produce clear, numbered step-by-step instructions. Preserve factual meaning; leave names and code blocks unchanged; keep formatting when useful.";

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

// ============================================================================
// Profile
// ============================================================================

/// Persistent gamification state of one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default = "default_level")]
    pub level: i64,
    #[serde(default)]
    pub xp: i64,
    #[serde(default)]
    pub coins: i64,
    #[serde(default = "default_vital")]
    pub health: i64,
    #[serde(default = "default_vital")]
    pub food: i64,
    #[serde(default)]
    pub streak: i64,
    /// RFC 3339 timestamp of the last daily claim, empty if never claimed
    #[serde(rename = "lastClaimISO", default)]
    pub last_claim_iso: String,
    #[serde(default)]
    pub knowledge_level: KnowledgeLevel,
    #[serde(default = "default_skills")]
    pub skills: Vec<String>,
    #[serde(default)]
    pub learning_style: LearningStyle,
}

fn default_level() -> i64 {
    1
}

fn default_vital() -> i64 {
    5
}

fn default_skills() -> Vec<String> {
    vec!["programming".to_string()]
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            level: 1,
            xp: 0,
            coins: 10,
            health: 5,
            food: 5,
            streak: 0,
            last_claim_iso: String::new(),
            knowledge_level: KnowledgeLevel::default(),
            skills: default_skills(),
            learning_style: LearningStyle::default(),
        }
    }
}

impl Profile {
    /// XP needed to leave the current level
    pub fn xp_to_next_level(&self) -> i64 {
        LEVEL_XP_STEP.saturating_mul(self.level.max(1)) - self.xp
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KnowledgeLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl KnowledgeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            KnowledgeLevel::Beginner => "beginner",
            KnowledgeLevel::Intermediate => "intermediate",
            KnowledgeLevel::Advanced => "advanced",
        }
    }
}

impl std::str::FromStr for KnowledgeLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "beginner" => Ok(KnowledgeLevel::Beginner),
            "intermediate" => Ok(KnowledgeLevel::Intermediate),
            "advanced" => Ok(KnowledgeLevel::Advanced),
            _ => Err(format!("Unknown knowledge level: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LearningStyle {
    #[default]
    Visual,
    Audio,
    Practical,
}

impl LearningStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            LearningStyle::Visual => "visual",
            LearningStyle::Audio => "audio",
            LearningStyle::Practical => "practical",
        }
    }
}

impl std::str::FromStr for LearningStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "visual" => Ok(LearningStyle::Visual),
            "audio" => Ok(LearningStyle::Audio),
            "practical" => Ok(LearningStyle::Practical),
            _ => Err(format!("Unknown learning style: {}", s)),
        }
    }
}

// ============================================================================
// Rewards
// ============================================================================

/// Deltas granted for completing an action. Missing fields are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RewardBundle {
    #[serde(default)]
    pub xp: i64,
    #[serde(default)]
    pub coins: i64,
    #[serde(default)]
    pub health: i64,
    #[serde(default)]
    pub food: i64,
}

impl RewardBundle {
    /// Parse one bundle, e.g. `{"xp": 8, "coins": 3}`
    pub fn from_json(json: &str) -> Result<Self, RabbitError> {
        serde_json::from_str(json).map_err(invalid_rewards)
    }

    pub const fn new(xp: i64, coins: i64, health: i64, food: i64) -> Self {
        Self {
            xp,
            coins,
            health,
            food,
        }
    }
}

fn invalid_rewards(e: serde_json::Error) -> RabbitError {
    RabbitError::Configuration(format!("Invalid rewards JSON format: {}", e))
}

/// Actions that earn rewards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    Rewrite,
    Summarize,
    Translate,
    ExplainStepByStep,
    InteractiveTask,
    CompleteStep,
    Daily,
}

impl ActionKind {
    pub const ALL: [ActionKind; 7] = [
        ActionKind::Rewrite,
        ActionKind::Summarize,
        ActionKind::Translate,
        ActionKind::ExplainStepByStep,
        ActionKind::InteractiveTask,
        ActionKind::CompleteStep,
        ActionKind::Daily,
    ];

    /// Storage key in the rewards mapping
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Rewrite => "rewrite",
            ActionKind::Summarize => "summarize",
            ActionKind::Translate => "translate",
            ActionKind::ExplainStepByStep => "explain-step-by-step",
            ActionKind::InteractiveTask => "interactive-task",
            ActionKind::CompleteStep => "complete-step",
            ActionKind::Daily => "daily",
        }
    }

    /// Whether this action is a text transform sent through the completion client
    pub fn is_transform(&self) -> bool {
        matches!(
            self,
            ActionKind::Rewrite
                | ActionKind::Summarize
                | ActionKind::Translate
                | ActionKind::ExplainStepByStep
        )
    }

    fn default_bundle(&self) -> RewardBundle {
        match self {
            ActionKind::Rewrite => RewardBundle::new(8, 3, 1, 1),
            ActionKind::Summarize => RewardBundle::new(6, 2, 1, 1),
            ActionKind::Translate => RewardBundle::new(5, 2, 0, 1),
            ActionKind::ExplainStepByStep => RewardBundle::new(12, 4, 2, 2),
            ActionKind::InteractiveTask => RewardBundle::new(15, 6, 3, 3),
            ActionKind::CompleteStep => RewardBundle::new(3, 1, 0, 0),
            ActionKind::Daily => RewardBundle::new(10, 5, 2, 2),
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("Unknown action: {}", s))
    }
}

/// Mapping from action name to reward bundle, as stored under `rewards`.
/// Keys are free-form so user-added actions survive a load/save cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RewardTable(pub HashMap<String, RewardBundle>);

impl Default for RewardTable {
    fn default() -> Self {
        Self(
            ActionKind::ALL
                .iter()
                .map(|a| (a.as_str().to_string(), a.default_bundle()))
                .collect(),
        )
    }
}

impl RewardTable {
    /// Parse a whole rewards mapping as the user edits it
    pub fn from_json(json: &str) -> Result<Self, RabbitError> {
        serde_json::from_str(json).map_err(invalid_rewards)
    }

    /// Replace (or add) the bundle for one action
    pub fn set_bundle(&mut self, action: &str, bundle: RewardBundle) {
        self.0.insert(action.to_string(), bundle);
    }

    /// Bundle for an action; unknown actions earn nothing
    pub fn bundle_for(&self, action: &str) -> RewardBundle {
        self.0.get(action).copied().unwrap_or_default()
    }

    pub fn bundle(&self, action: ActionKind) -> RewardBundle {
        self.bundle_for(action.as_str())
    }
}

// ============================================================================
// Settings
// ============================================================================

/// User-editable completion settings, stored under `settings`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_tone")]
    pub default_tone: String,
    #[serde(default = "default_language")]
    pub default_language: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_tone() -> String {
    "neutral".to_string()
}

fn default_language() -> String {
    "original".to_string()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model: default_model(),
            temperature: DEFAULT_TEMPERATURE,
            default_tone: default_tone(),
            default_language: default_language(),
            system_prompt: default_system_prompt(),
        }
    }
}

impl Settings {
    /// Human-readable problems with the completion settings, empty when valid
    pub fn validate(&self) -> Vec<String> {
        validate_endpoint(&self.api_key, &self.base_url, &self.model, self.temperature)
    }
}

/// Shared by settings and per-request validation
pub(crate) fn validate_endpoint(
    api_key: &str,
    base_url: &str,
    model: &str,
    temperature: f32,
) -> Vec<String> {
    let mut errors = Vec::new();

    if api_key.trim().is_empty() {
        errors.push("API key is required".to_string());
    }
    if base_url.trim().is_empty() {
        errors.push("Base URL is required".to_string());
    }
    if model.trim().is_empty() {
        errors.push("Model is required".to_string());
    }
    // NaN fails both comparisons, so test the accepted range directly
    if !(0.0..=1.0).contains(&temperature) {
        errors.push("Temperature must be between 0 and 1".to_string());
    }

    errors
}

/// User payload for the text transform actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformPayload {
    pub mode: ActionKind,
    pub tone: String,
    pub language: String,
    pub text: String,
}

impl TransformPayload {
    pub fn from_settings(mode: ActionKind, text: impl Into<String>, settings: &Settings) -> Self {
        let or_default = |value: &str, fallback: &str| {
            if value.trim().is_empty() {
                fallback.to_string()
            } else {
                value.to_string()
            }
        };

        Self {
            mode,
            tone: or_default(&settings.default_tone, "neutral"),
            language: or_default(&settings.default_language, "original"),
            text: text.into(),
        }
    }
}
