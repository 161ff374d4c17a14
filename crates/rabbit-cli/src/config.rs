// ============================================================================
// Shell configuration - environment overrides and store location
// ============================================================================
// .env is loaded by main before this runs. Env values win over the stored
// settings for the lifetime of one command; they are never written back.
// ============================================================================

use anyhow::{anyhow, Result};
use rabbit_core::completion::RetryConfig;
use rabbit_core::Settings;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Default store location under the home directory
const STORE_DIR: &str = ".white-rabbit";
const STORE_FILE: &str = "store.redb";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub db_path: Option<String>,
    /// Total completion attempts, including the first
    pub max_attempts: Option<u32>,
    /// Randomize backoff waits
    pub retry_jitter: bool,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: non_empty_var("WHITE_RABBIT_API_KEY").or_else(|| non_empty_var("OPENAI_API_KEY")),
            base_url: non_empty_var("WHITE_RABBIT_BASE_URL"),
            model: non_empty_var("WHITE_RABBIT_MODEL"),
            db_path: non_empty_var("WHITE_RABBIT_DB_PATH"),
            max_attempts: non_empty_var("WHITE_RABBIT_MAX_ATTEMPTS").and_then(|v| {
                v.trim()
                    .parse()
                    .map_err(|e| warn!("Ignoring WHITE_RABBIT_MAX_ATTEMPTS={}: {}", v, e))
                    .ok()
            }),
            retry_jitter: non_empty_var("WHITE_RABBIT_RETRY_JITTER")
                .is_some_and(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes")),
        }
    }

    /// Retry policy for the completion client
    pub fn retry_config(&self) -> RetryConfig {
        let defaults = RetryConfig::default();
        RetryConfig {
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts).max(1),
            jitter: self.retry_jitter,
            ..defaults
        }
    }

    /// Stored settings with env overrides applied
    pub fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(key) = &self.api_key {
            debug!("Using API key from environment");
            settings.api_key = key.clone();
        }
        if let Some(url) = &self.base_url {
            settings.base_url = url.clone();
        }
        if let Some(model) = &self.model {
            settings.model = model.clone();
        }
        settings
    }

    /// `--db-path`, then WHITE_RABBIT_DB_PATH, then ~/.white-rabbit/store.redb
    pub fn resolve_db_path(&self, cli_path: Option<&str>) -> Result<PathBuf> {
        if let Some(p) = cli_path {
            return Ok(PathBuf::from(p));
        }
        if let Some(p) = &self.db_path {
            return Ok(PathBuf::from(p));
        }

        let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
        Ok(home.join(STORE_DIR).join(STORE_FILE))
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Show only the tail of a secret
pub fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return "(not set)".to_string();
    }
    let tail: String = secret
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("****{}", tail)
}
