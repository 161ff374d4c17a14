//! ============================================================================
//! Store - Synced key-value storage contract and typed records
//! ============================================================================
//! Records live under `profile`, `settings`, `rewards` and `subscription`,
//! plus `currentTask` for the task being worked through. Missing keys load
//! as defaults. Writes are last-write-wins; there is no read-modify-write
//! protection across processes.
//! ============================================================================

mod disk;
mod memory;

pub use disk::RedbStore;
pub use memory::MemoryStore;

use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::access::SubscriptionTier;
use crate::task::InteractiveTask;
use crate::types::{Profile, RewardTable, Settings};

pub const KEY_PROFILE: &str = "profile";
pub const KEY_SETTINGS: &str = "settings";
pub const KEY_REWARDS: &str = "rewards";
pub const KEY_SUBSCRIPTION: &str = "subscription";
pub const KEY_CURRENT_TASK: &str = "currentTask";

/// `get(keys)` / `set(mapping)` storage. `get` omits keys that are not stored.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>>;
    fn set(&self, values: HashMap<String, Value>) -> Result<()>;
}

/// Default value for each known key
fn defaults() -> Result<Vec<(&'static str, Value)>> {
    Ok(vec![
        (KEY_PROFILE, serde_json::to_value(Profile::default())?),
        (KEY_SUBSCRIPTION, serde_json::to_value(SubscriptionTier::default())?),
        (KEY_SETTINGS, serde_json::to_value(Settings::default())?),
        (KEY_REWARDS, serde_json::to_value(RewardTable::default())?),
    ])
}

/// Write defaults for keys that are missing (or stored as null).
/// Returns the keys that were written.
pub fn init_defaults(store: &dyn KeyValueStore) -> Result<Vec<String>> {
    let defaults = defaults()?;
    let keys: Vec<&str> = defaults.iter().map(|(key, _)| *key).collect();
    let existing = store.get(&keys)?;

    let to_set: HashMap<String, Value> = defaults
        .into_iter()
        .filter(|(key, _)| existing.get(*key).map_or(true, Value::is_null))
        .map(|(key, value)| (key.to_string(), value))
        .collect();

    let mut written: Vec<String> = to_set.keys().cloned().collect();
    written.sort();

    if !to_set.is_empty() {
        store.set(to_set)?;
        info!("Initialized defaults for: {}", written.join(", "));
    }

    Ok(written)
}

fn load_or_default<T: DeserializeOwned + Default>(store: &dyn KeyValueStore, key: &str) -> Result<T> {
    match store.get(&[key])?.remove(key) {
        Some(Value::Null) | None => {
            debug!("No stored {}, using defaults", key);
            Ok(T::default())
        }
        Some(value) => serde_json::from_value(value)
            .map_err(|e| anyhow!("Failed to deserialize {}: {}", key, e)),
    }
}

fn save<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let value = serde_json::to_value(value)
        .map_err(|e| anyhow!("Failed to serialize {}: {}", key, e))?;
    store.set(HashMap::from([(key.to_string(), value)]))
}

pub fn load_profile(store: &dyn KeyValueStore) -> Result<Profile> {
    load_or_default(store, KEY_PROFILE)
}

pub fn save_profile(store: &dyn KeyValueStore, profile: &Profile) -> Result<()> {
    save(store, KEY_PROFILE, profile)
}

pub fn load_settings(store: &dyn KeyValueStore) -> Result<Settings> {
    load_or_default(store, KEY_SETTINGS)
}

pub fn save_settings(store: &dyn KeyValueStore, settings: &Settings) -> Result<()> {
    save(store, KEY_SETTINGS, settings)
}

pub fn load_rewards(store: &dyn KeyValueStore) -> Result<RewardTable> {
    load_or_default(store, KEY_REWARDS)
}

pub fn save_rewards(store: &dyn KeyValueStore, rewards: &RewardTable) -> Result<()> {
    save(store, KEY_REWARDS, rewards)
}

pub fn load_subscription(store: &dyn KeyValueStore) -> Result<SubscriptionTier> {
    load_or_default(store, KEY_SUBSCRIPTION)
}

pub fn save_subscription(store: &dyn KeyValueStore, tier: SubscriptionTier) -> Result<()> {
    save(store, KEY_SUBSCRIPTION, &tier)
}

/// Task the user is currently working through, if any
pub fn load_current_task(store: &dyn KeyValueStore) -> Result<Option<InteractiveTask>> {
    load_or_default(store, KEY_CURRENT_TASK)
}

/// Replace the current task; `None` clears it
pub fn save_current_task(store: &dyn KeyValueStore, task: Option<&InteractiveTask>) -> Result<()> {
    save(store, KEY_CURRENT_TASK, &task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActionKind, RewardBundle};
    use serde_json::json;

    #[test]
    fn test_init_defaults_on_empty_store() {
        let store = MemoryStore::new();
        let written = init_defaults(&store).unwrap();

        assert_eq!(written, vec!["profile", "rewards", "settings", "subscription"]);
        assert_eq!(load_profile(&store).unwrap(), Profile::default());
        assert_eq!(load_subscription(&store).unwrap(), SubscriptionTier::Free);
        assert_eq!(load_rewards(&store).unwrap().bundle(ActionKind::Daily).xp, 10);
    }

    #[test]
    fn test_init_defaults_keeps_existing_keys() {
        let store = MemoryStore::with_entries(HashMap::from([
            ("profile".to_string(), json!({"level": 4, "xp": 12})),
            ("subscription".to_string(), json!("premium")),
            ("settings".to_string(), Value::Null),
        ]));

        let written = init_defaults(&store).unwrap();
        assert_eq!(written, vec!["rewards", "settings"]);

        let profile = load_profile(&store).unwrap();
        assert_eq!(profile.level, 4);
        assert_eq!(profile.xp, 12);
        assert_eq!(load_subscription(&store).unwrap(), SubscriptionTier::Premium);

        // Second run has nothing left to do
        assert!(init_defaults(&store).unwrap().is_empty());
    }

    #[test]
    fn test_missing_keys_load_as_defaults() {
        let store = MemoryStore::new();
        assert_eq!(load_settings(&store).unwrap(), Settings::default());
        assert_eq!(load_rewards(&store).unwrap(), RewardTable::default());
    }

    #[test]
    fn test_custom_rewards_round_trip() {
        let store = MemoryStore::new();
        let mut rewards = RewardTable::default();
        rewards
            .0
            .insert("podcast".to_string(), RewardBundle::new(20, 0, 0, 0));
        save_rewards(&store, &rewards).unwrap();

        let loaded = load_rewards(&store).unwrap();
        assert_eq!(loaded.bundle_for("podcast").xp, 20);
    }

    #[test]
    fn test_malformed_record_is_an_error() {
        let store = MemoryStore::with_entries(HashMap::from([(
            "profile".to_string(),
            json!("not a profile"),
        )]));
        let err = load_profile(&store).unwrap_err();
        assert!(err.to_string().contains("profile"));
    }

    #[test]
    fn test_current_task_round_trip() {
        let store = MemoryStore::new();
        assert!(load_current_task(&store).unwrap().is_none());

        let task: InteractiveTask = serde_json::from_value(json!({
            "title": "Tea",
            "steps": [{"id": 1, "title": "Boil"}]
        }))
        .unwrap();
        save_current_task(&store, Some(&task)).unwrap();
        assert_eq!(load_current_task(&store).unwrap(), Some(task));

        save_current_task(&store, None).unwrap();
        assert!(load_current_task(&store).unwrap().is_none());
    }

    #[test]
    fn test_save_and_load_through_redb() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("store.redb")).unwrap();
        init_defaults(&store).unwrap();

        let mut settings = load_settings(&store).unwrap();
        settings.api_key = "sk-live".into();
        save_settings(&store, &settings).unwrap();
        save_subscription(&store, SubscriptionTier::Premium).unwrap();

        assert_eq!(load_settings(&store).unwrap().api_key, "sk-live");
        assert!(load_subscription(&store).unwrap().is_premium());
    }
}
