//! # Settings Module
//!
//! User preferences behind a simple key/value get/put interface.
//!
//! Storage is deliberately abstract: the relay consumes settings through
//! [`SettingsStore`] and never touches a database directly. The in-memory
//! store is the default backing; a persistent backing implements the same
//! trait. Corrupt or unknown stored values fall back to defaults on read,
//! never to an error.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key under which user preferences are stored
pub const PREFERENCES_KEY: &str = "preferences";

/// Key under which the last-write timestamp is stored
pub const UPDATED_AT_KEY: &str = "preferences_updated_at";

/// Key/value settings storage
pub trait SettingsStore: Send + Sync {
    /// Fetch the raw value for a key
    fn get(&self, key: &str) -> Option<Value>;

    /// Store the raw value for a key, replacing any previous value
    fn put(&self, key: &str, value: Value);
}

/// In-memory settings store
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: RwLock<HashMap<String, Value>>,
}

impl MemorySettingsStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.read().ok()?.get(key).cloned()
    }

    fn put(&self, key: &str, value: Value) {
        if let Ok(mut values) = self.values.write() {
            values.insert(key.to_string(), value);
        }
    }
}

/// User preferences with serde-backed defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPreferences {
    /// UI theme name
    pub theme: String,

    /// Whether spoken responses are enabled
    pub tts_enabled: bool,

    /// Directories pinned in the workspace list
    pub pinned_directories: Vec<String>,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            theme: "system".to_string(),
            tts_enabled: false,
            pinned_directories: Vec::new(),
        }
    }
}

/// Preferences plus the time they were last written
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    pub preferences: UserPreferences,
    pub updated_at: i64,
}

/// Read preferences from a store, merging over defaults.
///
/// Missing keys and values that fail to deserialize both yield defaults.
pub fn load_preferences(store: &dyn SettingsStore) -> UserPreferences {
    store
        .get(PREFERENCES_KEY)
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

/// Read preferences plus their last-write time
pub fn load_settings(store: &dyn SettingsStore) -> SettingsResponse {
    let updated_at = store
        .get(UPDATED_AT_KEY)
        .and_then(|v| v.as_i64())
        .unwrap_or_else(|| Utc::now().timestamp_millis());
    SettingsResponse {
        preferences: load_preferences(store),
        updated_at,
    }
}

/// Write preferences to a store
pub fn save_preferences(store: &dyn SettingsStore, preferences: &UserPreferences) -> SettingsResponse {
    let updated_at = Utc::now().timestamp_millis();
    if let Ok(value) = serde_json::to_value(preferences) {
        store.put(PREFERENCES_KEY, value);
        store.put(UPDATED_AT_KEY, Value::from(updated_at));
    }
    SettingsResponse {
        preferences: preferences.clone(),
        updated_at,
    }
}

/// Apply a partial update on top of the stored preferences.
///
/// Unknown keys are ignored; a type mismatch rejects the whole patch and
/// leaves the stored value untouched.
pub fn update_preferences(
    store: &dyn SettingsStore,
    patch: &Value,
) -> Result<SettingsResponse, serde_json::Error> {
    let current = load_preferences(store);
    let mut merged = serde_json::to_value(&current)?;

    if let (Some(target), Some(changes)) = (merged.as_object_mut(), patch.as_object()) {
        for (key, value) in changes {
            target.insert(key.clone(), value.clone());
        }
    }

    let updated: UserPreferences = serde_json::from_value(merged)?;
    Ok(save_preferences(store, &updated))
}
