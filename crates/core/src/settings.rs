//! Pipeline settings
//!
//! Settings are consumed from the state store, not owned by the pipeline:
//! the UI collaborator writes them, we read them per event. Each field
//! falls back to its default independently when the stored value is missing
//! or has the wrong shape, so one corrupted key never poisons the rest.

use std::collections::HashMap;
use std::time::Duration;

use pagetrail_domain::constants::{
    keys, DEFAULT_DWELL_THRESHOLD_SECS, DEFAULT_IGNORE_PATTERNS, MAX_DWELL_THRESHOLD_SECS,
    MIN_DWELL_THRESHOLD_SECS,
};
use pagetrail_domain::{FilterMode, Result};
use serde_json::{json, Value};
use tracing::debug;

use crate::storage::StateStore;

/// Snapshot of the configuration consumed by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Master switch; nothing is reported when off
    pub logging_enabled: bool,
    /// Filter interpretation mode
    pub filter_mode: FilterMode,
    /// Raw filter patterns (compiled lazily by the tracking service)
    pub ignore_patterns: Vec<String>,
    /// Dwell-time batching switch; off means immediate delivery
    pub batch_mode_enabled: bool,
    /// Dwell threshold, already clamped to the sane range
    pub dwell_threshold: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            logging_enabled: true,
            filter_mode: FilterMode::Blacklist,
            ignore_patterns: DEFAULT_IGNORE_PATTERNS.iter().map(|s| (*s).to_string()).collect(),
            batch_mode_enabled: false,
            dwell_threshold: Duration::from_secs(DEFAULT_DWELL_THRESHOLD_SECS),
        }
    }
}

impl Settings {
    /// Load a settings snapshot from the store, defaulting field-wise.
    pub async fn load(store: &dyn StateStore) -> Result<Self> {
        let map = store
            .get(&[
                keys::LOGGING_ENABLED,
                keys::FILTER_MODE,
                keys::IGNORE_PATTERNS,
                keys::BATCH_MODE_ENABLED,
                keys::DWELL_THRESHOLD_SECS,
            ])
            .await?;
        let defaults = Self::default();

        Ok(Self {
            logging_enabled: map
                .get(keys::LOGGING_ENABLED)
                .and_then(Value::as_bool)
                .unwrap_or(defaults.logging_enabled),
            filter_mode: map
                .get(keys::FILTER_MODE)
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or(defaults.filter_mode),
            ignore_patterns: map
                .get(keys::IGNORE_PATTERNS)
                .and_then(|v| serde_json::from_value::<Vec<String>>(v.clone()).ok())
                .unwrap_or(defaults.ignore_patterns),
            batch_mode_enabled: map
                .get(keys::BATCH_MODE_ENABLED)
                .and_then(Value::as_bool)
                .unwrap_or(defaults.batch_mode_enabled),
            dwell_threshold: map
                .get(keys::DWELL_THRESHOLD_SECS)
                .and_then(Value::as_u64)
                .map_or(defaults.dwell_threshold, |secs| {
                    Duration::from_secs(
                        secs.clamp(MIN_DWELL_THRESHOLD_SECS, MAX_DWELL_THRESHOLD_SECS),
                    )
                }),
        })
    }

    /// Persist defaults for any settings key not yet present, leaving
    /// existing values untouched. Called once at startup.
    pub async fn ensure_defaults(store: &dyn StateStore) -> Result<()> {
        let stored = store
            .get(&[
                keys::LOGGING_ENABLED,
                keys::FILTER_MODE,
                keys::IGNORE_PATTERNS,
                keys::BATCH_MODE_ENABLED,
                keys::DWELL_THRESHOLD_SECS,
            ])
            .await?;
        let defaults = Self::default();
        let mut updates: HashMap<String, Value> = HashMap::new();

        if !stored.get(keys::LOGGING_ENABLED).is_some_and(Value::is_boolean) {
            updates.insert(keys::LOGGING_ENABLED.into(), json!(defaults.logging_enabled));
        }
        let valid_mode = stored
            .get(keys::FILTER_MODE)
            .is_some_and(|v| serde_json::from_value::<FilterMode>(v.clone()).is_ok());
        if !valid_mode {
            updates.insert(keys::FILTER_MODE.into(), json!(defaults.filter_mode));
        }
        if !stored.get(keys::IGNORE_PATTERNS).is_some_and(Value::is_array) {
            updates.insert(keys::IGNORE_PATTERNS.into(), json!(defaults.ignore_patterns));
        }
        if !stored.get(keys::BATCH_MODE_ENABLED).is_some_and(Value::is_boolean) {
            updates.insert(keys::BATCH_MODE_ENABLED.into(), json!(defaults.batch_mode_enabled));
        }
        if !stored.get(keys::DWELL_THRESHOLD_SECS).is_some_and(Value::is_u64) {
            updates.insert(
                keys::DWELL_THRESHOLD_SECS.into(),
                json!(defaults.dwell_threshold.as_secs()),
            );
        }

        if !updates.is_empty() {
            debug!(count = updates.len(), "seeding default settings");
            store.set(updates).await?;
        }
        Ok(())
    }
}
