//! In-memory state store

use std::collections::HashMap;

use async_trait::async_trait;
use pagetrail_core::storage::StateStore;
use pagetrail_domain::Result;
use serde_json::Value;
use tokio::sync::RwLock;

/// HashMap-backed store. Nothing survives a restart; intended for tests
/// and for running the pipeline without a durable backend.
#[derive(Default)]
pub struct MemoryStateStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let entries = self.entries.read().await;
        Ok(keys
            .iter()
            .filter_map(|k| entries.get(*k).map(|v| ((*k).to_owned(), v.clone())))
            .collect())
    }

    async fn set(&self, new_entries: HashMap<String, Value>) -> Result<()> {
        self.entries.write().await.extend(new_entries);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}
