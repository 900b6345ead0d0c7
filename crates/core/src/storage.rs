//! State store port
//!
//! The only durable medium the pipeline knows about: an async key-value
//! store holding JSON values under string keys, with the same surface as
//! the host's local storage (`get`/`set`/`remove`). A single logical owner
//! is assumed; multi-writer races are out of scope.

use std::collections::HashMap;

use async_trait::async_trait;
use pagetrail_domain::constants::keys;
use pagetrail_domain::{Result, TokenSet};
use serde_json::Value;

/// Async key-value persistence boundary.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Fetch the given keys. Absent keys are omitted from the result map.
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>>;

    /// Persist every entry in the map.
    async fn set(&self, entries: HashMap<String, Value>) -> Result<()>;

    /// Remove the given keys. Removing an absent key is not an error.
    async fn remove(&self, keys: &[&str]) -> Result<()>;
}

/// Convenience accessors layered over the raw mapping API.
#[async_trait]
pub trait StateStoreExt: StateStore {
    /// Fetch a single key, `None` when absent.
    async fn get_value(&self, key: &str) -> Result<Option<Value>> {
        let mut map = self.get(&[key]).await?;
        Ok(map.remove(key))
    }

    /// Fetch a single key as a string, `None` when absent or not a string.
    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        let value = self.get_value(key).await?;
        Ok(value.and_then(|v| v.as_str().map(str::to_owned)))
    }

    /// Store a single key-value pair.
    async fn set_value(&self, key: &str, value: Value) -> Result<()> {
        let mut map = HashMap::with_capacity(1);
        map.insert(key.to_owned(), value);
        self.set(map).await
    }

    /// Read the persisted credential set.
    async fn token_set(&self) -> Result<TokenSet> {
        let map = self.get(&[keys::ACCESS_TOKEN, keys::REFRESH_TOKEN]).await?;
        let pick = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_owned);
        Ok(TokenSet {
            access_token: pick(keys::ACCESS_TOKEN),
            refresh_token: pick(keys::REFRESH_TOKEN),
        })
    }
}

#[async_trait]
impl<S: StateStore + ?Sized> StateStoreExt for S {}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory store used by core unit tests.

    use tokio::sync::RwLock;

    use super::*;

    /// HashMap-backed store; mirrors the infra adapter without the crate
    /// dependency cycle.
    #[derive(Default)]
    pub struct MapStore {
        entries: RwLock<HashMap<String, Value>>,
    }

    impl MapStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn seed(&self, key: &str, value: Value) {
            self.entries.write().await.insert(key.to_owned(), value);
        }
    }

    #[async_trait]
    impl StateStore for MapStore {
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
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::testing::MapStore;
    use super::*;

    #[tokio::test]
    async fn absent_keys_are_omitted() {
        let store = MapStore::new();
        store.seed("present", json!(1)).await;

        let map = store.get(&["present", "absent"]).await.unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["present"], json!(1));
    }

    #[tokio::test]
    async fn token_set_reads_both_keys() {
        let store = MapStore::new();
        store.seed(keys::ACCESS_TOKEN, json!("acc")).await;

        let tokens = store.token_set().await.unwrap();
        assert_eq!(tokens.access_token.as_deref(), Some("acc"));
        assert!(tokens.refresh_token.is_none());
    }

    #[tokio::test]
    async fn non_string_token_values_read_as_absent() {
        let store = MapStore::new();
        store.seed(keys::ACCESS_TOKEN, json!(42)).await;

        let tokens = store.token_set().await.unwrap();
        assert!(!tokens.has_any());
    }
}
