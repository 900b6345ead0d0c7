//! JSON file state store
//!
//! Durable adapter: the whole key space lives in one JSON object on disk.
//! The file is loaded once at open; every mutation rewrites it through a
//! temp file and an atomic rename so a crash mid-write leaves the previous
//! snapshot intact.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pagetrail_core::storage::StateStore;
use pagetrail_domain::{PagetrailError, Result};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, Value>>,
}

impl JsonFileStore {
    /// Open the store, loading existing state from `path` if present.
    ///
    /// # Errors
    /// Returns `PagetrailError::Storage` when the file exists but cannot be
    /// read or is not a JSON object.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let value: Value = serde_json::from_slice(&bytes).map_err(|e| {
                    PagetrailError::Storage(format!(
                        "state file {} is not valid JSON: {e}",
                        path.display()
                    ))
                })?;
                match value {
                    Value::Object(map) => map.into_iter().collect(),
                    other => {
                        return Err(PagetrailError::Storage(format!(
                            "state file {} holds {} instead of an object",
                            path.display(),
                            json_kind(&other)
                        )))
                    }
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "state file absent, starting empty");
                HashMap::new()
            }
            Err(err) => {
                return Err(PagetrailError::Storage(format!(
                    "failed to read state file {}: {err}",
                    path.display()
                )))
            }
        };

        Ok(Self { path, entries: RwLock::new(entries) })
    }

    /// Serialize the current snapshot and swap it into place.
    async fn persist(&self, entries: &HashMap<String, Value>) -> Result<()> {
        let object: serde_json::Map<String, Value> =
            entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let bytes = serde_json::to_vec_pretty(&Value::Object(object))
            .map_err(|e| PagetrailError::Storage(format!("failed to serialize state: {e}")))?;

        let tmp = temp_sibling(&self.path);
        tokio::fs::write(&tmp, &bytes).await.map_err(|e| {
            PagetrailError::Storage(format!("failed to write {}: {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            PagetrailError::Storage(format!(
                "failed to replace state file {}: {e}",
                self.path.display()
            ))
        })
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(std::ffi::OsStr::to_owned).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let entries = self.entries.read().await;
        Ok(keys
            .iter()
            .filter_map(|k| entries.get(*k).map(|v| ((*k).to_owned(), v.clone())))
            .collect())
    }

    async fn set(&self, new_entries: HashMap<String, Value>) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.extend(new_entries);
        self.persist(&entries).await
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(*key);
        }
        self.persist(&entries).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        {
            let store = JsonFileStore::open(&path).await.unwrap();
            let mut entries = HashMap::new();
            entries.insert("accessToken".to_string(), json!("tok"));
            entries.insert("pendingUploads".to_string(), json!([{ "url": "u" }]));
            store.set(entries).await.unwrap();
        }

        let reopened = JsonFileStore::open(&path).await.unwrap();
        let map = reopened.get(&["accessToken", "pendingUploads"]).await.unwrap();
        assert_eq!(map["accessToken"], json!("tok"));
        assert_eq!(map["pendingUploads"], json!([{ "url": "u" }]));
    }

    #[tokio::test]
    async fn remove_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = JsonFileStore::open(&path).await.unwrap();
        let mut entries = HashMap::new();
        entries.insert("a".to_string(), json!(1));
        store.set(entries).await.unwrap();
        store.remove(&["a"]).await.unwrap();

        let reopened = JsonFileStore::open(&path).await.unwrap();
        assert!(reopened.get(&["a"]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("absent.json")).await.unwrap();
        assert!(store.get(&["anything"]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let err = JsonFileStore::open(&path).await.unwrap_err();
        assert!(matches!(err, PagetrailError::Storage(_)));
    }

    #[tokio::test]
    async fn non_object_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, b"[1, 2]").await.unwrap();

        let err = JsonFileStore::open(&path).await.unwrap_err();
        assert!(matches!(err, PagetrailError::Storage(_)));
    }
}
