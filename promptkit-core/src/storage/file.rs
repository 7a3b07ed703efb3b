//! Single-document JSON store on the local filesystem.
//!
//! The whole map lives in one file. Every mutation rewrites it using the
//! write-to-temp-then-rename pattern:
//! 1. Write the document to `{file}.{uuid}.tmp` in the same directory
//! 2. Sync the temporary file to disk
//! 3. Atomically rename it over the target
//!
//! Readers therefore see either the complete old or the complete new
//! document. There is no cross-process locking.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::error::{StorageError, StorageResult};
use super::traits::{entry_size, KeyValueStore};

/// [`KeyValueStore`] persisted as one JSON object in a file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    quota_bytes: Option<u64>,
    cache: Mutex<Option<Map<String, Value>>>,
}

impl JsonFileStore {
    /// Opens (lazily) the store at `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            quota_bytes: None,
            cache: Mutex::new(None),
        }
    }

    /// Rejects writes that would grow the store past `quota_bytes`.
    #[must_use]
    pub const fn with_quota(mut self, quota_bytes: u64) -> Self {
        self.quota_bytes = Some(quota_bytes);
        self
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(path: &Path) -> StorageResult<Map<String, Value>> {
        match tokio::fs::read(path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Map::new()),
            Ok(bytes) => match serde_json::from_slice(&bytes)? {
                Value::Object(map) => Ok(map),
                _ => Err(StorageError::Serialization(format!(
                    "{} does not contain a JSON object",
                    path.display()
                ))),
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn persist(&self, map: &Map<String, Value>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let bytes = serde_json::to_vec_pretty(map)?;
        let file_name = self
            .path
            .file_name()
            .map_or_else(|| "store".into(), |name| name.to_string_lossy());
        let tmp = self
            .path
            .with_file_name(format!("{file_name}.{}.tmp", uuid::Uuid::new_v4()));

        let result = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(&bytes).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, &self.path).await
        }
        .await;

        if let Err(err) = result {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        debug!("persisted {} entries to {}", map.len(), self.path.display());
        Ok(())
    }

    fn check_quota(&self, map: &Map<String, Value>) -> StorageResult<()> {
        let Some(quota) = self.quota_bytes else {
            return Ok(());
        };
        let used: u64 = map.iter().map(|(k, v)| entry_size(k, v)).sum();
        if used > quota {
            return Err(StorageError::QuotaExceeded);
        }
        Ok(())
    }

    /// Applies `mutate` to the cached map and persists the result.
    ///
    /// The cache is only replaced once the file write succeeded.
    async fn mutate<F>(&self, mutate: F) -> StorageResult<()>
    where
        F: FnOnce(&mut Map<String, Value>) + Send,
    {
        let mut cache = self.cache.lock().await;
        let mut next = match cache.as_ref() {
            Some(map) => map.clone(),
            None => Self::load(&self.path).await?,
        };
        mutate(&mut next);
        self.check_quota(&next)?;
        self.persist(&next).await?;
        *cache = Some(next);
        Ok(())
    }

    async fn snapshot(&self) -> StorageResult<Map<String, Value>> {
        let mut cache = self.cache.lock().await;
        if let Some(map) = cache.as_ref() {
            return Ok(map.clone());
        }
        let map = Self::load(&self.path).await?;
        *cache = Some(map.clone());
        Ok(map)
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        Ok(self.snapshot().await?.remove(key))
    }

    async fn get_all(&self) -> StorageResult<Map<String, Value>> {
        self.snapshot().await
    }

    async fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        let key = key.to_string();
        self.mutate(move |map| {
            map.insert(key, value);
        })
        .await
    }

    async fn set_many(&self, entries: Map<String, Value>) -> StorageResult<()> {
        self.mutate(move |map| map.extend(entries)).await
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let key = key.to_string();
        self.mutate(move |map| {
            map.remove(&key);
        })
        .await
    }

    async fn bytes_in_use(&self) -> StorageResult<u64> {
        let map = self.snapshot().await?;
        Ok(map.iter().map(|(k, v)| entry_size(k, v)).sum())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let store = JsonFileStore::new(&path);
        assert_eq!(store.get("prompts").await.unwrap(), None);
        store.set("prompts", json!([{"text": "hi"}])).await.unwrap();
        store.set("theme", json!("dark")).await.unwrap();
        store.remove("theme").await.unwrap();

        let reopened = JsonFileStore::new(&path);
        assert_eq!(
            reopened.get("prompts").await.unwrap(),
            Some(json!([{"text": "hi"}]))
        );
        assert_eq!(reopened.get("theme").await.unwrap(), None);

        // No temp files left behind.
        let leftovers = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter(|entry| {
                entry
                    .as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(".tmp")
            })
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_quota_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let store = JsonFileStore::new(&path).with_quota(32);

        store.set("a", json!("small")).await.unwrap();
        let err = store.set("b", json!("x".repeat(64))).await.unwrap_err();
        assert!(err.is_quota_exceeded());

        let reopened = JsonFileStore::new(&path);
        assert_eq!(reopened.get("b").await.unwrap(), None);
        assert_eq!(store.get("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejects_non_object_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, b"[1, 2, 3]").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(
            store.get("a").await,
            Err(StorageError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_set_many() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("s.json"));
        let mut entries = Map::new();
        entries.insert("a".to_string(), json!(1));
        entries.insert("b".to_string(), json!(2));
        store.set_many(entries).await.unwrap();
        assert_eq!(store.get_all().await.unwrap().len(), 2);
        assert!(store.bytes_in_use().await.unwrap() > 0);
    }
}
