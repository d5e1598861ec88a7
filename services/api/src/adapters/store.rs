//! services/api/src/adapters/store.rs
//!
//! This module contains the file-backed storage adapter, the concrete
//! implementation of the `SnapshotStore` port from the `core` crate. Each
//! table lives in its own JSON file under the configured data directory.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use training_tracker_core::ports::{PortError, PortResult, SnapshotStore};

/// A snapshot store that keeps one pretty-printed JSON file per table.
///
/// Writes go through a temp file followed by a rename, so a crash mid-write
/// leaves the previous snapshot intact instead of a half-written file.
#[derive(Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Creates a new `JsonFileStore` rooted at `dir`. The directory is
    /// created lazily on the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.json", table))
    }
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    async fn load(&self, table: &str) -> PortResult<Option<serde_json::Value>> {
        let path = self.path_for(table);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PortError::Storage(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let value = serde_json::from_slice(&bytes).map_err(|e| {
            PortError::Storage(format!("corrupt snapshot {}: {}", path.display(), e))
        })?;
        Ok(Some(value))
    }

    async fn persist(&self, table: &str, snapshot: serde_json::Value) -> PortResult<()> {
        let path = self.path_for(table);
        let tmp_path = self.dir.join(format!("{}.json.tmp", table));

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PortError::Storage(format!("failed to create data dir: {}", e)))?;

        let bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        tokio::fs::write(&tmp_path, bytes).await.map_err(|e| {
            PortError::Storage(format!("failed to write {}: {}", tmp_path.display(), e))
        })?;
        tokio::fs::rename(&tmp_path, &path).await.map_err(|e| {
            PortError::Storage(format!("failed to replace {}: {}", path.display(), e))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn persist_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        let snapshot = json!({"U1": [{"courses": ["LAB-SAFETY-101"]}]});
        store.persist("assignment_history", snapshot.clone()).await.unwrap();

        let loaded = store.load("assignment_history").await.unwrap();
        assert_eq!(loaded, Some(snapshot));
    }

    #[tokio::test]
    async fn missing_tables_load_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(store.load("documents").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_files_surface_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        tokio::fs::write(dir.path().join("audit_log.json"), b"{not json")
            .await
            .unwrap();

        let err = store.load("audit_log").await.unwrap_err();
        assert!(matches!(err, PortError::Storage(_)));
    }

    #[tokio::test]
    async fn persist_replaces_the_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        store.persist("completions", json!([1])).await.unwrap();
        store.persist("completions", json!([1, 2])).await.unwrap();

        assert_eq!(store.load("completions").await.unwrap(), Some(json!([1, 2])));
    }
}
