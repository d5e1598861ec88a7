//! crates/training_tracker_core/src/memory.rs
//!
//! An in-memory [`SnapshotStore`] for tests and ephemeral deployments.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::ports::{PortError, PortResult, SnapshotStore};

/// Keeps every table in a process-local map. Nothing survives a restart,
/// which is exactly what isolated tests want.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn load(&self, table: &str) -> PortResult<Option<serde_json::Value>> {
        let tables = self
            .tables
            .lock()
            .map_err(|e| PortError::Storage(e.to_string()))?;
        Ok(tables.get(table).cloned())
    }

    async fn persist(&self, table: &str, snapshot: serde_json::Value) -> PortResult<()> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|e| PortError::Storage(e.to_string()))?;
        tables.insert(table.to_string(), snapshot);
        Ok(())
    }
}
