//! crates/training_tracker_core/src/completion.rs
//!
//! Tracks which users finished which courses. Deliberately independent of
//! the scheduler: "completed" and "expired" are orthogonal booleans that
//! callers combine into an effective status at query time.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::{CompletionMethod, CompletionRecord};
use crate::ports::{PortError, PortResult, SnapshotStore};
use crate::registry::load_or_default;

const COMPLETIONS_TABLE: &str = "completions";

/// Simple completion counters for dashboards.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct CompletionStats {
    pub total_completions: usize,
}

/// Append-only store of completion records. Records are never mutated or
/// deleted, and the (user, course) pair is not unique: re-certifying an
/// expired course simply adds another record.
pub struct CompletionTracker {
    records: Mutex<Vec<CompletionRecord>>,
    store: Arc<dyn SnapshotStore>,
}

impl CompletionTracker {
    /// Opens the tracker, loading any persisted records. A missing or
    /// corrupt snapshot starts empty with a startup warning.
    pub async fn open(store: Arc<dyn SnapshotStore>) -> Self {
        let records = load_or_default(store.as_ref(), COMPLETIONS_TABLE).await;
        Self {
            records: Mutex::new(records),
            store,
        }
    }

    /// Records a completion and persists before returning. Always creates a
    /// new record; preventing duplicate completions is the caller's job.
    pub async fn complete(
        &self,
        user_id: &str,
        course_id: &str,
        method: CompletionMethod,
    ) -> PortResult<CompletionRecord> {
        let record = CompletionRecord {
            user_id: user_id.to_string(),
            course_id: course_id.to_string(),
            completed_at: Utc::now(),
            method,
        };

        let mut records = self.records.lock().await;
        records.push(record.clone());
        self.persist(&records).await?;
        Ok(record)
    }

    /// Whether at least one completion exists for the pair, regardless of
    /// how it relates to the current assignment cycle. A stale completion
    /// from a prior cycle still reports true; callers that care about
    /// renewal must additionally consult the scheduler.
    pub async fn is_completed(&self, user_id: &str, course_id: &str) -> bool {
        let records = self.records.lock().await;
        records
            .iter()
            .any(|r| r.user_id == user_id && r.course_id == course_id)
    }

    pub async fn stats(&self) -> CompletionStats {
        CompletionStats {
            total_completions: self.records.lock().await.len(),
        }
    }

    /// Every completion record, insertion order.
    pub async fn all(&self) -> Vec<CompletionRecord> {
        self.records.lock().await.clone()
    }

    async fn persist(&self, records: &[CompletionRecord]) -> PortResult<()> {
        let snapshot =
            serde_json::to_value(records).map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.store.persist(COMPLETIONS_TABLE, snapshot).await
    }
}
