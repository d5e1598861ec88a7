//! crates/training_tracker_core/src/audit.rs
//!
//! The append-only audit trail. This is the system of record for "what
//! happened when", and the only place priority and free-text reasons are
//! retained per assignment.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::{
    AuditEvent, AuditEventKind, CompletionMethod, EventKind, Fingerprint, Priority,
};
use crate::ports::{PortError, PortResult, SnapshotStore};
use crate::registry::load_or_default;

const AUDIT_TABLE: &str = "audit_log";

/// Durable, ordered, append-only event log. No event is ever removed or
/// edited; every append is flushed before the call returns, trading write
/// throughput for crash durability at event granularity.
pub struct AuditLog {
    events: Mutex<Vec<AuditEvent>>,
    store: Arc<dyn SnapshotStore>,
}

impl AuditLog {
    /// Opens the log, loading any persisted events. A missing or corrupt
    /// snapshot starts the log empty with a startup warning.
    pub async fn open(store: Arc<dyn SnapshotStore>) -> Self {
        let events = load_or_default(store.as_ref(), AUDIT_TABLE).await;
        Self {
            events: Mutex::new(events),
            store,
        }
    }

    /// Appends one event, assigning the next 1-based sequential ID under the
    /// log mutex so concurrent appends cannot duplicate IDs.
    pub async fn append(&self, kind: AuditEventKind) -> PortResult<AuditEvent> {
        let mut events = self.events.lock().await;
        let event = AuditEvent {
            id: events.len() as u64 + 1,
            timestamp: Utc::now(),
            kind,
        };
        events.push(event.clone());
        self.persist(&events).await?;
        Ok(event)
    }

    pub async fn record_assignment(
        &self,
        user_id: &str,
        course_id: &str,
        assigned_by: &str,
        reason: &str,
        priority: Priority,
        document_hash: Option<Fingerprint>,
    ) -> PortResult<AuditEvent> {
        self.append(AuditEventKind::CourseAssigned {
            user_id: user_id.to_string(),
            course_id: course_id.to_string(),
            assigned_by: assigned_by.to_string(),
            reason: reason.to_string(),
            priority,
            document_hash,
        })
        .await
    }

    pub async fn record_document_processed(
        &self,
        document_hash: Fingerprint,
        assignments_count: usize,
        title_preview: &str,
    ) -> PortResult<AuditEvent> {
        self.append(AuditEventKind::DocumentProcessed {
            document_hash,
            assignments_count,
            title_preview: title_preview.to_string(),
        })
        .await
    }

    pub async fn record_completion(
        &self,
        user_id: &str,
        course_id: &str,
        method: CompletionMethod,
    ) -> PortResult<AuditEvent> {
        self.append(AuditEventKind::CourseCompleted {
            user_id: user_id.to_string(),
            course_id: course_id.to_string(),
            method,
        })
        .await
    }

    /// The most recent events, newest first, truncated to `limit`.
    pub async fn recent_events(&self, limit: usize) -> Vec<AuditEvent> {
        let events = self.events.lock().await;
        let mut recent: Vec<AuditEvent> = events.clone();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent.truncate(limit);
        recent
    }

    /// Events of one kind for one user, in insertion order.
    pub async fn user_events(&self, user_id: &str, kind: EventKind) -> Vec<AuditEvent> {
        let events = self.events.lock().await;
        events
            .iter()
            .filter(|e| e.kind.kind() == kind && e.kind.user_id() == Some(user_id))
            .cloned()
            .collect()
    }

    /// All events of one kind, in insertion order.
    pub async fn events_of_kind(&self, kind: EventKind) -> Vec<AuditEvent> {
        let events = self.events.lock().await;
        events.iter().filter(|e| e.kind.kind() == kind).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.events.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.lock().await.is_empty()
    }

    async fn persist(&self, events: &[AuditEvent]) -> PortResult<()> {
        let snapshot =
            serde_json::to_value(events).map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.store.persist(AUDIT_TABLE, snapshot).await
    }
}
