//! crates/training_tracker_core/src/registry.rs
//!
//! The document registry: decides whether a document was already analyzed
//! and persists the record of what happened when a new one was processed.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

use crate::domain::{
    Assignment, AssignmentHistoryEntry, DocumentRecord, Fingerprint, SkippedDuplicate,
    TITLE_PREFIX_CHARS,
};
use crate::ports::{PortError, PortResult, SnapshotStore};

const DOCUMENTS_TABLE: &str = "documents";
const HISTORY_TABLE: &str = "assignment_history";

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryState {
    documents: HashMap<Fingerprint, DocumentRecord>,
    history: HashMap<String, Vec<AssignmentHistoryEntry>>,
}

/// Deduplicates documents by content fingerprint and owns the per-user
/// assignment history.
///
/// All state lives behind one mutex; every mutating call persists the full
/// map to the snapshot store before returning, so concurrent requests cannot
/// interleave between a read-modify-write and its flush.
pub struct DocumentRegistry {
    state: Mutex<RegistryState>,
    store: Arc<dyn SnapshotStore>,
}

impl DocumentRegistry {
    /// Opens the registry, loading any previously persisted state.
    ///
    /// A missing or corrupt snapshot starts the registry empty; the data loss
    /// is surfaced as a startup warning rather than a fatal error so a bad
    /// file never prevents the service from coming up.
    pub async fn open(store: Arc<dyn SnapshotStore>) -> Self {
        let documents = load_or_default(store.as_ref(), DOCUMENTS_TABLE).await;
        let history = load_or_default(store.as_ref(), HISTORY_TABLE).await;
        Self {
            state: Mutex::new(RegistryState { documents, history }),
            store,
        }
    }

    /// Computes the duplicate-detection fingerprint for a document text.
    pub fn fingerprint(text: &str) -> Fingerprint {
        Fingerprint::of_text(text)
    }

    /// O(1) check: has this exact document (by fingerprint) been processed?
    pub async fn is_duplicate(&self, text: &str) -> (bool, Option<DocumentRecord>) {
        let hash = Fingerprint::of_text(text);
        let state = self.state.lock().await;
        match state.documents.get(&hash) {
            Some(record) => (true, Some(record.clone())),
            None => (false, None),
        }
    }

    /// Records a processed document and appends one history entry per
    /// assigned user, then persists before returning.
    ///
    /// Saving a fingerprint that already exists overwrites the prior record
    /// (last-write-wins); callers are expected to have checked
    /// [`is_duplicate`](Self::is_duplicate) first.
    pub async fn save(
        &self,
        text: &str,
        assignments: &[Assignment],
        skipped_duplicates: Vec<SkippedDuplicate>,
    ) -> PortResult<Fingerprint> {
        let hash = Fingerprint::of_text(text);
        let now = Utc::now();

        let mut state = self.state.lock().await;
        state.documents.insert(
            hash.clone(),
            DocumentRecord {
                processed_at: now,
                title: title_preview(text),
                assignments_count: assignments.len(),
                assigned_users: assignments.iter().map(|a| a.user_id.clone()).collect(),
                skipped_duplicates,
            },
        );

        for assignment in assignments {
            state
                .history
                .entry(assignment.user_id.clone())
                .or_default()
                .push(AssignmentHistoryEntry {
                    document_hash: hash.clone(),
                    courses: assignment.courses_assigned.clone(),
                    assigned_at: now,
                    reason: assignment.reason.clone(),
                });
        }

        self.persist(&state).await?;
        Ok(hash)
    }

    /// Assignment history for one user, insertion order, oldest first.
    /// Unknown users get an empty history, never an error.
    pub async fn user_history(&self, user_id: &str) -> Vec<AssignmentHistoryEntry> {
        let state = self.state.lock().await;
        state.history.get(user_id).cloned().unwrap_or_default()
    }

    /// Every course ever granted to a user, across all documents. Used to
    /// avoid re-assigning a course without evaluating expiration.
    pub async fn all_assigned_courses(&self, user_id: &str) -> BTreeSet<String> {
        let state = self.state.lock().await;
        let mut courses = BTreeSet::new();
        if let Some(entries) = state.history.get(user_id) {
            for entry in entries {
                courses.extend(entry.courses.iter().cloned());
            }
        }
        courses
    }

    /// Whether a course already appears anywhere in the user's history.
    pub async fn has_prior_assignment(&self, user_id: &str, course_id: &str) -> bool {
        let state = self.state.lock().await;
        state
            .history
            .get(user_id)
            .map(|entries| entries.iter().any(|e| e.courses.iter().any(|c| c == course_id)))
            .unwrap_or(false)
    }

    /// Full per-user history, for the org-wide expiration sweep.
    pub async fn all_histories(&self) -> Vec<(String, Vec<AssignmentHistoryEntry>)> {
        let state = self.state.lock().await;
        let mut histories: Vec<_> = state
            .history
            .iter()
            .map(|(user, entries)| (user.clone(), entries.clone()))
            .collect();
        histories.sort_by(|a, b| a.0.cmp(&b.0));
        histories
    }

    /// All processed documents, most recently processed first.
    pub async fn documents(&self) -> Vec<(Fingerprint, DocumentRecord)> {
        let state = self.state.lock().await;
        let mut docs: Vec<_> = state
            .documents
            .iter()
            .map(|(hash, record)| (hash.clone(), record.clone()))
            .collect();
        docs.sort_by(|a, b| b.1.processed_at.cmp(&a.1.processed_at));
        docs
    }

    pub async fn document_count(&self) -> usize {
        self.state.lock().await.documents.len()
    }

    async fn persist(&self, state: &RegistryState) -> PortResult<()> {
        let documents = serde_json::to_value(&state.documents)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.store.persist(DOCUMENTS_TABLE, documents).await?;

        let history = serde_json::to_value(&state.history)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.store.persist(HISTORY_TABLE, history).await
    }
}

/// Truncates the document text into its stored title.
fn title_preview(text: &str) -> String {
    let title: String = text.chars().take(TITLE_PREFIX_CHARS).collect();
    if text.chars().count() > TITLE_PREFIX_CHARS {
        format!("{}...", title)
    } else {
        title
    }
}

/// Loads one table from a snapshot store, falling back to empty state.
/// Load failures are logged once here, not turned into per-call errors.
pub(crate) async fn load_or_default<T>(store: &dyn SnapshotStore, table: &str) -> T
where
    T: DeserializeOwned + Default,
{
    match store.load(table).await {
        Ok(Some(value)) => match serde_json::from_value(value) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(table, %err, "corrupt snapshot, starting with empty state");
                T::default()
            }
        },
        Ok(None) => T::default(),
        Err(err) => {
            warn!(table, %err, "failed to load snapshot, starting with empty state");
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn assignment(user_id: &str, courses: &[&str], reason: &str) -> Assignment {
        Assignment {
            user_id: user_id.to_string(),
            courses_assigned: courses.iter().map(|c| c.to_string()).collect(),
            reason: reason.to_string(),
            course_periods: Vec::new(),
        }
    }

    #[tokio::test]
    async fn save_then_is_duplicate_finds_the_record() {
        let registry = DocumentRegistry::open(Arc::new(MemoryStore::new())).await;
        let text = "Annual lab safety update";

        let (dup, _) = registry.is_duplicate(text).await;
        assert!(!dup);

        let hash = registry
            .save(text, &[assignment("U1", &["LAB-SAFETY-101"], "new policy")], Vec::new())
            .await
            .unwrap();
        assert_eq!(hash, DocumentRegistry::fingerprint(text));

        let (dup, record) = registry.is_duplicate(text).await;
        assert!(dup);
        let record = record.unwrap();
        assert_eq!(record.title, "Annual lab safety update");
        assert_eq!(record.assignments_count, 1);
        assert_eq!(record.assigned_users, vec!["U1".to_string()]);
    }

    #[tokio::test]
    async fn long_titles_are_truncated_with_an_ellipsis() {
        let registry = DocumentRegistry::open(Arc::new(MemoryStore::new())).await;
        let text = "z".repeat(250);

        registry.save(&text, &[], Vec::new()).await.unwrap();

        let (_, record) = registry.is_duplicate(&text).await;
        let title = record.unwrap().title;
        assert_eq!(title.len(), TITLE_PREFIX_CHARS + 3);
        assert!(title.ends_with("..."));
    }

    #[tokio::test]
    async fn user_history_keeps_insertion_order_oldest_first() {
        let registry = DocumentRegistry::open(Arc::new(MemoryStore::new())).await;

        registry
            .save("doc one", &[assignment("U1", &["LAB-SAFETY-101"], "")], Vec::new())
            .await
            .unwrap();
        registry
            .save("doc two", &[assignment("U1", &["HAZCOM-1910.1200"], "")], Vec::new())
            .await
            .unwrap();

        let history = registry.user_history("U1").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].courses, vec!["LAB-SAFETY-101".to_string()]);
        assert_eq!(history[1].courses, vec!["HAZCOM-1910.1200".to_string()]);

        let courses = registry.all_assigned_courses("U1").await;
        assert!(courses.contains("LAB-SAFETY-101"));
        assert!(courses.contains("HAZCOM-1910.1200"));
        assert!(registry.has_prior_assignment("U1", "LAB-SAFETY-101").await);
        assert!(!registry.has_prior_assignment("U1", "RADIATION-ALARA-101").await);
    }

    #[tokio::test]
    async fn unknown_users_have_empty_history() {
        let registry = DocumentRegistry::open(Arc::new(MemoryStore::new())).await;
        assert!(registry.user_history("nobody").await.is_empty());
        assert!(registry.all_assigned_courses("nobody").await.is_empty());
    }

    #[tokio::test]
    async fn saving_the_same_fingerprint_overwrites_the_document_record() {
        let registry = DocumentRegistry::open(Arc::new(MemoryStore::new())).await;
        let text = "identical prefix document";

        registry
            .save(text, &[assignment("U1", &["LAB-SAFETY-101"], "")], Vec::new())
            .await
            .unwrap();
        registry
            .save(
                text,
                &[
                    assignment("U1", &["LAB-SAFETY-101"], ""),
                    assignment("U2", &["HAZCOM-1910.1200"], ""),
                ],
                Vec::new(),
            )
            .await
            .unwrap();

        assert_eq!(registry.document_count().await, 1);
        let (_, record) = registry.is_duplicate(text).await;
        assert_eq!(record.unwrap().assignments_count, 2);

        // History is append-only even when the document record is replaced.
        assert_eq!(registry.user_history("U1").await.len(), 2);
    }

    #[tokio::test]
    async fn state_survives_a_reopen_from_the_same_store() {
        let store = Arc::new(MemoryStore::new());

        {
            let registry = DocumentRegistry::open(store.clone()).await;
            registry
                .save(
                    "persisted document",
                    &[assignment("U1", &["LAB-SAFETY-101"], "audit finding")],
                    Vec::new(),
                )
                .await
                .unwrap();
        }

        let reopened = DocumentRegistry::open(store).await;
        let (dup, _) = reopened.is_duplicate("persisted document").await;
        assert!(dup);
        let history = reopened.user_history("U1").await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason, "audit finding");
    }
}
