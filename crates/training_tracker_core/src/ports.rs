//! crates/training_tracker_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like file stores or APIs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{Assignment, SkippedDuplicate};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., disk, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Durable storage for one named table of records.
///
/// Each store persists its full in-memory state as a single JSON snapshot on
/// every mutation. That is O(total records) per write, which is acceptable at
/// the intended scale of a single department's training records.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Loads the last persisted snapshot for `table`, or `None` if the table
    /// has never been written.
    async fn load(&self, table: &str) -> PortResult<Option<serde_json::Value>>;

    /// Replaces the snapshot for `table`. Must not return before the data is
    /// flushed; the stores rely on this for crash durability at event
    /// granularity.
    async fn persist(&self, table: &str, snapshot: serde_json::Value) -> PortResult<()>;
}

/// What the classifier already knows about one user's training history.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PriorTraining {
    /// Every course ever granted to the user, across all documents.
    pub assigned_courses: BTreeSet<String>,
    /// Previously granted courses whose last occurrence has expired and may
    /// be re-offered instead of being skipped as duplicates.
    pub renewable_courses: BTreeSet<String>,
}

/// Per-user training history handed to the classifier with each document.
pub type HistoryContext = BTreeMap<String, PriorTraining>;

/// The classifier's decision for one processed document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierOutcome {
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub skipped_duplicates: Vec<SkippedDuplicate>,
}

/// The AI step that decides which courses a document requires for whom.
///
/// The core treats this as a black box: it supplies the document text and the
/// known history, and records whatever assignments come back.
#[async_trait]
pub trait ClassifierService: Send + Sync {
    async fn classify_document(
        &self,
        document_text: &str,
        history: &HistoryContext,
    ) -> PortResult<ClassifierOutcome>;
}
