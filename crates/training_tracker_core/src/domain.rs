//! crates/training_tracker_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any storage or transport format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// How many leading characters of a document take part in the fingerprint.
pub const FINGERPRINT_PREFIX_CHARS: usize = 1000;

/// How many leading characters of a document are kept as its title.
pub const TITLE_PREFIX_CHARS: usize = 100;

/// Deterministic content hash of a normalized document-text prefix, used
/// for duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hashes the first 1000 characters of the text, trimmed and lowercased.
    ///
    /// Hashing only a prefix tolerates trailing noise (OCR artifacts, page
    /// footers) and bounds hashing cost for large documents. Two documents
    /// sharing the same normalized prefix collide; that is a known
    /// limitation, not a bug.
    pub fn of_text(text: &str) -> Self {
        let prefix: String = text.chars().take(FINGERPRINT_PREFIX_CHARS).collect();
        let normalized = prefix.trim().to_lowercase();
        let digest = Sha256::digest(normalized.as_bytes());
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        Fingerprint(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Priority class attached to a course assignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
    Critical,
}

/// How a completion was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionMethod {
    Manual,
    Auto,
}

/// Everything remembered about one processed document, keyed by its
/// [`Fingerprint`]. Created once per unique document and only replaced
/// wholesale if the same fingerprint is saved again (last-write-wins).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    #[serde(with = "timestamp")]
    pub processed_at: DateTime<Utc>,
    /// First 100 characters of the document, with an ellipsis when truncated.
    pub title: String,
    pub assignments_count: usize,
    pub assigned_users: Vec<String>,
    #[serde(default)]
    pub skipped_duplicates: Vec<SkippedDuplicate>,
}

/// A user whose recommended courses were all skipped as duplicates while
/// processing a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedDuplicate {
    pub user_id: String,
    #[serde(default)]
    pub name: String,
    pub skipped_courses: Vec<String>,
    #[serde(default)]
    pub reason: String,
}

/// One grant of courses to one user, originating from one document.
/// Entries are append-only; they are never edited or removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentHistoryEntry {
    pub document_hash: Fingerprint,
    pub courses: Vec<String>,
    #[serde(with = "timestamp")]
    pub assigned_at: DateTime<Utc>,
    #[serde(default)]
    pub reason: String,
}

/// One classifier decision: courses granted to a single user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub user_id: String,
    pub courses_assigned: Vec<String>,
    #[serde(default)]
    pub reason: String,
    /// Renewal parameters the classifier determined per assigned course.
    #[serde(default)]
    pub course_periods: Vec<CoursePeriod>,
}

/// Classifier-supplied renewal parameters for one course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoursePeriod {
    pub course_id: String,
    pub months: u32,
    #[serde(default = "default_deadline_days")]
    pub deadline_days: u32,
    #[serde(default)]
    pub priority: Priority,
}

fn default_deadline_days() -> u32 {
    30
}

/// Static catalog entry: how often a course must be renewed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CourseSchedule {
    pub renewal_months: u32,
    pub deadline_days: u32,
    pub priority: Priority,
}

/// A single immutable entry in the audit trail. The `id` is 1-based and
/// monotonic; it is computed as the current log length plus one, so callers
/// must not rely on IDs staying stable if truncation is ever added.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: u64,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: AuditEventKind,
}

/// The three things the audit trail records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AuditEventKind {
    CourseAssigned {
        user_id: String,
        course_id: String,
        assigned_by: String,
        #[serde(default)]
        reason: String,
        #[serde(default)]
        priority: Priority,
        /// Absent for historic entries recorded before hashes were kept.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        document_hash: Option<Fingerprint>,
    },
    DocumentProcessed {
        document_hash: Fingerprint,
        assignments_count: usize,
        #[serde(default)]
        title_preview: String,
    },
    CourseCompleted {
        user_id: String,
        course_id: String,
        method: CompletionMethod,
    },
}

/// Discriminant used when filtering the audit trail by event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    CourseAssigned,
    DocumentProcessed,
    CourseCompleted,
}

impl AuditEventKind {
    pub fn kind(&self) -> EventKind {
        match self {
            AuditEventKind::CourseAssigned { .. } => EventKind::CourseAssigned,
            AuditEventKind::DocumentProcessed { .. } => EventKind::DocumentProcessed,
            AuditEventKind::CourseCompleted { .. } => EventKind::CourseCompleted,
        }
    }

    /// The user an event belongs to, where one applies.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            AuditEventKind::CourseAssigned { user_id, .. } => Some(user_id),
            AuditEventKind::CourseCompleted { user_id, .. } => Some(user_id),
            AuditEventKind::DocumentProcessed { .. } => None,
        }
    }
}

/// One completion of a course by a user. The (user, course) pair is not
/// unique; re-certification creates another record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub user_id: String,
    pub course_id: String,
    #[serde(with = "timestamp")]
    pub completed_at: DateTime<Utc>,
    pub method: CompletionMethod,
}

/// Effective status of one (user, course, assignment) triple. Always derived
/// at query time from the completion and expiration stores; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Completed,
    Expired,
    UrgentActive,
    Active,
}

impl AssignmentStatus {
    /// "Completed" and "expired" are orthogonal booleans: a completion is
    /// terminal regardless of expiry, and expiry only matters while the
    /// course is not completed.
    pub fn derive(completed: bool, expired: bool, days_left: Option<i64>) -> Self {
        if completed {
            AssignmentStatus::Completed
        } else if expired {
            AssignmentStatus::Expired
        } else if matches!(days_left, Some(d) if d <= 7) {
            AssignmentStatus::UrgentActive
        } else {
            AssignmentStatus::Active
        }
    }
}

/// All expiring courses for one user, as reported by the org-wide sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserExpirations {
    pub user_id: String,
    pub expired_courses: Vec<ExpiringCourse>,
}

/// One expiring course occurrence inside [`UserExpirations`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiringCourse {
    pub course_id: String,
    #[serde(with = "timestamp")]
    pub assigned_at: DateTime<Utc>,
    pub period_months: u32,
}

/// Fixed-width ISO-8601 serialization used for every persisted timestamp.
///
/// All stores share this one format with zero-padded fields so the persisted
/// strings sort lexicographically in chronological order.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&ts.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
            .map_err(serde::de::Error::custom)
    }
}
