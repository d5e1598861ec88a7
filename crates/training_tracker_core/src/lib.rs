pub mod audit;
pub mod completion;
pub mod domain;
pub mod memory;
pub mod ports;
pub mod registry;
pub mod scheduler;

pub use audit::AuditLog;
pub use completion::{CompletionStats, CompletionTracker};
pub use domain::{
    Assignment, AssignmentHistoryEntry, AssignmentStatus, AuditEvent, AuditEventKind,
    CompletionMethod, CompletionRecord, CoursePeriod, CourseSchedule, DocumentRecord, EventKind,
    ExpiringCourse, Fingerprint, Priority, SkippedDuplicate, UserExpirations,
};
pub use ports::{
    ClassifierOutcome, ClassifierService, HistoryContext, PortError, PortResult, PriorTraining,
    SnapshotStore,
};
pub use registry::DocumentRegistry;
pub use scheduler::{default_catalog, ExpirationScheduler, DEFAULT_BUFFER_DAYS};
