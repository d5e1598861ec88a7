//! End-to-end walk through one assignment lifecycle: a document is
//! processed, courses are assigned and audited, time passes, the course
//! expires, and the user finally completes it.

use std::sync::Arc;

use chrono::{Duration, Utc};
use training_tracker_core::memory::MemoryStore;
use training_tracker_core::{
    Assignment, AssignmentStatus, AuditEventKind, AuditLog, CompletionMethod, CompletionTracker,
    DocumentRegistry, EventKind, ExpirationScheduler, Priority,
};

#[tokio::test]
async fn one_document_from_assignment_to_completion() {
    let store = Arc::new(MemoryStore::new());
    let registry = DocumentRegistry::open(store.clone()).await;
    let audit = AuditLog::open(store.clone()).await;
    let completions = CompletionTracker::open(store).await;
    let scheduler = ExpirationScheduler::with_default_catalog();

    let document = "Annual lab safety update";
    let assignments = vec![Assignment {
        user_id: "U1".to_string(),
        courses_assigned: vec!["LAB-SAFETY-101".to_string()],
        reason: "new policy".to_string(),
        course_periods: Vec::new(),
    }];

    // Ingest: registry first, then the audit events (normative write order).
    let hash = registry.save(document, &assignments, Vec::new()).await.unwrap();
    audit
        .record_document_processed(hash.clone(), assignments.len(), document)
        .await
        .unwrap();
    audit
        .record_assignment(
            "U1",
            "LAB-SAFETY-101",
            "AI",
            "new policy",
            Priority::Normal,
            Some(hash.clone()),
        )
        .await
        .unwrap();

    // The document is now a known duplicate.
    let (dup, record) = registry.is_duplicate(document).await;
    assert!(dup);
    assert_eq!(record.unwrap().assigned_users, vec!["U1".to_string()]);

    // The user's history holds exactly the one grant.
    let history = registry.user_history("U1").await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].courses, vec!["LAB-SAFETY-101".to_string()]);
    assert_eq!(history[0].document_hash, hash);

    // The audit feed has one processing event and one assignment event.
    let recent = audit.recent_events(10).await;
    assert_eq!(recent.len(), 2);
    assert_eq!(
        recent
            .iter()
            .filter(|e| e.kind.kind() == EventKind::DocumentProcessed)
            .count(),
        1
    );
    assert_eq!(
        recent
            .iter()
            .filter(|e| e.kind.kind() == EventKind::CourseAssigned)
            .count(),
        1
    );
    if let AuditEventKind::CourseAssigned { document_hash, .. } = &recent
        .iter()
        .find(|e| e.kind.kind() == EventKind::CourseAssigned)
        .unwrap()
        .kind
    {
        assert_eq!(document_hash.as_ref(), Some(&hash));
    }

    // Freshly assigned: active, not expired, not completed.
    assert!(!scheduler.is_expired_at("LAB-SAFETY-101", history[0].assigned_at, 30));
    assert!(!completions.is_completed("U1", "LAB-SAFETY-101").await);

    // 400 days after assignment a 12-month course is past expiry.
    let original_timestamp = (Utc::now() - Duration::days(400)).to_rfc3339();
    assert!(scheduler.is_expired("LAB-SAFETY-101", &original_timestamp, 30));

    let expired_status = AssignmentStatus::derive(false, true, Some(-40));
    assert_eq!(expired_status, AssignmentStatus::Expired);

    // The user completes the course; completion is independent of expiry.
    completions
        .complete("U1", "LAB-SAFETY-101", CompletionMethod::Manual)
        .await
        .unwrap();
    audit
        .record_completion("U1", "LAB-SAFETY-101", CompletionMethod::Manual)
        .await
        .unwrap();

    assert!(completions.is_completed("U1", "LAB-SAFETY-101").await);
    assert!(scheduler.is_expired("LAB-SAFETY-101", &original_timestamp, 30));
    assert_eq!(
        AssignmentStatus::derive(true, true, Some(-40)),
        AssignmentStatus::Completed
    );

    // The completion landed in the audit trail with the next sequential ID.
    let u1_completions = audit.user_events("U1", EventKind::CourseCompleted).await;
    assert_eq!(u1_completions.len(), 1);
    assert_eq!(u1_completions[0].id, 3);
}
