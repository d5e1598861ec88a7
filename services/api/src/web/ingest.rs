//! services/api/src/web/ingest.rs
//!
//! Orchestrates the processing of one uploaded document: duplicate check,
//! classifier call, registry save, and audit logging, in that order.

use crate::error::ApiError;
use crate::web::state::AppState;
use std::collections::BTreeSet;
use training_tracker_core::{
    domain::TITLE_PREFIX_CHARS, Assignment, CourseSchedule, DocumentRecord, Fingerprint,
    HistoryContext, PriorTraining, SkippedDuplicate, UserExpirations,
};

/// What came out of processing one document.
pub enum ProcessOutcome {
    /// The document's fingerprint was already known; nothing was written.
    Duplicate { previous: DocumentRecord },
    Processed {
        document_hash: Fingerprint,
        assignments: Vec<Assignment>,
        skipped_duplicates: Vec<SkippedDuplicate>,
        /// Current org-wide expiring list, returned alongside each result so
        /// the caller can surface renewals discovered during ingestion.
        expired_courses: Vec<UserExpirations>,
    },
}

/// Runs the full ingestion workflow for one document text.
///
/// Write order is deliberate: the registry record goes first, the audit
/// events second. There is no transaction across the two stores; a crash in
/// between leaves them inconsistent, which is an accepted risk.
pub async fn process_document(state: &AppState, text: &str) -> Result<ProcessOutcome, ApiError> {
    let (duplicate, previous) = state.registry.is_duplicate(text).await;
    if duplicate {
        if let Some(previous) = previous {
            return Ok(ProcessOutcome::Duplicate { previous });
        }
    }

    let history = classifier_context(state).await;
    let outcome = state.classifier.classify_document(text, &history).await?;

    // The classifier's renewal parameters extend the catalog before any
    // expiry question is asked about the new assignments.
    for assignment in &outcome.assignments {
        for period in &assignment.course_periods {
            state.scheduler.register_course(
                &period.course_id,
                CourseSchedule {
                    renewal_months: period.months,
                    deadline_days: period.deadline_days,
                    priority: period.priority,
                },
            );
        }
    }

    let document_hash = state
        .registry
        .save(text, &outcome.assignments, outcome.skipped_duplicates.clone())
        .await?;

    let preview: String = text.chars().take(TITLE_PREFIX_CHARS).collect();
    state
        .audit
        .record_document_processed(
            document_hash.clone(),
            outcome.assignments.len(),
            &format!("{}...", preview),
        )
        .await?;

    for assignment in &outcome.assignments {
        for course_id in &assignment.courses_assigned {
            let priority = assignment
                .course_periods
                .iter()
                .find(|p| &p.course_id == course_id)
                .map(|p| p.priority)
                .unwrap_or_else(|| state.scheduler.priority(course_id));
            state
                .audit
                .record_assignment(
                    &assignment.user_id,
                    course_id,
                    "AI",
                    &assignment.reason,
                    priority,
                    Some(document_hash.clone()),
                )
                .await?;
        }
    }

    let expired_courses = state.scheduler.expiring_across_org(&state.registry).await;

    Ok(ProcessOutcome::Processed {
        document_hash,
        assignments: outcome.assignments,
        skipped_duplicates: outcome.skipped_duplicates,
        expired_courses,
    })
}

/// Builds the per-user history the classifier needs to skip duplicates and
/// recognize expired courses that may be re-offered.
async fn classifier_context(state: &AppState) -> HistoryContext {
    let mut history = HistoryContext::new();

    for (user_id, _) in state.registry.all_histories().await {
        let assigned_courses = state.registry.all_assigned_courses(&user_id).await;
        let mut renewable_courses = BTreeSet::new();
        for course_id in &assigned_courses {
            if state
                .scheduler
                .should_reassign(&user_id, course_id, &state.registry)
                .await
            {
                renewable_courses.insert(course_id.clone());
            }
        }
        history.insert(
            user_id,
            PriorTraining {
                assigned_courses,
                renewable_courses,
            },
        );
    }

    history
}
