//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::ApiError;
use crate::web::ingest::{self, ProcessOutcome};
use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use training_tracker_core::{
    domain::timestamp, Assignment, AssignmentHistoryEntry, AssignmentStatus, AuditEvent,
    AuditEventKind, CompletionMethod, CompletionRecord, DocumentRecord, EventKind, Priority,
    SkippedDuplicate, UserExpirations, DEFAULT_BUFFER_DAYS,
};
use utoipa::{IntoParams, OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        process_document_handler,
        user_assignments_handler,
        user_history_handler,
        recent_events_handler,
        expiring_handler,
        complete_course_handler,
        list_completions_handler,
        stats_handler,
    ),
    components(
        schemas(
            ProcessDocumentResponse,
            UserAssignmentsResponse,
            AssignmentView,
            UserHistoryResponse,
            RecentEventsResponse,
            ExpiringResponse,
            CompleteCourseRequest,
            CompleteCourseResponse,
            CompletionsResponse,
            StatsResponse,
        )
    ),
    tags(
        (name = "Training Tracker API", description = "API endpoints for the safety-training assignment tracker.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The result of uploading one document for processing.
#[derive(Serialize, ToSchema)]
pub struct ProcessDocumentResponse {
    pub is_duplicate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub previous_processing: Option<DocumentRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_hash: Option<String>,
    #[schema(value_type = Vec<Object>)]
    pub assignments: Vec<Assignment>,
    #[schema(value_type = Vec<Object>)]
    pub skipped_duplicates: Vec<SkippedDuplicate>,
    #[schema(value_type = Vec<Object>)]
    pub expired_courses: Vec<UserExpirations>,
}

/// One assignment enriched with its computed lifecycle status.
#[derive(Serialize, ToSchema)]
pub struct AssignmentView {
    pub course_id: String,
    pub assigned_at: String,
    pub assigned_by: String,
    pub reason: String,
    #[schema(value_type = String)]
    pub priority: Priority,
    pub renewal_months: Option<u32>,
    pub deadline_days: Option<u32>,
    pub is_expired: bool,
    pub is_completed: bool,
    pub days_left: Option<i64>,
    #[schema(value_type = String)]
    pub status: AssignmentStatus,
}

#[derive(Serialize, ToSchema)]
pub struct UserAssignmentsResponse {
    pub user_id: String,
    pub assignments: Vec<AssignmentView>,
    pub total_assignments: usize,
    pub active_courses: usize,
}

#[derive(Serialize, ToSchema)]
pub struct UserHistoryResponse {
    pub user_id: String,
    #[schema(value_type = Vec<Object>)]
    pub history: Vec<AssignmentHistoryEntry>,
}

#[derive(Serialize, ToSchema)]
pub struct RecentEventsResponse {
    #[schema(value_type = Vec<Object>)]
    pub events: Vec<AuditEvent>,
}

#[derive(Deserialize, IntoParams)]
pub struct RecentEventsQuery {
    /// Maximum number of events to return (default 50).
    pub limit: Option<usize>,
}

#[derive(Serialize, ToSchema)]
pub struct ExpiringResponse {
    #[schema(value_type = Vec<Object>)]
    pub expiring: Vec<UserExpirations>,
}

#[derive(Deserialize, ToSchema)]
pub struct CompleteCourseRequest {
    pub user_id: String,
    pub course_id: String,
}

#[derive(Serialize, ToSchema)]
pub struct CompleteCourseResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub completion: Option<CompletionRecord>,
}

#[derive(Serialize, ToSchema)]
pub struct CompletionsResponse {
    #[schema(value_type = Vec<Object>)]
    pub completions: Vec<CompletionRecord>,
    pub total_completions: usize,
}

/// System-wide counters for the dashboard.
#[derive(Serialize, ToSchema)]
pub struct StatsResponse {
    pub documents: usize,
    pub assignments: usize,
    pub completions: usize,
    pub expired: usize,
    pub active: usize,
    pub critical: usize,
}

fn internal(err: ApiError) -> (StatusCode, String) {
    error!("request failed: {}", err);
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Process an uploaded document.
///
/// Accepts a multipart/form-data request with a single text part holding the
/// extracted document text. Duplicate documents short-circuit with the prior
/// processing record.
#[utoipa::path(
    post,
    path = "/documents",
    request_body(content_type = "multipart/form-data", description = "The extracted document text to process."),
    responses(
        (status = 200, description = "Document processed or recognized as a duplicate", body = ProcessDocumentResponse),
        (status = 400, description = "Bad request (e.g., missing file part)"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn process_document_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let text = if let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        field.text().await.map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Uploaded part is not valid UTF-8 text: {}", e),
            )
        })?
    } else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Multipart form must include the document text".to_string(),
        ));
    };

    let outcome = ingest::process_document(&app_state, &text)
        .await
        .map_err(internal)?;

    let response = match outcome {
        ProcessOutcome::Duplicate { previous } => ProcessDocumentResponse {
            is_duplicate: true,
            message: Some("This document has already been processed".to_string()),
            previous_processing: Some(previous),
            document_hash: None,
            assignments: Vec::new(),
            skipped_duplicates: Vec::new(),
            expired_courses: Vec::new(),
        },
        ProcessOutcome::Processed {
            document_hash,
            assignments,
            skipped_duplicates,
            expired_courses,
        } => ProcessDocumentResponse {
            is_duplicate: false,
            message: None,
            previous_processing: None,
            document_hash: Some(document_hash.to_string()),
            assignments,
            skipped_duplicates,
            expired_courses,
        },
    };

    Ok(Json(response))
}

/// All assignments for one user, enriched with expiry and completion status.
#[utoipa::path(
    get,
    path = "/users/{user_id}/assignments",
    responses(
        (status = 200, description = "The user's assignments with computed status", body = UserAssignmentsResponse)
    ),
    params(
        ("user_id" = String, Path, description = "The unique ID of the user.")
    )
)]
pub async fn user_assignments_handler(
    State(app_state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Json<UserAssignmentsResponse> {
    let events = app_state
        .audit
        .user_events(&user_id, EventKind::CourseAssigned)
        .await;

    let mut assignments = Vec::with_capacity(events.len());
    for event in &events {
        let AuditEventKind::CourseAssigned {
            course_id,
            assigned_by,
            reason,
            priority,
            ..
        } = &event.kind
        else {
            continue;
        };

        let schedule = app_state.scheduler.schedule(course_id);
        let is_expired =
            app_state
                .scheduler
                .is_expired_at(course_id, event.timestamp, DEFAULT_BUFFER_DAYS);
        let is_completed = app_state.completions.is_completed(&user_id, course_id).await;
        let days_left = app_state
            .scheduler
            .days_until_expiry(course_id, event.timestamp);

        assignments.push(AssignmentView {
            course_id: course_id.clone(),
            assigned_at: event.timestamp.format(timestamp::FORMAT).to_string(),
            assigned_by: assigned_by.clone(),
            reason: reason.clone(),
            priority: *priority,
            renewal_months: schedule.map(|s| s.renewal_months),
            deadline_days: schedule.map(|s| s.deadline_days),
            is_expired,
            is_completed,
            days_left,
            status: AssignmentStatus::derive(is_completed, is_expired, days_left),
        });
    }

    // Newest first for display.
    assignments.sort_by(|a, b| b.assigned_at.cmp(&a.assigned_at));

    let total_assignments = assignments.len();
    let active_courses = assignments
        .iter()
        .filter(|a| !a.is_expired && !a.is_completed)
        .count();

    Json(UserAssignmentsResponse {
        user_id,
        assignments,
        total_assignments,
        active_courses,
    })
}

/// A user's raw assignment history from the document registry.
#[utoipa::path(
    get,
    path = "/users/{user_id}/history",
    responses(
        (status = 200, description = "The user's assignment history, oldest first", body = UserHistoryResponse)
    ),
    params(
        ("user_id" = String, Path, description = "The unique ID of the user.")
    )
)]
pub async fn user_history_handler(
    State(app_state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Json<UserHistoryResponse> {
    let history = app_state.registry.user_history(&user_id).await;
    Json(UserHistoryResponse { user_id, history })
}

/// The most recent audit events, newest first.
#[utoipa::path(
    get,
    path = "/events/recent",
    responses(
        (status = 200, description = "Recent audit events", body = RecentEventsResponse)
    ),
    params(RecentEventsQuery)
)]
pub async fn recent_events_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<RecentEventsQuery>,
) -> Json<RecentEventsResponse> {
    let events = app_state.audit.recent_events(query.limit.unwrap_or(50)).await;
    Json(RecentEventsResponse { events })
}

/// Expiring courses across the whole organization, grouped by user.
#[utoipa::path(
    get,
    path = "/expiring",
    responses(
        (status = 200, description = "Users with expiring courses", body = ExpiringResponse)
    )
)]
pub async fn expiring_handler(State(app_state): State<Arc<AppState>>) -> Json<ExpiringResponse> {
    let expiring = app_state
        .scheduler
        .expiring_across_org(&app_state.registry)
        .await;
    Json(ExpiringResponse { expiring })
}

/// Mark a course as completed for a user.
///
/// Completing an already-completed course answers `success = false` without
/// creating another record.
#[utoipa::path(
    post,
    path = "/completions",
    request_body = CompleteCourseRequest,
    responses(
        (status = 200, description = "Completion recorded (or already present)", body = CompleteCourseResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn complete_course_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<CompleteCourseRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if app_state
        .completions
        .is_completed(&request.user_id, &request.course_id)
        .await
    {
        return Ok(Json(CompleteCourseResponse {
            success: false,
            message: "Course already marked as completed".to_string(),
            completion: None,
        }));
    }

    let completion = app_state
        .completions
        .complete(&request.user_id, &request.course_id, CompletionMethod::Manual)
        .await
        .map_err(|e| internal(e.into()))?;
    app_state
        .audit
        .record_completion(&request.user_id, &request.course_id, CompletionMethod::Manual)
        .await
        .map_err(|e| internal(e.into()))?;

    Ok(Json(CompleteCourseResponse {
        success: true,
        message: format!("Course {} marked as completed", request.course_id),
        completion: Some(completion),
    }))
}

/// Every completion record with summary counters.
#[utoipa::path(
    get,
    path = "/completions",
    responses(
        (status = 200, description = "All completion records", body = CompletionsResponse)
    )
)]
pub async fn list_completions_handler(
    State(app_state): State<Arc<AppState>>,
) -> Json<CompletionsResponse> {
    let completions = app_state.completions.all().await;
    let total_completions = completions.len();
    Json(CompletionsResponse {
        completions,
        total_completions,
    })
}

/// System-wide counters for the dashboard.
#[utoipa::path(
    get,
    path = "/stats",
    responses(
        (status = 200, description = "System statistics", body = StatsResponse)
    )
)]
pub async fn stats_handler(State(app_state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let assignment_events = app_state.audit.events_of_kind(EventKind::CourseAssigned).await;

    let mut expired = 0;
    let mut active = 0;
    let mut critical = 0;
    for event in &assignment_events {
        let AuditEventKind::CourseAssigned {
            user_id,
            course_id,
            priority,
            ..
        } = &event.kind
        else {
            continue;
        };

        let is_expired =
            app_state
                .scheduler
                .is_expired_at(course_id, event.timestamp, DEFAULT_BUFFER_DAYS);
        let is_completed = app_state.completions.is_completed(user_id, course_id).await;

        if is_expired && !is_completed {
            expired += 1;
        } else if !is_expired && !is_completed {
            active += 1;
        }
        if *priority == Priority::Critical && !is_completed {
            critical += 1;
        }
    }

    Json(StatsResponse {
        documents: app_state.registry.document_count().await,
        assignments: assignment_events.len(),
        completions: app_state.completions.stats().await.total_completions,
        expired,
        active,
        critical,
    })
}
