//! JSON API handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use hoi_storage::{ActivityRecord, SubmissionCounts, SubmissionRecord, SubmissionStatus};
use hoi_workflow::{AssistantReply, NewSubmission};
use serde::Deserialize;
use time::OffsetDateTime;

use super::error::ApiError;
use super::extract::ApiJson;
use super::session::Viewer;
use super::state::AppState;

const ACTIVITY_LIMIT: usize = 50;

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// GET /api/summary
pub(crate) async fn handle_summary(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
) -> Result<Json<SubmissionCounts>, ApiError> {
    viewer.require_reviewer(&state, "Summary Access").await?;
    let counts = state.desk.lifecycle.summary(OffsetDateTime::now_utc()).await?;
    Ok(Json(counts))
}

/// GET /api/activity
pub(crate) async fn handle_activity(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
) -> Result<Json<Vec<ActivityRecord>>, ApiError> {
    viewer.require_reviewer(&state, "Activity Log Access").await?;
    let entries = state.desk.lifecycle.recent_activity(ACTIVITY_LIMIT).await?;
    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    status: Option<String>,
}

/// GET /api/submissions[?status=...]
pub(crate) async fn handle_list_submissions(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<SubmissionRecord>>, ApiError> {
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(s) => Some(s.parse::<SubmissionStatus>().map_err(ApiError::BadRequest)?),
    };
    let list = state
        .desk
        .lifecycle
        .list_submissions(&viewer.0, status, OffsetDateTime::now_utc())
        .await?;
    Ok(Json(list))
}

/// GET /api/submission/{id}
pub(crate) async fn handle_get_submission(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(id): Path<String>,
) -> Result<Json<SubmissionRecord>, ApiError> {
    let record = state
        .desk
        .lifecycle
        .submission(&viewer.0, &id, OffsetDateTime::now_utc())
        .await?;
    Ok(Json(record))
}

/// GET /api/my_submissions
pub(crate) async fn handle_my_submissions(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
) -> Result<Json<Vec<SubmissionRecord>>, ApiError> {
    Ok(Json(state.desk.lifecycle.my_submissions(&viewer.0).await?))
}

/// POST /api/submit_form
///
/// The whole body is stored as the payload. `form_user` defaults to the
/// caller; a submitter may not name anyone else.
pub(crate) async fn handle_submit_form(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiJson(body): ApiJson<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    if !body.is_object() {
        return Err(ApiError::BadRequest("expected a JSON object".to_string()));
    }
    let now = OffsetDateTime::now_utc();
    let identity = &viewer.0;

    let named = body
        .get("form_user")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let submitter = match named {
        Some(user) if user != identity.user && !identity.is_reviewer() => {
            let err = state
                .desk
                .lifecycle
                .deny(identity, format!("Submission As {} Denied", user), now)
                .await;
            return Err(err.into());
        }
        Some(user) => user.to_string(),
        None => identity.user.clone(),
    };

    let record = state
        .desk
        .lifecycle
        .submit(NewSubmission::from_form_body(submitter, body), now)
        .await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": format!("Form '{}' submitted successfully. Status: ACTIVITY.", record.form),
        "id": record.id,
    })))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApprovalRequest {
    #[serde(default)]
    submission_id: String,
    #[serde(default)]
    action: String,
    remarks: Option<String>,
}

/// POST /api/process_approval
pub(crate) async fn handle_process_approval(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiJson(req): ApiJson<ApprovalRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = req.submission_id.trim();
    if id.is_empty() {
        return Err(ApiError::BadRequest("submission_id is required".to_string()));
    }
    let outcome = state
        .desk
        .lifecycle
        .decide(
            &viewer.0,
            id,
            req.action.trim(),
            req.remarks.as_deref(),
            OffsetDateTime::now_utc(),
        )
        .await?;

    let status = outcome.submission.status;
    let message = if outcome.submitter_notified {
        format!(
            "Submission {} and confirmation email sent to submitter ({}).",
            status, outcome.submission.user
        )
    } else {
        format!("Submission {}. Email notification failed.", status)
    };
    let warning = (!outcome.fully_notified()).then(|| {
        format!(
            "notifications incomplete: submitter {}, management {}/{}",
            if outcome.submitter_notified { "sent" } else { "failed" },
            outcome.management_notified,
            outcome.management_attempted
        )
    });

    Ok(Json(serde_json::json!({
        "success": true,
        "message": message,
        "status": status,
        "submitter_notified": outcome.submitter_notified,
        "warning": warning,
    })))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatRequest {
    #[serde(default)]
    message: String,
}

/// POST /api/chatbot_reply
pub(crate) async fn handle_chatbot_reply(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiJson(req): ApiJson<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    viewer.require_reviewer(&state, "Assistant Access").await?;
    let message = req.message.trim();
    if message.is_empty() {
        return Err(ApiError::BadRequest("message is required".to_string()));
    }
    let AssistantReply { text, source } = state
        .desk
        .assistant
        .reply(message, OffsetDateTime::now_utc())
        .await;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "reply": text,
        "source": source,
    })))
}
