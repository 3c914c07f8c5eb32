// handlers.rs
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::AttendanceError;
use crate::models::{AttendanceRecord, CreatePollRequest, Poll, PollView, Session, SubmitCodeRequest};
use crate::poll::parse_duration;
use crate::state::AppState;

type AppResult<T> = Result<T, AttendanceError>;

/// The session, provided `user_id` teaches its class.
async fn require_instructor(state: &AppState, user_id: Uuid, session_id: Uuid) -> AppResult<Session> {
    let session = state.polls.session(session_id).await?;
    if !state.enrollment.is_instructor(user_id, session.class_id).await? {
        return Err(AttendanceError::Forbidden {
            user_id,
            class_id: session.class_id,
        });
    }
    Ok(session)
}

/// A poll the caller teaches. Polls outside the caller's classes read as
/// missing, so callers cannot tell which poll ids exist.
async fn instructor_poll(state: &AppState, user_id: Uuid, poll_id: Uuid) -> AppResult<Poll> {
    let poll = state.polls.find(poll_id).await?;
    match require_instructor(state, user_id, poll.session_id).await {
        Ok(_) => Ok(poll),
        Err(AttendanceError::Forbidden { .. } | AttendanceError::SessionNotFound { .. }) => {
            Err(AttendanceError::PollNotFound { poll_id })
        }
        Err(e) => Err(e),
    }
}

fn view(state: &AppState, poll: Poll) -> PollView {
    PollView {
        expired: state.polls.is_expired(Some(&poll)),
        poll,
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Open a poll for a session (instructors only)
pub async fn create_poll(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(session_id): Path<Uuid>,
    Json(request): Json<CreatePollRequest>,
) -> AppResult<(StatusCode, Json<Poll>)> {
    require_instructor(&state, user_id, session_id).await?;

    let duration = request
        .duration_minutes
        .as_ref()
        .map(parse_duration)
        .transpose()?;
    let poll = state.polls.create_poll(session_id, duration, user_id).await?;

    Ok((StatusCode::CREATED, Json(poll)))
}

pub async fn list_polls(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<Vec<PollView>>> {
    require_instructor(&state, user_id, session_id).await?;

    let polls = state.polls.list_for_session(session_id).await?;
    Ok(Json(polls.into_iter().map(|p| view(&state, p)).collect()))
}

pub async fn get_poll(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(poll_id): Path<Uuid>,
) -> AppResult<Json<PollView>> {
    let poll = instructor_poll(&state, user_id, poll_id).await?;
    Ok(Json(view(&state, poll)))
}

/// Close a poll before it expires
pub async fn deactivate_poll(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(poll_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    instructor_poll(&state, user_id, poll_id).await?;
    state.polls.deactivate(poll_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Redeem an attendance code as the calling student
pub async fn submit_code(
    State(state): State<Arc<AppState>>,
    CurrentUser(student_id): CurrentUser,
    Json(request): Json<SubmitCodeRequest>,
) -> AppResult<(StatusCode, Json<AttendanceRecord>)> {
    // Codes are typed by hand; stray whitespace is not part of the code.
    let record = state
        .submissions
        .submit(request.code.trim(), student_id)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_attendance(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<Vec<AttendanceRecord>>> {
    require_instructor(&state, user_id, session_id).await?;

    let records = state.submissions.records_for_session(session_id).await?;
    Ok(Json(records))
}
