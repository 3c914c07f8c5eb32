// src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};
use uuid::Uuid;

/// Failures raised by the storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Every outcome of poll management and code redemption other than success.
#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("missing or malformed caller identity")]
    Unauthenticated,

    #[error("session {session_id} not found")]
    SessionNotFound { session_id: Uuid },

    #[error("poll {poll_id} not found")]
    PollNotFound { poll_id: Uuid },

    #[error("no poll matches the submitted code")]
    CodeNotFound { student_id: Uuid },

    #[error("poll {poll_id} for session {session_id} is closed")]
    Gone { poll_id: Uuid, session_id: Uuid },

    #[error("user {user_id} is not permitted in class {class_id}")]
    Forbidden { user_id: Uuid, class_id: Uuid },

    #[error("student {student_id} is already marked present for session {session_id}")]
    Conflict { student_id: Uuid, session_id: Uuid },

    #[error("code generation gave up after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AttendanceError {
    /// Stable tag for clients and log filters.
    pub fn kind(&self) -> &'static str {
        match self {
            AttendanceError::Validation { .. } => "validation",
            AttendanceError::Unauthenticated => "unauthenticated",
            AttendanceError::SessionNotFound { .. }
            | AttendanceError::PollNotFound { .. }
            | AttendanceError::CodeNotFound { .. } => "not_found",
            AttendanceError::Gone { .. } => "gone",
            AttendanceError::Forbidden { .. } => "forbidden",
            AttendanceError::Conflict { .. } => "conflict",
            AttendanceError::Exhausted { .. } => "exhausted",
            AttendanceError::Store(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AttendanceError::Validation { .. } => StatusCode::BAD_REQUEST,
            AttendanceError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AttendanceError::SessionNotFound { .. }
            | AttendanceError::PollNotFound { .. }
            | AttendanceError::CodeNotFound { .. } => StatusCode::NOT_FOUND,
            AttendanceError::Gone { .. } => StatusCode::GONE,
            AttendanceError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AttendanceError::Conflict { .. } => StatusCode::CONFLICT,
            AttendanceError::Exhausted { .. } | AttendanceError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AttendanceError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details stay in the logs.
        let message = if status.is_server_error() {
            error!(kind = self.kind(), error = %self, "request failed");
            "internal error".to_string()
        } else {
            debug!(kind = self.kind(), error = %self, "request rejected");
            self.to_string()
        };

        (status, Json(json!({ "error": message, "kind": self.kind() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_map_to_http_statuses() {
        let id = Uuid::new_v4();
        let cases = [
            (AttendanceError::CodeNotFound { student_id: id }, 404),
            (AttendanceError::Gone { poll_id: id, session_id: id }, 410),
            (AttendanceError::Forbidden { user_id: id, class_id: id }, 403),
            (AttendanceError::Conflict { student_id: id, session_id: id }, 409),
            (AttendanceError::Exhausted { attempts: 10 }, 500),
            (
                AttendanceError::Validation { field: "duration_minutes", reason: "zero".into() },
                400,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status().as_u16(), expected);
        }
    }

    #[test]
    fn store_errors_are_internal() {
        let err: AttendanceError = StoreError::Backend("connection reset".into()).into();
        assert_eq!(err.kind(), "internal");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
