// models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One open attendance window for one class session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Poll {
    pub id: Uuid,
    pub session_id: Uuid,
    pub code: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
}

impl Poll {
    /// Redeemable at `now`: still active and not yet expired.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at > now
    }
}

/// A student's credited presence at one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub session_id: Uuid,
    pub poll_id: Uuid,
    pub marked_at: DateTime<Utc>,
}

/// A single meeting of a class. Owned by the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Session {
    pub id: Uuid,
    pub class_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreatePollRequest {
    /// Number or numeric string; absent means the configured default.
    #[serde(default)]
    pub duration_minutes: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitCodeRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct PollView {
    #[serde(flatten)]
    pub poll: Poll,
    pub expired: bool,
}
