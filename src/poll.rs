// src/poll.rs
use chrono::Duration;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::code::{validate_format, CodeGenerator, MAX_ATTEMPTS};
use crate::config::PollConfig;
use crate::error::{AttendanceError, StoreError};
use crate::models::{Poll, Session};
use crate::roster::SessionDirectory;
use crate::store::PollStore;

/// Generate-then-insert rounds before a lost code race is reported as exhaustion.
const CREATE_ROUNDS: u32 = 2;

/// Owns the poll lifecycle: create, look up, expire, close.
#[derive(Clone)]
pub struct PollManager {
    store: Arc<dyn PollStore>,
    sessions: Arc<dyn SessionDirectory>,
    clock: Arc<dyn Clock>,
    codes: CodeGenerator,
    config: PollConfig,
}

impl PollManager {
    pub fn new(
        store: Arc<dyn PollStore>,
        sessions: Arc<dyn SessionDirectory>,
        clock: Arc<dyn Clock>,
        config: PollConfig,
    ) -> Self {
        Self {
            store,
            sessions,
            clock,
            codes: CodeGenerator::new(),
            config,
        }
    }

    pub async fn session(&self, session_id: Uuid) -> Result<Session, AttendanceError> {
        self.sessions
            .find_session(session_id)
            .await?
            .ok_or(AttendanceError::SessionNotFound { session_id })
    }

    /// Open a poll for `session_id` with a fresh, never-used code.
    ///
    /// `duration_minutes` of `None` takes the configured default.
    pub async fn create_poll(
        &self,
        session_id: Uuid,
        duration_minutes: Option<i64>,
        creator_id: Uuid,
    ) -> Result<Poll, AttendanceError> {
        self.session(session_id).await?;
        let minutes = self.check_duration(duration_minutes)?;
        let stored_minutes = i32::try_from(minutes).map_err(|_| AttendanceError::Validation {
            field: "duration_minutes",
            reason: "out of range".into(),
        })?;

        for round in 1..=CREATE_ROUNDS {
            let store = self.store.clone();
            let code = self
                .codes
                .generate(|code| {
                    let store = store.clone();
                    async move {
                        let taken = store.code_exists(&code).await?;
                        Ok::<_, AttendanceError>(!taken)
                    }
                })
                .await?;

            let created_at = self.clock.now();
            let poll = Poll {
                id: Uuid::new_v4(),
                session_id,
                code,
                created_by: creator_id,
                created_at,
                duration_minutes: stored_minutes,
                expires_at: created_at + Duration::minutes(minutes),
                active: true,
            };

            match self.store.insert_poll(&poll).await {
                Ok(()) => {
                    info!(
                        poll_id = %poll.id,
                        session_id = %session_id,
                        created_by = %creator_id,
                        expires_at = %poll.expires_at,
                        "attendance poll opened"
                    );
                    return Ok(poll);
                }
                // Another creator claimed the code between the check and the insert.
                Err(StoreError::Duplicate(key)) => {
                    warn!(round, %key, "attendance code taken concurrently, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AttendanceError::Exhausted {
            attempts: MAX_ATTEMPTS * CREATE_ROUNDS,
        })
    }

    fn check_duration(&self, requested: Option<i64>) -> Result<i64, AttendanceError> {
        let minutes = requested.unwrap_or(self.config.default_minutes);
        if (self.config.min_minutes..=self.config.max_minutes).contains(&minutes) {
            Ok(minutes)
        } else {
            Err(AttendanceError::Validation {
                field: "duration_minutes",
                reason: format!(
                    "must be between {} and {} minutes, got {minutes}",
                    self.config.min_minutes, self.config.max_minutes
                ),
            })
        }
    }

    /// The poll behind `code`, only while it is active and unexpired.
    pub async fn find_active_by_code(&self, code: &str) -> Result<Option<Poll>, AttendanceError> {
        if !validate_format(code) {
            return Ok(None);
        }
        let poll = self
            .store
            .find_active_poll_by_code(code, self.clock.now())
            .await?;
        Ok(poll)
    }

    pub fn is_expired(&self, poll: Option<&Poll>) -> bool {
        match poll {
            Some(poll) => self.clock.now() >= poll.expires_at,
            None => true,
        }
    }

    /// Close a poll early. Closing an already closed poll succeeds.
    pub async fn deactivate(&self, poll_id: Uuid) -> Result<(), AttendanceError> {
        if !self.store.deactivate_poll(poll_id).await? {
            return Err(AttendanceError::PollNotFound { poll_id });
        }
        info!(poll_id = %poll_id, "attendance poll closed");
        Ok(())
    }

    pub async fn find(&self, poll_id: Uuid) -> Result<Poll, AttendanceError> {
        self.store
            .find_poll(poll_id)
            .await?
            .ok_or(AttendanceError::PollNotFound { poll_id })
    }

    pub async fn list_for_session(&self, session_id: Uuid) -> Result<Vec<Poll>, AttendanceError> {
        Ok(self.store.list_polls_for_session(session_id).await?)
    }
}

/// Interpret a client-supplied duration: a whole JSON number or a numeric string.
pub fn parse_duration(value: &Value) -> Result<i64, AttendanceError> {
    let invalid = |reason: &str| AttendanceError::Validation {
        field: "duration_minutes",
        reason: reason.to_string(),
    };

    match value {
        Value::Number(n) => n.as_i64().ok_or_else(|| invalid("must be a whole number")),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid("must be a whole number")),
        _ => Err(invalid("must be a number")),
    }
}
