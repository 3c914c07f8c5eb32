//! Code redemption.
//!
//! A submission resolves its poll, checks enrollment and prior credit, then
//! inserts one record, all inside a single unit of work. The existence check
//! only exists to report `Conflict` early. Duplicate credit is prevented by
//! the store's `(student_id, session_id)` constraint, and any violation of it
//! at insert or commit is reported as `Conflict` as well. Nothing here locks
//! across calls, so different students never wait on each other.

use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::clock::Clock;
use crate::code::validate_format;
use crate::error::{AttendanceError, StoreError};
use crate::models::AttendanceRecord;
use crate::roster::{Enrollment, SessionDirectory};
use crate::store::AttendanceStore;

#[derive(Clone)]
pub struct SubmissionCoordinator {
    store: Arc<dyn AttendanceStore>,
    sessions: Arc<dyn SessionDirectory>,
    enrollment: Arc<dyn Enrollment>,
    clock: Arc<dyn Clock>,
}

impl SubmissionCoordinator {
    pub fn new(
        store: Arc<dyn AttendanceStore>,
        sessions: Arc<dyn SessionDirectory>,
        enrollment: Arc<dyn Enrollment>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            sessions,
            enrollment,
            clock,
        }
    }

    /// Credit `student_id` with attendance for the session behind `code`.
    pub async fn submit(
        &self,
        code: &str,
        student_id: Uuid,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let result = self.redeem(code, student_id).await;

        match &result {
            Ok(record) => info!(
                student_id = %student_id,
                session_id = %record.session_id,
                poll_id = %record.poll_id,
                "attendance recorded"
            ),
            Err(e) => debug!(student_id = %student_id, kind = e.kind(), error = %e, "submission rejected"),
        }

        result
    }

    async fn redeem(
        &self,
        code: &str,
        student_id: Uuid,
    ) -> Result<AttendanceRecord, AttendanceError> {
        if !validate_format(code) {
            return Err(AttendanceError::CodeNotFound { student_id });
        }

        let now = self.clock.now();
        let mut uow = self.store.begin().await?;

        let poll = match uow.find_active_poll_by_code(code, now).await? {
            Some(poll) => poll,
            None => {
                return Err(match uow.find_poll_by_code(code).await? {
                    Some(stale) => AttendanceError::Gone {
                        poll_id: stale.id,
                        session_id: stale.session_id,
                    },
                    None => AttendanceError::CodeNotFound { student_id },
                });
            }
        };

        let session = self
            .sessions
            .find_session(poll.session_id)
            .await?
            .ok_or(AttendanceError::SessionNotFound {
                session_id: poll.session_id,
            })?;

        if !self.enrollment.is_enrolled(student_id, session.class_id).await? {
            return Err(AttendanceError::Forbidden {
                user_id: student_id,
                class_id: session.class_id,
            });
        }

        let conflict = AttendanceError::Conflict {
            student_id,
            session_id: poll.session_id,
        };

        if uow.find_record(student_id, poll.session_id).await?.is_some() {
            return Err(conflict);
        }

        let record = AttendanceRecord {
            id: Uuid::new_v4(),
            student_id,
            session_id: poll.session_id,
            poll_id: poll.id,
            marked_at: now,
        };

        match uow.insert_record(&record).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => return Err(conflict),
            Err(e) => return Err(e.into()),
        }

        match uow.commit().await {
            Ok(()) => Ok(record),
            Err(StoreError::Duplicate(_)) => Err(conflict),
            Err(e) => Err(e.into()),
        }
    }

    /// Committed records for a session, oldest first.
    pub async fn records_for_session(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        Ok(self.store.list_records_for_session(session_id).await?)
    }
}
