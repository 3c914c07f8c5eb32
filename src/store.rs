//! Storage traits for polls and attendance records.
//!
//! Every backend (Postgres, in-memory for tests) implements these traits and
//! the rest of the crate depends only on them. Backends must enforce two
//! uniqueness constraints themselves: one poll per `code`, ever, and one
//! record per `(student_id, session_id)`. Violations surface as
//! [`StoreError::Duplicate`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{AttendanceRecord, Poll};

#[async_trait]
pub trait PollStore: Send + Sync {
    /// Fails with `Duplicate` if any poll already uses `poll.code`.
    async fn insert_poll(&self, poll: &Poll) -> Result<(), StoreError>;

    /// Whether any poll, active or not, has ever used `code`.
    async fn code_exists(&self, code: &str) -> Result<bool, StoreError>;

    async fn find_poll(&self, poll_id: Uuid) -> Result<Option<Poll>, StoreError>;

    async fn find_active_poll_by_code(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Poll>, StoreError>;

    /// Returns false when no poll has this id.
    async fn deactivate_poll(&self, poll_id: Uuid) -> Result<bool, StoreError>;

    /// Newest first.
    async fn list_polls_for_session(&self, session_id: Uuid) -> Result<Vec<Poll>, StoreError>;
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Oldest first.
    async fn list_records_for_session(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<AttendanceRecord>, StoreError>;
}

/// A store that can open atomic units of work spanning polls and records.
#[async_trait]
pub trait AttendanceStore: PollStore + RecordStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;
}

/// Reads and writes that commit or roll back together.
///
/// Dropping a unit of work without calling [`UnitOfWork::commit`] discards
/// its writes.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn find_active_poll_by_code(
        &mut self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Poll>, StoreError>;

    /// Any poll with this code regardless of state.
    async fn find_poll_by_code(&mut self, code: &str) -> Result<Option<Poll>, StoreError>;

    async fn find_record(
        &mut self,
        student_id: Uuid,
        session_id: Uuid,
    ) -> Result<Option<AttendanceRecord>, StoreError>;

    /// May report `Duplicate` here or defer it to `commit`.
    async fn insert_record(&mut self, record: &AttendanceRecord) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
