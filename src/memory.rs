//! Thread-safe in-memory store for tests and local runs.
//!
//! Enforces the same uniqueness constraints as the Postgres schema. Writes
//! made through a unit of work are buffered and applied at commit, where the
//! record constraint is checked under the lock, so two units of work that
//! both passed their pre-checks cannot both commit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{AttendanceRecord, Poll, Session};
use crate::roster::{Enrollment, SessionDirectory};
use crate::store::{AttendanceStore, PollStore, RecordStore, UnitOfWork};

#[derive(Default)]
struct Tables {
    polls: HashMap<Uuid, Poll>,
    poll_codes: HashMap<String, Uuid>,
    records: HashMap<(Uuid, Uuid), AttendanceRecord>,
    sessions: HashMap<Uuid, Session>,
    students: HashSet<(Uuid, Uuid)>,
    instructors: HashSet<(Uuid, Uuid)>,
}

impl Tables {
    fn active_poll_by_code(&self, code: &str, now: DateTime<Utc>) -> Option<Poll> {
        self.poll_by_code(code).filter(|p| p.is_open_at(now))
    }

    fn poll_by_code(&self, code: &str) -> Option<Poll> {
        self.poll_codes
            .get(code)
            .and_then(|id| self.polls.get(id))
            .cloned()
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        lock(&self.tables)
    }

    pub fn add_session(&self, session_id: Uuid, class_id: Uuid) {
        self.lock().sessions.insert(
            session_id,
            Session {
                id: session_id,
                class_id,
            },
        );
    }

    pub fn enroll_student(&self, class_id: Uuid, user_id: Uuid) {
        self.lock().students.insert((class_id, user_id));
    }

    pub fn add_instructor(&self, class_id: Uuid, user_id: Uuid) {
        self.lock().instructors.insert((class_id, user_id));
    }

    pub fn record_count(&self) -> usize {
        self.lock().records.len()
    }
}

fn lock(tables: &Mutex<Tables>) -> MutexGuard<'_, Tables> {
    tables.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl PollStore for MemoryStore {
    async fn insert_poll(&self, poll: &Poll) -> Result<(), StoreError> {
        let mut tables = self.lock();
        if tables.poll_codes.contains_key(&poll.code) {
            return Err(StoreError::Duplicate(format!("poll code {}", poll.code)));
        }
        tables.poll_codes.insert(poll.code.clone(), poll.id);
        tables.polls.insert(poll.id, poll.clone());
        Ok(())
    }

    async fn code_exists(&self, code: &str) -> Result<bool, StoreError> {
        Ok(self.lock().poll_codes.contains_key(code))
    }

    async fn find_poll(&self, poll_id: Uuid) -> Result<Option<Poll>, StoreError> {
        Ok(self.lock().polls.get(&poll_id).cloned())
    }

    async fn find_active_poll_by_code(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Poll>, StoreError> {
        Ok(self.lock().active_poll_by_code(code, now))
    }

    async fn deactivate_poll(&self, poll_id: Uuid) -> Result<bool, StoreError> {
        match self.lock().polls.get_mut(&poll_id) {
            Some(poll) => {
                poll.active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_polls_for_session(&self, session_id: Uuid) -> Result<Vec<Poll>, StoreError> {
        let mut polls: Vec<Poll> = self
            .lock()
            .polls
            .values()
            .filter(|p| p.session_id == session_id)
            .cloned()
            .collect();
        polls.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(polls)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list_records_for_session(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let mut records: Vec<AttendanceRecord> = self
            .lock()
            .records
            .values()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.marked_at);
        Ok(records)
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        Ok(Box::new(MemoryUnitOfWork {
            tables: self.tables.clone(),
            pending: Vec::new(),
        }))
    }
}

#[async_trait]
impl SessionDirectory for MemoryStore {
    async fn find_session(&self, session_id: Uuid) -> Result<Option<Session>, StoreError> {
        Ok(self.lock().sessions.get(&session_id).copied())
    }
}

#[async_trait]
impl Enrollment for MemoryStore {
    async fn is_enrolled(&self, user_id: Uuid, class_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.lock().students.contains(&(class_id, user_id)))
    }

    async fn is_instructor(&self, user_id: Uuid, class_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.lock().instructors.contains(&(class_id, user_id)))
    }
}

pub struct MemoryUnitOfWork {
    tables: Arc<Mutex<Tables>>,
    pending: Vec<AttendanceRecord>,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn find_active_poll_by_code(
        &mut self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Poll>, StoreError> {
        Ok(lock(&self.tables).active_poll_by_code(code, now))
    }

    async fn find_poll_by_code(&mut self, code: &str) -> Result<Option<Poll>, StoreError> {
        Ok(lock(&self.tables).poll_by_code(code))
    }

    async fn find_record(
        &mut self,
        student_id: Uuid,
        session_id: Uuid,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let pending = self
            .pending
            .iter()
            .find(|r| r.student_id == student_id && r.session_id == session_id)
            .cloned();

        Ok(pending.or_else(|| {
            lock(&self.tables)
                .records
                .get(&(student_id, session_id))
                .cloned()
        }))
    }

    async fn insert_record(&mut self, record: &AttendanceRecord) -> Result<(), StoreError> {
        if self
            .pending
            .iter()
            .any(|r| r.student_id == record.student_id && r.session_id == record.session_id)
        {
            return Err(duplicate_record(record));
        }
        self.pending.push(record.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut tables = lock(&self.tables);

        if let Some(taken) = self
            .pending
            .iter()
            .find(|r| tables.records.contains_key(&(r.student_id, r.session_id)))
        {
            return Err(duplicate_record(taken));
        }

        for record in &self.pending {
            tables
                .records
                .insert((record.student_id, record.session_id), record.clone());
        }
        Ok(())
    }
}

fn duplicate_record(record: &AttendanceRecord) -> StoreError {
    StoreError::Duplicate(format!("record {}/{}", record.student_id, record.session_id))
}
