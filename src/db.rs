// src/db.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::config::Config;
use crate::error::StoreError;
use crate::models::{AttendanceRecord, Poll, Session};
use crate::roster::{Enrollment, SessionDirectory};
use crate::store::{AttendanceStore, PollStore, RecordStore, UnitOfWork};

pub async fn create_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Unique violations become `Duplicate`; everything else is a backend error.
fn write_error(e: sqlx::Error, key: String) -> StoreError {
    match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Duplicate(key),
        other => other.into(),
    }
}

/// Postgres-backed polls, records, sessions and memberships.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PollStore for PgStore {
    async fn insert_poll(&self, poll: &Poll) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO attendance_polls \
             (id, session_id, code, created_by, created_at, duration_minutes, expires_at, active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(poll.id)
        .bind(poll.session_id)
        .bind(&poll.code)
        .bind(poll.created_by)
        .bind(poll.created_at)
        .bind(poll.duration_minutes)
        .bind(poll.expires_at)
        .bind(poll.active)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, format!("poll code {}", poll.code)))?;

        Ok(())
    }

    async fn code_exists(&self, code: &str) -> Result<bool, StoreError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM attendance_polls WHERE code = $1)")
                .bind(code)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn find_poll(&self, poll_id: Uuid) -> Result<Option<Poll>, StoreError> {
        let poll = sqlx::query_as::<_, Poll>("SELECT * FROM attendance_polls WHERE id = $1")
            .bind(poll_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(poll)
    }

    async fn find_active_poll_by_code(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Poll>, StoreError> {
        let poll = sqlx::query_as::<_, Poll>(
            "SELECT * FROM attendance_polls WHERE code = $1 AND active AND expires_at > $2",
        )
        .bind(code)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(poll)
    }

    async fn deactivate_poll(&self, poll_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE attendance_polls SET active = FALSE WHERE id = $1")
            .bind(poll_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_polls_for_session(&self, session_id: Uuid) -> Result<Vec<Poll>, StoreError> {
        let polls = sqlx::query_as::<_, Poll>(
            "SELECT * FROM attendance_polls WHERE session_id = $1 ORDER BY created_at DESC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(polls)
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn list_records_for_session(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let records = sqlx::query_as::<_, AttendanceRecord>(
            "SELECT * FROM attendance_records WHERE session_id = $1 ORDER BY marked_at",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

#[async_trait]
impl AttendanceStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

#[async_trait]
impl SessionDirectory for PgStore {
    async fn find_session(&self, session_id: Uuid) -> Result<Option<Session>, StoreError> {
        let session =
            sqlx::query_as::<_, Session>("SELECT id, class_id FROM class_sessions WHERE id = $1")
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(session)
    }
}

impl PgStore {
    async fn has_role(&self, user_id: Uuid, class_id: Uuid, role: &str) -> Result<bool, StoreError> {
        let member: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM class_members \
             WHERE class_id = $1 AND user_id = $2 AND role = $3)",
        )
        .bind(class_id)
        .bind(user_id)
        .bind(role)
        .fetch_one(&self.pool)
        .await?;

        Ok(member)
    }
}

#[async_trait]
impl Enrollment for PgStore {
    async fn is_enrolled(&self, user_id: Uuid, class_id: Uuid) -> Result<bool, StoreError> {
        self.has_role(user_id, class_id, "student").await
    }

    async fn is_instructor(&self, user_id: Uuid, class_id: Uuid) -> Result<bool, StoreError> {
        self.has_role(user_id, class_id, "instructor").await
    }
}

/// One Postgres transaction. Rolled back by sqlx if dropped uncommitted.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn find_active_poll_by_code(
        &mut self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Poll>, StoreError> {
        let poll = sqlx::query_as::<_, Poll>(
            "SELECT * FROM attendance_polls WHERE code = $1 AND active AND expires_at > $2",
        )
        .bind(code)
        .bind(now)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(poll)
    }

    async fn find_poll_by_code(&mut self, code: &str) -> Result<Option<Poll>, StoreError> {
        let poll = sqlx::query_as::<_, Poll>("SELECT * FROM attendance_polls WHERE code = $1")
            .bind(code)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(poll)
    }

    async fn find_record(
        &mut self,
        student_id: Uuid,
        session_id: Uuid,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let record = sqlx::query_as::<_, AttendanceRecord>(
            "SELECT * FROM attendance_records WHERE student_id = $1 AND session_id = $2",
        )
        .bind(student_id)
        .bind(session_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(record)
    }

    async fn insert_record(&mut self, record: &AttendanceRecord) -> Result<(), StoreError> {
        // A concurrent insert for the same key blocks here until the other
        // transaction finishes, then fails with a unique violation.
        sqlx::query(
            "INSERT INTO attendance_records (id, student_id, session_id, poll_id, marked_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(record.id)
        .bind(record.student_id)
        .bind(record.session_id)
        .bind(record.poll_id)
        .bind(record.marked_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            write_error(
                e,
                format!("record {}/{}", record.student_id, record.session_id),
            )
        })?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let PgUnitOfWork { tx } = *self;
        tx.commit()
            .await
            .map_err(|e| write_error(e, "attendance record".to_string()))
    }
}
