// src/roster.rs
use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::Session;

/// Resolves sessions to the class that owns them.
#[async_trait]
pub trait SessionDirectory: Send + Sync {
    async fn find_session(&self, session_id: Uuid) -> Result<Option<Session>, StoreError>;
}

/// Class membership as maintained by the host application.
#[async_trait]
pub trait Enrollment: Send + Sync {
    async fn is_enrolled(&self, user_id: Uuid, class_id: Uuid) -> Result<bool, StoreError>;

    /// Professors and TAs.
    async fn is_instructor(&self, user_id: Uuid, class_id: Uuid) -> Result<bool, StoreError>;
}
