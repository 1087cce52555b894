//! Persistence boundary for users and mood entries.
//!
//! Handlers only talk to [`Store`]; `PgStore` backs it with Postgres and
//! `MemoryStore` keeps everything in process (dev mode and tests). Both
//! enforce the same unique constraints: one account per email and one entry
//! per user per UTC day.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    entries::repo_types::MoodEntry,
    users::repo_types::{User, UserUpdate},
};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    /// Returns the updated record, or `None` when the id is unknown.
    async fn update_user(&self, id: Uuid, update: &UserUpdate) -> StoreResult<Option<User>>;

    /// First entry with `start <= created_at < end`.
    async fn find_entry_in_range(
        &self,
        user_id: Uuid,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> StoreResult<Option<MoodEntry>>;
    async fn insert_entry(&self, entry: &MoodEntry) -> StoreResult<()>;
    /// Most recent first.
    async fn find_recent_entries(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<MoodEntry>>;
}
