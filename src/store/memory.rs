use async_trait::async_trait;
use time::{OffsetDateTime, UtcOffset};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::{
    entries::repo_types::MoodEntry,
    users::repo_types::{User, UserUpdate},
};

/// Process-local store with the same constraints as the Postgres schema.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<Vec<User>>,
    entries: RwLock<Vec<MoodEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn utc_day(ts: OffsetDateTime) -> time::Date {
    ts.to_offset(UtcOffset::UTC).date()
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.id == user.id) {
            return Err(StoreError::Conflict("users_pkey".into()));
        }
        if users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("users_email_key".into()));
        }
        users.push(user.clone());
        Ok(())
    }

    async fn update_user(&self, id: Uuid, update: &UserUpdate) -> StoreResult<Option<User>> {
        let mut users = self.users.write().await;
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(name) = &update.name {
            user.name = name.clone();
        }
        if let Some(avatar_url) = &update.avatar_url {
            user.avatar_url = Some(avatar_url.clone());
        }
        Ok(Some(user.clone()))
    }

    async fn find_entry_in_range(
        &self,
        user_id: Uuid,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> StoreResult<Option<MoodEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|e| e.user_id == user_id && e.created_at >= start && e.created_at < end)
            .max_by_key(|e| e.created_at)
            .cloned())
    }

    async fn insert_entry(&self, entry: &MoodEntry) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        let day = utc_day(entry.created_at);
        if entries
            .iter()
            .any(|e| e.user_id == entry.user_id && utc_day(e.created_at) == day)
        {
            return Err(StoreError::Conflict("entries_one_per_day".into()));
        }
        entries.push(entry.clone());
        Ok(())
    }

    async fn find_recent_entries(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<MoodEntry>> {
        let entries = self.entries.read().await;
        let mut out: Vec<MoodEntry> = entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out.truncate(limit.max(0) as usize);
        Ok(out)
    }
}
