use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::{
    entries::repo_types::MoodEntry,
    users::repo_types::{User, UserUpdate},
};

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { db })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .context("run migrations")?;
        Ok(())
    }
}

fn map_write_err(e: sqlx::Error, what: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            let constraint = db.constraint().unwrap_or(what).to_string();
            return StoreError::Conflict(constraint);
        }
    }
    StoreError::Backend(anyhow::Error::new(e).context(what.to_string()))
}

fn read_err(e: sqlx::Error, what: &'static str) -> StoreError {
    StoreError::Backend(anyhow::Error::new(e).context(what))
}

#[async_trait]
impl Store for PgStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, password_hash, avatar_url, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| read_err(e, "find user by email"))
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, password_hash, avatar_url, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| read_err(e, "find user by id"))
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, password_hash, avatar_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(&user.avatar_url)
        .bind(user.created_at)
        .execute(&self.db)
        .await
        .map_err(|e| map_write_err(e, "insert user"))?;
        Ok(())
    }

    async fn update_user(&self, id: Uuid, update: &UserUpdate) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   avatar_url = COALESCE($3, avatar_url)
             WHERE id = $1
            RETURNING id, email, name, password_hash, avatar_url, created_at
            "#,
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.avatar_url)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| map_write_err(e, "update user"))
    }

    async fn find_entry_in_range(
        &self,
        user_id: Uuid,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> StoreResult<Option<MoodEntry>> {
        sqlx::query_as::<_, MoodEntry>(
            r#"
            SELECT id, user_id, mood, feelings, reflection, sleep_hours, created_at
            FROM entries
            WHERE user_id = $1 AND created_at >= $2 AND created_at < $3
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| read_err(e, "find entry in range"))
    }

    async fn insert_entry(&self, entry: &MoodEntry) -> StoreResult<()> {
        let entry_day = entry.created_at.to_offset(time::UtcOffset::UTC).date();
        sqlx::query(
            r#"
            INSERT INTO entries (id, user_id, mood, feelings, reflection, sleep_hours, entry_day, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id)
        .bind(entry.user_id)
        .bind(entry.mood)
        .bind(&entry.feelings)
        .bind(&entry.reflection)
        .bind(entry.sleep_hours)
        .bind(entry_day)
        .bind(entry.created_at)
        .execute(&self.db)
        .await
        .map_err(|e| map_write_err(e, "insert entry"))?;
        Ok(())
    }

    async fn find_recent_entries(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<MoodEntry>> {
        sqlx::query_as::<_, MoodEntry>(
            r#"
            SELECT id, user_id, mood, feelings, reflection, sleep_hours, created_at
            FROM entries
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .map_err(|e| read_err(e, "find recent entries"))
    }
}
