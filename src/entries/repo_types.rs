use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Mood entry record. At most one per user per UTC day.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct MoodEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub mood: i16,
    pub feelings: Vec<String>,
    pub reflection: Option<String>,
    pub sleep_hours: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
