use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use time::{Duration, OffsetDateTime, Time, UtcOffset};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{CreateEntryRequest, ListQuery},
    repo_types::MoodEntry,
    trend::{analyze, MoodAverages, MAX_ENTRIES},
};
use crate::{
    auth::extractors::CurrentUser,
    error::{ApiError, ApiResult},
    extract::{AppJson, AppQuery},
    state::AppState,
    store::StoreError,
};

pub fn entry_routes() -> Router<AppState> {
    Router::new()
        .route("/entries", get(list_entries).post(create_entry))
        .route("/entries/today", get(today_entry))
        .route("/entries/averages", get(averages))
}

/// Half-open UTC calendar day `[midnight, next midnight)` containing `now`.
pub(crate) fn day_window(now: OffsetDateTime) -> (OffsetDateTime, OffsetDateTime) {
    let start = now.to_offset(UtcOffset::UTC).replace_time(Time::MIDNIGHT);
    (start, start + Duration::days(1))
}

#[instrument(skip_all, fields(user_id = %user.id, limit = q.limit))]
pub async fn list_entries(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppQuery(q): AppQuery<ListQuery>,
) -> ApiResult<Json<Vec<MoodEntry>>> {
    let entries = state
        .store
        .find_recent_entries(user.id, q.clamped_limit())
        .await?;
    Ok(Json(entries))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn today_entry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Option<MoodEntry>>> {
    let (start, end) = day_window(OffsetDateTime::now_utc());
    let entry = state.store.find_entry_in_range(user.id, start, end).await?;
    Ok(Json(entry))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_entry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(payload): AppJson<CreateEntryRequest>,
) -> ApiResult<(StatusCode, Json<MoodEntry>)> {
    payload.validate()?;

    let now = OffsetDateTime::now_utc();
    let (start, end) = day_window(now);
    if state
        .store
        .find_entry_in_range(user.id, start, end)
        .await?
        .is_some()
    {
        warn!("entry already exists for today");
        return Err(ApiError::DuplicateEntryForDay);
    }

    let entry = MoodEntry {
        id: Uuid::new_v4(),
        user_id: user.id,
        mood: payload.mood,
        feelings: payload.feelings,
        reflection: payload.reflection,
        sleep_hours: payload.sleep_hours,
        created_at: now,
    };
    match state.store.insert_entry(&entry).await {
        Ok(()) => {}
        Err(StoreError::Conflict(constraint)) => {
            // lost a race with a concurrent create for the same day
            warn!(%constraint, "entry already exists for today");
            return Err(ApiError::DuplicateEntryForDay);
        }
        Err(e) => return Err(e.into()),
    }

    info!(entry_id = %entry.id, mood = entry.mood, "mood entry created");
    Ok((StatusCode::CREATED, Json(entry)))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn averages(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<MoodAverages>> {
    let recent = state
        .store
        .find_recent_entries(user.id, MAX_ENTRIES as i64)
        .await?;
    Ok(Json(analyze(&recent)))
}
