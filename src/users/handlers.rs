use axum::{extract::State, routing::get, Json, Router};
use tracing::{info, instrument};

use super::{
    dto::{validate_name, PublicUser, UpdateProfileRequest},
    repo_types::UserUpdate,
};
use crate::{
    auth::extractors::CurrentUser,
    error::{ApiError, ApiResult},
    extract::AppJson,
    state::AppState,
};

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/users/me", get(get_me).patch(update_me))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(user.into())
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(payload): AppJson<UpdateProfileRequest>,
) -> ApiResult<Json<PublicUser>> {
    if let Some(name) = &payload.name {
        validate_name(name)?;
    }

    let update = UserUpdate {
        name: payload.name,
        avatar_url: payload.avatar_url,
    };
    if update.is_empty() {
        return Ok(Json(user.into()));
    }

    let updated = state
        .store
        .update_user(user.id, &update)
        .await?
        .ok_or(ApiError::UserNotFound)?;
    info!("profile updated");
    Ok(Json(updated.into()))
}
