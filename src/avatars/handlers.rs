use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::AvatarUploadResponse,
    services::{ALLOWED_TYPES, MAX_AVATAR_BYTES},
};
use crate::{
    auth::extractors::CurrentUser,
    error::{ApiError, ApiResult},
    state::AppState,
};

pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/upload/avatar", post(upload_avatar))
        // room for multipart framing around a max-size image
        .layer(DefaultBodyLimit::max(MAX_AVATAR_BYTES + 64 * 1024))
}

/// POST /upload/avatar (multipart, field `file`)
#[instrument(skip(state, user, mp), fields(user_id = %user.id))]
pub async fn upload_avatar(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut mp: Multipart,
) -> ApiResult<Json<AvatarUploadResponse>> {
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !ALLOWED_TYPES.contains(&content_type.as_str()) {
            warn!(%content_type, "avatar rejected: type");
            return Err(ApiError::BadRequest(
                "Invalid file type. Only JPEG, PNG, and WebP images are allowed.".into(),
            ));
        }

        let too_large = || ApiError::BadRequest("File too large. Maximum size is 2MB.".into());
        let body = field.bytes().await.map_err(|e| {
            warn!(error = %e, "avatar rejected: unreadable or over body limit");
            too_large()
        })?;
        if body.len() > MAX_AVATAR_BYTES {
            warn!(size = body.len(), "avatar rejected: size");
            return Err(too_large());
        }

        let size = body.len();
        let url = state.avatars.store(user.id, body, &content_type).await?;
        info!(size, %content_type, "avatar stored");
        return Ok(Json(AvatarUploadResponse {
            url,
            success: true,
            size,
            content_type,
        }));
    }

    Err(ApiError::BadRequest("file is required".into()))
}
