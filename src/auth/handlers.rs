use anyhow::Context;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    claims::TokenKind,
    dto::{validate_password, LoginRequest, RefreshRequest, RegisterRequest, RegisterResponse, TokenResponse},
    jwt::JwtKeys,
    password::PasswordHasher,
};
use crate::{
    error::{ApiError, ApiResult},
    extract::AppJson,
    state::AppState,
    store::StoreError,
    users::{dto::validate_name, repo_types::User},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn issue_pair(keys: &JwtKeys, user_id: Uuid) -> ApiResult<TokenResponse> {
    let access = keys.sign_access(user_id).context("sign access token")?;
    let refresh = keys.sign_refresh(user_id).context("sign refresh token")?;
    Ok(TokenResponse::bearer(access, refresh))
}

// argon2 is deliberately slow; keep it off the async workers
async fn hash_blocking(hasher: &PasswordHasher, plain: String) -> anyhow::Result<String> {
    let hasher = hasher.clone();
    tokio::task::spawn_blocking(move || hasher.hash(&plain))
        .await
        .context("hash task panicked")?
}

async fn verify_blocking(hasher: &PasswordHasher, plain: String, hash: String) -> anyhow::Result<bool> {
    let hasher = hasher.clone();
    tokio::task::spawn_blocking(move || hasher.verify(&plain, &hash))
        .await
        .context("verify task panicked")
}

async fn dummy_verify_blocking(hasher: &PasswordHasher, plain: String) -> anyhow::Result<()> {
    let hasher = hasher.clone();
    tokio::task::spawn_blocking(move || hasher.verify_dummy(&plain))
        .await
        .context("verify task panicked")
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(mut payload): AppJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    payload.email = payload.email.trim().to_string();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    validate_name(&payload.name)?;
    validate_password(&payload.password)?;

    if state.store.find_user_by_email(&payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::DuplicateEmail);
    }

    let password_hash = hash_blocking(&state.passwords, payload.password).await?;
    let user = User {
        id: Uuid::new_v4(),
        email: payload.email,
        name: payload.name,
        password_hash,
        avatar_url: None,
        created_at: OffsetDateTime::now_utc(),
    };

    match state.store.insert_user(&user).await {
        Ok(()) => {}
        Err(StoreError::Conflict(constraint)) => {
            warn!(email = %user.email, %constraint, "email registered concurrently");
            return Err(ApiError::DuplicateEmail);
        }
        Err(e) => return Err(e.into()),
    }

    let tokens = issue_pair(&state.tokens, user.id)?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            tokens,
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(mut payload): AppJson<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    payload.email = payload.email.trim().to_string();

    let Some(user) = state.store.find_user_by_email(&payload.email).await? else {
        warn!(email = %payload.email, "login unknown email");
        dummy_verify_blocking(&state.passwords, payload.password).await?;
        return Err(ApiError::InvalidCredentials);
    };

    let ok = verify_blocking(&state.passwords, payload.password, user.password_hash.clone()).await?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let tokens = issue_pair(&state.tokens, user.id)?;
    info!(user_id = %user.id, "user logged in");
    Ok(Json(tokens))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RefreshRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let claims = state.tokens.decode(&payload.refresh_token).ok_or_else(|| {
        warn!("invalid or expired refresh token");
        ApiError::TokenInvalid
    })?;

    if claims.kind != TokenKind::Refresh {
        warn!(user_id = %claims.sub, "refresh attempted with access token");
        return Err(ApiError::TokenWrongType);
    }

    let Some(user) = state.store.find_user_by_id(claims.sub).await? else {
        warn!(user_id = %claims.sub, "refresh for missing user");
        return Err(ApiError::UserNotFound);
    };

    let tokens = issue_pair(&state.tokens, user.id)?;
    info!(user_id = %user.id, "tokens refreshed");
    Ok(Json(tokens))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("First.Last@Example.org"));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.de"));
    }

    #[test]
    fn token_response_is_bearer() {
        let json = serde_json::to_value(TokenResponse::bearer("a".into(), "r".into())).unwrap();
        assert_eq!(json["token_type"], "bearer");
        assert_eq!(json["access_token"], "a");
        assert_eq!(json["refresh_token"], "r");
    }
}
