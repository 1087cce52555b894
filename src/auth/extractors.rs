use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::warn;

use super::{claims::TokenKind, jwt::JwtKeys};
use crate::{error::ApiError, state::AppState, store::Store, users::repo_types::User};

/// Authenticated caller, resolved from a bearer access token.
///
/// Carries the full record including the password hash; handlers map it to
/// a public view before responding.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts);
        let user = authenticate(&state.tokens, state.store.as_ref(), token).await?;
        Ok(CurrentUser(user))
    }
}

/// Reads `Authorization: Bearer <token>`; the scheme is case-insensitive.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Resolves a bearer credential to a user. Read-only, so safe to repeat.
pub async fn authenticate(
    keys: &JwtKeys,
    store: &dyn Store,
    token: Option<&str>,
) -> Result<User, ApiError> {
    let token = token.ok_or(ApiError::MissingCredentials)?;

    let claims = keys.decode(token).ok_or_else(|| {
        warn!("invalid or expired token");
        ApiError::TokenInvalid
    })?;

    if claims.kind != TokenKind::Access {
        warn!(user_id = %claims.sub, kind = ?claims.kind, "non-access token presented");
        return Err(ApiError::TokenWrongType);
    }

    match store.find_user_by_id(claims.sub).await? {
        Some(user) => Ok(user),
        None => {
            warn!(user_id = %claims.sub, "token subject no longer exists");
            Err(ApiError::UserNotFound)
        }
    }
}
