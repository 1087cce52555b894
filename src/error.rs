//! Error type returned by every handler.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not authenticated")]
    MissingCredentials,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Invalid or expired token")]
    TokenInvalid,

    #[error("Invalid token type")]
    TokenWrongType,

    #[error("User not found")]
    UserNotFound,

    #[error("You have already logged your mood today")]
    DuplicateEntryForDay,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingCredentials
            | ApiError::InvalidCredentials
            | ApiError::TokenInvalid
            | ApiError::TokenWrongType
            | ApiError::UserNotFound => StatusCode::UNAUTHORIZED,
            ApiError::DuplicateEmail | ApiError::DuplicateEntryForDay => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn bearer_challenge(&self) -> bool {
        matches!(
            self,
            ApiError::MissingCredentials
                | ApiError::TokenInvalid
                | ApiError::TokenWrongType
                | ApiError::UserNotFound
        )
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(what) => {
                ApiError::Internal(anyhow::anyhow!("unexpected unique violation: {}", what))
            }
            StoreError::Backend(e) => ApiError::Internal(e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rej: JsonRejection) -> Self {
        match rej {
            // well-formed JSON that does not fit the request type
            JsonRejection::JsonDataError(_) => ApiError::Validation(rej.body_text()),
            _ => ApiError::BadRequest(rej.body_text()),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rej: QueryRejection) -> Self {
        ApiError::BadRequest(rej.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(e) = &self {
            tracing::error!(error = ?e, "request failed");
        }
        let status = self.status();
        let challenge = self.bearer_challenge();
        let mut res = (status, Json(json!({ "detail": self.to_string() }))).into_response();
        if challenge {
            res.headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        res
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
