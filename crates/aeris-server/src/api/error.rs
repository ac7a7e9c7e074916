//! API error type mapped onto HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    /// Malformed or out-of-range request input.
    Validation(String),
    /// Missing or invalid credentials.
    Auth(String),
    /// Resource absent or owned by another user (opaque).
    NotFound,
    /// The email is already registered.
    EmailTaken,
    /// A feature flag turned the endpoint off.
    FeatureDisabled(&'static str),
    /// An upstream provider failed.
    Upstream(String),
    /// Anything unexpected; details stay server-side.
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
            ApiError::Auth(message) => (StatusCode::UNAUTHORIZED, message),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            ApiError::EmailTaken => (StatusCode::CONFLICT, "email already registered".to_string()),
            ApiError::FeatureDisabled(feature) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("{feature} is disabled"),
            ),
            ApiError::Upstream(message) => (StatusCode::BAD_GATEWAY, message),
            ApiError::Internal(e) => {
                error!("Internal error: {e:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}
