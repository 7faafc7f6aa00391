//! Error types for booknook-web

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::catalog::CatalogError;

/// API error type
///
/// Every variant renders as `{ "error": message }`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// No valid anonymous session presented (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Internal server error (500)
    #[error("{0}")]
    Internal(String),

    /// Request body missing, not JSON, or the wrong shape (400)
    #[error(transparent)]
    InvalidBody(#[from] JsonRejection),

    /// External catalog failure
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// booknook-common error
    #[error(transparent)]
    Common(#[from] booknook_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use booknook_common::Error as CommonError;

        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::InvalidBody(rejection) => (StatusCode::BAD_REQUEST, rejection.body_text()),
            ApiError::Catalog(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            ApiError::Common(err) => match err {
                CommonError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
                CommonError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
                CommonError::Unauthenticated(_) => (
                    StatusCode::UNAUTHORIZED,
                    "You must be signed in to leave a review.".to_string(),
                ),
                other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
            },
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
