//! HTTP-layer error mapping, per spec.md §7. Wraps `sessiond_core::CoreError`
//! the same way the teacher wraps `AuthError` in `auth/middleware.rs`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use sessiond_core::CoreError;

pub struct ApiError(pub CoreError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            CoreError::Unauthenticated => (StatusCode::UNAUTHORIZED, "missing or invalid bearer token".to_string()),
            CoreError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid credentials".to_string()),
            CoreError::InvalidMfa => (StatusCode::UNAUTHORIZED, "invalid mfa code".to_string()),
            CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            CoreError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            CoreError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            CoreError::Gone(msg) => (StatusCode::GONE, msg.clone()),
            CoreError::TooManyTries => (StatusCode::TOO_MANY_REQUESTS, "too many tries".to_string()),
            CoreError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            CoreError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
            CoreError::Peer(e) => {
                tracing::error!(error = %e, "peer daemon rpc failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
            CoreError::Db(e) => {
                tracing::error!(error = %e, "database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
