//! API error handling: maps domain `Error` values onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::Error;

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub status: String,
    pub message: String,
}

/// API error type that can be converted to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    pub status_code: StatusCode,
    pub status: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status_code: StatusCode, status: impl Into<String>, message: impl Into<String>) -> Self {
        Self { status_code, status: status.into(), message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "already_queued", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "upstream_unavailable", message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "unplayable", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse { status: self.status, message: self.message };
        (self.status_code, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound { entity_type, id } => {
                ApiError::not_found(format!("{entity_type} '{id}' not found"))
            }
            Error::AlreadyQueued(reference_id) => {
                ApiError::conflict(format!("a group with reference '{reference_id}' is already queued"))
            }
            Error::Validation(msg) => ApiError::bad_request(msg),
            Error::UpstreamUnavailable(msg) => ApiError::bad_gateway(msg),
            Error::NotPlayable(status) => ApiError::unprocessable(format!("video is not playable: {status}")),
            Error::NoAudioStream => ApiError::unprocessable("no audio stream found"),
            Error::Http(e) => ApiError::bad_gateway(e.to_string()),
            Error::DatabaseSqlx(e) => {
                tracing::error!(error = %e, "database error");
                ApiError::internal("database error")
            }
            Error::Database(msg) => {
                tracing::error!(error = %msg, "database error");
                ApiError::internal("database error")
            }
            Error::Io(e) => {
                tracing::error!(error = %e, "io error");
                ApiError::internal("io error")
            }
            Error::Configuration(msg) => {
                tracing::error!(error = %msg, "configuration error");
                ApiError::internal("server misconfigured")
            }
            other => {
                tracing::error!(error = %other, "unexpected error");
                ApiError::internal("an unexpected error occurred")
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_queued_maps_to_409() {
        let api_err: ApiError = Error::AlreadyQueued("PL1".into()).into();
        assert_eq!(api_err.status_code, StatusCode::CONFLICT);
        assert_eq!(api_err.status, "already_queued");
    }

    #[test]
    fn not_found_maps_to_404() {
        let api_err: ApiError = Error::not_found("group task", "9").into();
        assert_eq!(api_err.status_code, StatusCode::NOT_FOUND);
    }
}
