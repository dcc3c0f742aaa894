//! API error type and JSON error response formatting.
//!
//! Every failure surfaces as exactly one JSON error body; the session it
//! belongs to stays usable afterwards.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use docent_chat::ChatError;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid parameters.
    BadRequest(String),
    /// 404 Not Found - resource does not exist.
    NotFound(String),
    /// 422 Unprocessable Entity - valid syntax but semantic validation failure.
    UnprocessableEntity(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
    /// 502 Bad Gateway - the model backend failed.
    UpstreamFailure(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::UnprocessableEntity(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable_entity", msg)
            }
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
            ApiError::UpstreamFailure(msg) => (StatusCode::BAD_GATEWAY, "upstream_failure", msg),
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match &err {
            ChatError::EmptyMessage => ApiError::BadRequest(err.to_string()),
            ChatError::SessionNotFound(_) | ChatError::UnknownAction(_) => {
                ApiError::NotFound(err.to_string())
            }
            ChatError::InvalidSettings(_) | ChatError::Ingest(_) | ChatError::NotConfigured => {
                ApiError::UnprocessableEntity(err.to_string())
            }
            ChatError::Model(_) => ApiError::UpstreamFailure(err.to_string()),
            ChatError::Internal(_) => ApiError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ChatError::EmptyMessage, StatusCode::BAD_REQUEST),
            (
                ChatError::SessionNotFound("x".into()),
                StatusCode::NOT_FOUND,
            ),
            (
                ChatError::InvalidSettings("temperature".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ChatError::Ingest("not a PDF".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (ChatError::Model("down".into()), StatusCode::BAD_GATEWAY),
            (
                ChatError::Internal("oops".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (chat_err, expected) in cases {
            let api_err: ApiError = chat_err.into();
            let response = api_err.into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
