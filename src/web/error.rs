//! JSON error responses.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::auth::AuthError;
use crate::upstream::UpstreamError;

/// An error rendered as `{"status": "error", "message": ..., "detail": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            detail: detail.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        let what = what.into();
        Self::new(StatusCode::NOT_FOUND, "Not found", what)
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Authentication failed", detail)
    }

    /// Wrap an upstream failure. `context` names the operation that failed.
    pub fn upstream(context: &str, err: UpstreamError) -> Self {
        let status = if err.is_not_found() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self::new(status, context, err.to_string())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let status = match &err {
            AuthError::InvalidCredentials | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::UsernameTaken | AuthError::EmailTaken | AuthError::Inactive => {
                StatusCode::BAD_REQUEST
            }
            AuthError::CredentialNotFound => StatusCode::NOT_FOUND,
            AuthError::Hash | AuthError::Signing(_) | AuthError::Db(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let message = match status {
            StatusCode::UNAUTHORIZED => "Authentication failed",
            StatusCode::BAD_REQUEST => "Invalid request",
            StatusCode::NOT_FOUND => "Not found",
            _ => "Internal server error",
        };
        Self::new(status, message, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("{}: {}", self.message, self.detail);
        }

        let body = Json(json!({
            "status": "error",
            "message": self.message,
            "detail": self.detail,
        }));
        let mut response = (self.status, body).into_response();
        if self.status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
