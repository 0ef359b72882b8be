use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use carpool_core::CoreError;
use carpool_types::api::ErrorBody;

/// Everything a handler can fail with, rendered as `{ "code", "message" }`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Body, path or query string that could not be decoded
    #[error("{0}")]
    Rejected(String),

    #[error("missing or invalid bearer token")]
    Unauthorized,

    #[error("invalid email or password")]
    BadCredentials,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Core(CoreError::Validation(_)) | Self::Rejected(_) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            }
            Self::Core(CoreError::NotFound { .. }) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Core(CoreError::Forbidden(_)) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Core(CoreError::InvalidState(_)) => (StatusCode::CONFLICT, "INVALID_STATE"),
            Self::Core(CoreError::Conflict(_)) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Core(CoreError::Capacity(_)) => (StatusCode::CONFLICT, "CAPACITY"),
            Self::Unauthorized | Self::BadCredentials => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Core(CoreError::Storage(_)) | Self::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Rejected(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::Rejected(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Rejected(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Internal error: {:#}", self);
            "internal server error".to_string()
        } else {
            if status == StatusCode::FORBIDDEN {
                warn!("Forbidden: {}", self);
            }
            self.to_string()
        };

        (
            status,
            Json(ErrorBody {
                code: code.to_string(),
                message,
            }),
        )
            .into_response()
    }
}
