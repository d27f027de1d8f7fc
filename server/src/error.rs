use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::forms::FormError;
use crate::logic::PayloadError;
use crate::storage::StoreError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("Forbidden")]
    Forbidden,
    #[error("{0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN", "Forbidden".to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Internal(msg) => {
                error!(error = %msg, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message, code })).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<FormError> for ApiError {
    fn from(err: FormError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<PayloadError> for ApiError {
    fn from(err: PayloadError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) | StoreError::FormNotAvailable => {
                ApiError::NotFound(err.to_string())
            }
            StoreError::Form(err) => err.into(),
            StoreError::CodeExhausted | StoreError::Db(_) | StoreError::Corrupt(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_statuses() {
        let status = |err: StoreError| ApiError::from(err).into_response().status();
        assert_eq!(status(StoreError::NotFound("Form")), StatusCode::NOT_FOUND);
        assert_eq!(status(StoreError::FormNotAvailable), StatusCode::NOT_FOUND);
        assert_eq!(
            status(StoreError::Form(FormError::MissingTitle)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(StoreError::Db("disk full".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_found_message_names_the_entity() {
        match ApiError::from(StoreError::NotFound("Form")) {
            ApiError::NotFound(msg) => assert_eq!(msg, "Form not found"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
