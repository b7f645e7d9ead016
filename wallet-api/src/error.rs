//! HTTP error mapping
//!
//! Every failure leaving a handler renders as the same JSON shape:
//! `{"error": <stable code>, "error_description": <text>, "code": <status>}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use wallet_core::Error as CoreError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub error_description: String,
    pub code: u16,
}

#[derive(Debug)]
pub enum ApiError {
    Core(CoreError),
    MissingToken,
    InvalidToken,
    PathUserMismatch,
    RouteNotFound,
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::Core(err)
    }
}

impl ApiError {
    /// Status code, stable error code, and human-readable description
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Core(err) => core_parts(err),
            ApiError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "missing bearer token".to_string(),
            ),
            ApiError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "unknown bearer token".to_string(),
            ),
            ApiError::PathUserMismatch => (
                StatusCode::FORBIDDEN,
                "user_mismatch",
                "the path user is not the authenticated user".to_string(),
            ),
            ApiError::RouteNotFound => (
                StatusCode::NOT_FOUND,
                "not_found",
                "no such route".to_string(),
            ),
        }
    }
}

fn core_parts(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::InvalidAmount(_) => (StatusCode::BAD_REQUEST, "invalid_amount", err.to_string()),
        CoreError::SelfTransfer(_) => (StatusCode::BAD_REQUEST, "self_transfer", err.to_string()),
        CoreError::WalletNotFound(_) => {
            (StatusCode::NOT_FOUND, "wallet_not_found", err.to_string())
        }
        CoreError::UserMismatch { .. } => (StatusCode::FORBIDDEN, "user_mismatch", err.to_string()),
        CoreError::InsufficientFunds { .. } => {
            (StatusCode::FORBIDDEN, "insufficient_funds", err.to_string())
        }
        CoreError::ConcurrencyConflict(_) | CoreError::ConcurrencyExhausted { .. } => {
            (StatusCode::CONFLICT, "conflict", err.to_string())
        }
        // The detail goes to the log, never to the client
        CoreError::Persistence(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "internal server error".to_string(),
        ),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Core(CoreError::Persistence(detail)) => {
                tracing::error!("persistence failure: {detail}");
            }
            ApiError::Core(err) => {
                tracing::warn!("operation rejected: {err}");
            }
            _ => {}
        }
        let (status, error, error_description) = self.parts();
        let body = ErrorBody {
            error,
            error_description,
            code: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}
