use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::grading::GradingError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    BadGateway(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }

    fn status_and_detail(self) -> (StatusCode, String) {
        match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            ApiError::BadGateway(message) => {
                tracing::warn!(error = %message, "Upstream grading failure");
                (StatusCode::BAD_GATEWAY, message)
            }
            ApiError::ServiceUnavailable(message) => {
                tracing::error!(error = %message, "Service unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, message)
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        }
    }
}

impl From<GradingError> for ApiError {
    fn from(err: GradingError) -> Self {
        if err.is_rate_limited() {
            return ApiError::ServiceUnavailable(err.to_string());
        }

        match err {
            GradingError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            GradingError::InProgress(_) => ApiError::Conflict(err.to_string()),
            GradingError::Validation(message) => ApiError::BadRequest(message),
            GradingError::GradingFailed { .. } => ApiError::BadGateway(err.to_string()),
            GradingError::Store(source) => ApiError::internal(source, "Grading store failure"),
            GradingError::Queue(source) => ApiError::internal(source, "Grading queue failure"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = self.status_and_detail();
        (status, Json(ErrorResponse { status: status.as_u16(), detail })).into_response()
    }
}
