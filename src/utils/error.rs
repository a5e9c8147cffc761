//! API Error Types
//!
//! Central error taxonomy for request handling, mapped onto HTTP statuses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use crate::services::usage::QuotaExceeded;

/// Errors surfaced to API clients.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Quota exceeded: {current_usage}/{limit} tokens in {window_hours}h window")]
    QuotaExceeded {
        current_usage: u64,
        limit: u64,
        window_hours: u64,
    },

    #[error("A turn is already in flight for thread '{0}'")]
    ConcurrentTurn(String),

    #[error("Reference '{reference}' not found in thread '{thread_id}'")]
    NotFound { reference: String, thread_id: String },

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<QuotaExceeded> for ApiError {
    fn from(e: QuotaExceeded) -> Self {
        Self::QuotaExceeded {
            current_usage: e.current_usage,
            limit: e.limit,
            window_hours: e.window_hours,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match &self {
            ApiError::InvalidRequest(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({"detail": detail}),
            ),
            ApiError::MissingParameter(param) => (
                StatusCode::BAD_REQUEST,
                json!({"detail": format!("Missing required parameter: {}", param)}),
            ),
            ApiError::QuotaExceeded { current_usage, limit, window_hours } => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({
                    "error_type": "quota_exceeded",
                    "current_usage": current_usage,
                    "limit": limit,
                    "window_hours": window_hours,
                }),
            ),
            ApiError::ConcurrentTurn(thread_id) => (
                StatusCode::CONFLICT,
                json!({
                    "error_type": "concurrent_turn",
                    "detail": format!("A turn is already in flight for thread '{}'", thread_id),
                }),
            ),
            ApiError::NotFound { reference, thread_id } => (
                StatusCode::NOT_FOUND,
                json!({
                    "detail": format!("Reference '{}' not found in thread '{}'", reference, thread_id),
                }),
            ),
            ApiError::Internal(detail) => {
                tracing::error!("Internal server error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"detail": format!("Internal server error: {}", detail)}),
                )
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_exceeded_maps_to_429() {
        let err = ApiError::QuotaExceeded { current_usage: 950, limit: 1000, window_hours: 24 };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_concurrent_turn_maps_to_409() {
        let err = ApiError::ConcurrentTurn("t1".into());
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_invalid_request_maps_to_422() {
        let err = ApiError::InvalidRequest("bad shape".into());
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
