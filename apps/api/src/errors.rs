use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::documents::StoreError;
use crate::quota::LimitType;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limit exceeded ({}): {remaining}/{limit} remaining", .limit_type.as_str())]
    RateLimited {
        limit: i64,
        remaining: i64,
        reset_at: Option<i64>,
        retry_after: Option<i64>,
        limit_type: LimitType,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => AppError::Database(e),
            StoreError::Decode(e) => AppError::Internal(e.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::RateLimited {
                limit,
                remaining,
                reset_at,
                retry_after,
                limit_type,
            } => {
                return rate_limited_response(*limit, *remaining, *reset_at, *retry_after, *limit_type)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

fn rate_limited_response(
    limit: i64,
    remaining: i64,
    reset_at: Option<i64>,
    retry_after: Option<i64>,
    limit_type: LimitType,
) -> Response {
    let message = match limit_type {
        LimitType::Daily => format!("Daily enhancement limit exceeded ({limit}/day)"),
        LimitType::Monthly => format!(
            "You have used all {limit} enhancements for this month. Upgrade your plan for more."
        ),
    };

    let body = Json(json!({
        "error": {
            "code": "RATE_LIMITED",
            "message": message,
            "limit_type": limit_type.as_str(),
            "limit": limit,
            "remaining": remaining,
            "reset_at": reset_at,
            "retry_after": retry_after
        }
    }));

    let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
    if let Some(seconds) = retry_after {
        if let Ok(value) = HeaderValue::from_str(&seconds.max(0).to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
    }
    response
}
