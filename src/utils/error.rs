use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, warn};

use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too many requests: {message}")]
    TooManyRequests {
        message: String,
        retry_after_secs: Option<i64>,
    },

    #[error("Invalid verification code")]
    InvalidCode { remaining_attempts: i32 },

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::InvalidCode { .. } => StatusCode::BAD_REQUEST,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ExternalServiceError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::TooManyRequests { .. } => "TOO_MANY_REQUESTS",
            AppError::InvalidCode { .. } => "INVALID_CODE",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::ExternalServiceError(_) => "EXTERNAL_SERVICE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Client mistakes are logged at `warn`, server faults at `error`.
    fn log(&self) {
        match self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::TooManyRequests { message: msg, .. } => {
                warn!(code = self.code(), message = %msg, "Request rejected");
            }
            AppError::InvalidCode { remaining_attempts } => {
                warn!(code = self.code(), remaining_attempts, "Request rejected");
            }
            AppError::ExternalServiceError(msg) | AppError::InternalServerError(msg) => {
                error!(error = ?self, message = %msg, "Application error");
            }
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
        }
    }

    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{} not found", what))
    }

    /// Machine-readable extras the client can act on.
    pub fn details(&self) -> Option<Value> {
        match self {
            AppError::TooManyRequests {
                retry_after_secs: Some(secs),
                ..
            } => Some(json!({ "retry_after_secs": secs })),
            AppError::InvalidCode { remaining_attempts } => {
                Some(json!({ "remaining_attempts": remaining_attempts }))
            }
            _ => None,
        }
    }
}

fn public_message(err: &AppError) -> String {
    match err {
        AppError::ValidationError(msg)
        | AppError::AuthError(msg)
        | AppError::Forbidden(msg)
        | AppError::NotFound(msg)
        | AppError::Conflict(msg)
        | AppError::TooManyRequests { message: msg, .. }
        | AppError::ExternalServiceError(msg) => msg.clone(),
        AppError::InvalidCode { .. } => err.to_string(),
        AppError::InternalServerError(_) => "An internal error occurred".to_string(),
        AppError::DatabaseError(_) => "A database error occurred".to_string(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log internal details
        self.log();

        // Do not expose internal details in the API response
        error_response(code, public_message(&self), self.details(), status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::TooManyRequests {
                message: "x".into(),
                retry_after_secs: None
            }
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::DatabaseError(sqlx::Error::RowNotFound).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = AppError::InternalServerError("pool exhausted at shard 3".into());
        assert_eq!(public_message(&err), "An internal error occurred");

        let err = AppError::DatabaseError(sqlx::Error::RowNotFound);
        assert_eq!(public_message(&err), "A database error occurred");
    }

    #[test]
    fn test_details() {
        let err = AppError::InvalidCode {
            remaining_attempts: 3,
        };
        assert_eq!(err.details(), Some(json!({ "remaining_attempts": 3 })));
        assert_eq!(public_message(&err), "Invalid verification code");

        let err = AppError::TooManyRequests {
            message: "slow down".into(),
            retry_after_secs: Some(42),
        };
        assert_eq!(err.details(), Some(json!({ "retry_after_secs": 42 })));
        assert_eq!(AppError::not_found("Order").details(), None);
    }

    #[test]
    fn test_not_found_message() {
        let err = AppError::not_found("Event");
        assert_eq!(err.code(), "NOT_FOUND");
        assert_eq!(public_message(&err), "Event not found");
    }
}
