//! API error types and handling.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use sy_core::db::{ConstraintKind, DbError};
use thiserror::Error;
use tracing::error;

/// API error type.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request (validation error, invalid input).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unauthorized (missing or invalid authentication).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Forbidden (authenticated but not allowed).
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Conflict (concurrent modification or duplicate resource).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Validation error with field-level details.
    #[error("Validation failed")]
    ValidationError(ValidationErrorDetails),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Service temporarily unavailable.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Details for field-level validation errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetails {
    /// Overall validation error message.
    pub message: String,
    /// Field-specific errors.
    pub fields: HashMap<String, Vec<FieldError>>,
}

/// A single field validation error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldError {
    /// Error code (e.g., "required", "unique", "invalid_format").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ValidationErrorDetails {
    /// Creates a new validation error with a single field error.
    pub fn field(field: &str, code: &str, message: &str) -> Self {
        let mut fields = HashMap::new();
        fields.insert(
            field.to_string(),
            vec![FieldError {
                code: code.to_string(),
                message: message.to_string(),
            }],
        );
        Self {
            message: format!("Validation failed for field '{}'", field),
            fields,
        }
    }
}

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional error details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Returns the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
            ApiError::Database(_) => "DATABASE_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Creates a validation error for a single field.
    pub fn validation_field(field: &str, code: &str, message: &str) -> Self {
        ApiError::ValidationError(ValidationErrorDetails::field(field, code, message))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (message, details) = match &self {
            ApiError::ValidationError(details) => (
                details.message.clone(),
                Some(serde_json::to_value(&details.fields).unwrap_or_default()),
            ),
            // Internal detail stays in the logs, not the response.
            ApiError::Internal(msg) | ApiError::Database(msg) => {
                error!(error = %msg, "internal error");
                ("Internal Server Error".to_string(), None)
            }
            _ => (self.to_string(), None),
        };

        let body = ErrorResponse {
            code: self.error_code().to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{} with id {} not found", entity, id))
            }
            // A stale write that never succeeded within the retry budget is
            // still the caller's conflict to resolve.
            DbError::Conflict { .. } | DbError::ConflictExhausted { .. } => ApiError::Conflict(
                "The record was changed by someone else. Refresh and try again.".to_string(),
            ),
            DbError::RetryExhausted { .. } | DbError::PoolExhausted => ApiError::ServiceUnavailable(
                "The service is temporarily unavailable. Please retry shortly.".to_string(),
            ),
            DbError::Constraint {
                kind: ConstraintKind::Unique,
                message,
            } => ApiError::validation_field("value", "unique", &message),
            DbError::Constraint { message, .. } => ApiError::Conflict(message),
            DbError::TenantRequired => {
                ApiError::BadRequest("No tenant in request context".to_string())
            }
            DbError::TenantMismatch { .. } => {
                // Cross-tenant access reads as absence, never as existence.
                ApiError::NotFound("Not Found".to_string())
            }
            DbError::Serialization(msg) => ApiError::BadRequest(msg),
            err => ApiError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::BadRequest(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_exhausted_maps_to_409() {
        let err: ApiError = DbError::ConflictExhausted {
            attempts: 3,
            elapsed: std::time::Duration::ZERO,
            history: vec!["attempt 1: conflict".to_string()],
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(err.to_string().contains("Refresh"));
    }

    #[test]
    fn retry_exhausted_maps_to_503() {
        let err: ApiError = DbError::RetryExhausted {
            attempts: 3,
            elapsed: std::time::Duration::from_millis(300),
            history: vec![],
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn unique_violation_maps_to_field_level_422() {
        let err: ApiError = DbError::Constraint {
            kind: ConstraintKind::Unique,
            message: "branch code already in use".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        match err {
            ApiError::ValidationError(details) => {
                assert!(details.fields.contains_key("value"));
            }
            other => panic!("expected validation error, got {}", other),
        }
    }

    #[test]
    fn tenant_required_maps_to_400() {
        let err: ApiError = DbError::TenantRequired.into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn tenant_mismatch_reads_as_not_found() {
        let err: ApiError = DbError::TenantMismatch {
            entity: "branches".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn not_found_maps_to_404() {
        let err: ApiError = DbError::not_found("Tenant", "abc").into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
