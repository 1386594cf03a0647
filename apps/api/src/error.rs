//! # API Error Type
//!
//! Unified error type for HTTP handlers.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Tienda POS                             │
//! │                                                                         │
//! │  Handler                                                                │
//! │  Result<Json<T>, ApiError>                                              │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  DbError::InsufficientStock ────┐                                       │
//! │  DbError::Validation ───────────┤                                       │
//! │  DbError::Conflict ─────────────┼──► ApiError { code, message }         │
//! │  CloudError::InvalidSignature ──┤            │                          │
//! │  CloudError::Status ────────────┘            ▼                          │
//! │                                   IntoResponse: status + JSON body      │
//! │                                                                         │
//! │  {                                                                      │
//! │    "code": "INSUFFICIENT_STOCK",                                        │
//! │    "message": "Insufficient stock for variant 7: available 3, ..."      │
//! │  }                                                                      │
//! │                                                                         │
//! │  DATABASE_ERROR and INTERNAL are logged in full; the client only       │
//! │  sees a generic message.                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tienda_cloud::CloudError;
use tienda_core::{CoreError, ValidationError};
use tienda_db::DbError;

/// Result type of every handler.
pub type ApiResult<T> = Result<T, ApiError>;

/// Error body returned by every failing request.
///
/// ## Serialization
/// ```json
/// {
///   "code": "NOT_FOUND",
///   "message": "Variant not found: ABC-123"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed (400)
    ValidationError,

    /// Operation conflicts with current state (400)
    Conflict,

    /// Requested quantity exceeds stock on hand (400)
    InsufficientStock,

    /// Resource not found (404)
    NotFound,

    /// Webhook signature missing or wrong (401)
    Unauthorized,

    /// Cloud store call failed (502)
    ExternalService,

    /// Sync queue at capacity (503)
    Busy,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationError | ErrorCode::Conflict | ErrorCode::InsufficientStock => {
                StatusCode::BAD_REQUEST
            }
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::ExternalService => StatusCode::BAD_GATEWAY,
            ErrorCode::Busy => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::DatabaseError | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Conflict, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

// =============================================================================
// Conversions
// =============================================================================

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { .. } => ApiError::new(ErrorCode::NotFound, err.to_string()),
            DbError::UniqueViolation { field, value } => {
                ApiError::conflict(format!("{} '{}' already exists", field, value))
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::warn!(%message, "Foreign key violation");
                ApiError::validation("Invalid or still referenced record")
            }
            DbError::InsufficientStock { .. } => {
                ApiError::new(ErrorCode::InsufficientStock, err.to_string())
            }
            DbError::Conflict(message) => ApiError::conflict(message),
            DbError::Validation(e) => ApiError::from(e),
            DbError::Rule(e) => ApiError::from(e),
            DbError::ConnectionFailed(_)
            | DbError::MigrationFailed(_)
            | DbError::QueryFailed(_)
            | DbError::PoolExhausted
            | DbError::Internal(_) => {
                tracing::error!(error = %err, "Database operation failed");
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts core rule errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => ApiError::from(e),
            other => ApiError::validation(other.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

/// Converts cloud errors to API errors.
///
/// Only reached where a cloud failure is surfaced: store test, publish,
/// webhook order fetch and job enqueue.
impl From<CloudError> for ApiError {
    fn from(err: CloudError) -> Self {
        match err {
            CloudError::InvalidSignature => ApiError::new(ErrorCode::Unauthorized, err.to_string()),
            CloudError::QueueFull | CloudError::ShuttingDown => {
                ApiError::new(ErrorCode::Busy, err.to_string())
            }
            // Redelivering a malformed order can never succeed
            CloudError::InvalidPayload(_) | CloudError::InvalidAmount { .. } => {
                tracing::warn!(error = %err, "Rejected cloud payload");
                ApiError::validation(err.to_string())
            }
            other => {
                tracing::warn!(error = %other, "Cloud store call failed");
                ApiError::new(ErrorCode::ExternalService, other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (DbError::not_found("Sale", 9), StatusCode::NOT_FOUND),
            (DbError::conflict("No open cash session"), StatusCode::BAD_REQUEST),
            (
                DbError::InsufficientStock {
                    variant_id: 7,
                    available: 3,
                    requested: 5,
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                DbError::QueryFailed("disk I/O error".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).code.status(), status);
        }
    }

    #[test]
    fn test_database_details_are_hidden() {
        let err = ApiError::from(DbError::QueryFailed("no such table: sales".into()));
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(!err.message.contains("sales"));
    }

    #[test]
    fn test_rule_errors_are_validation() {
        let err = ApiError::from(DbError::Rule(CoreError::PaymentMethodRequired {
            amount_cents: 2000,
        }));
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[test]
    fn test_cloud_errors() {
        assert_eq!(
            ApiError::from(CloudError::InvalidSignature).code.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(CloudError::QueueFull).code.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(CloudError::Timeout).code,
            ErrorCode::ExternalService
        );
        assert_eq!(
            ApiError::from(CloudError::InvalidPayload("line quantity".into())).code,
            ErrorCode::ValidationError
        );
    }

    #[test]
    fn test_amount_overflow_is_validation() {
        let err = ApiError::from(DbError::Rule(CoreError::AmountOverflow {
            field: "subtotal".into(),
        }));
        assert_eq!(err.code.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_code_serializes_screaming_snake() {
        let body = serde_json::to_value(ApiError::new(ErrorCode::InsufficientStock, "x")).unwrap();
        assert_eq!(body["code"], "INSUFFICIENT_STOCK");
    }
}
