//! # Cloud Error Types
//!
//! Error types for cloud store operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Cloud Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Payload             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Disabled       │  │  Http           │  │  Decode                 │ │
//! │  │  InvalidUrl     │  │  Status         │  │  InvalidAmount          │ │
//! │  │                 │  │  Timeout        │  │  InvalidPayload         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │    Webhooks     │  │   Sync jobs     │                              │
//! │  │                 │  │                 │                              │
//! │  │  InvalidSignature│ │  QueueFull      │                              │
//! │  │                 │  │  ShuttingDown   │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Callers decide what a failure means. A stock push after a committed
//! sale logs and moves on; publishing a product surfaces the error.

use thiserror::Error;

/// Result type alias for cloud operations.
pub type CloudResult<T> = Result<T, CloudError>;

/// Cloud error type covering every failure talking to the cloud store.
#[derive(Debug, Error)]
pub enum CloudError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Store id or access token not configured.
    #[error("Cloud store integration is not configured")]
    Disabled,

    /// Base URL does not parse.
    #[error("Invalid cloud store URL: {0}")]
    InvalidUrl(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Request could not be sent or the response not read.
    #[error("Cloud store request failed: {0}")]
    Http(String),

    /// The platform answered with a non-success status.
    #[error("Cloud store returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The call exceeded the configured timeout.
    #[error("Cloud store request timed out")]
    Timeout,

    // =========================================================================
    // Payload Errors
    // =========================================================================
    /// Response body is not the expected JSON.
    #[error("Failed to decode cloud store response: {0}")]
    Decode(String),

    /// A money field is not a decimal number.
    #[error("Invalid amount in {field}: {value}")]
    InvalidAmount { field: String, value: String },

    /// A payload is structurally unusable (missing order id, ...).
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    // =========================================================================
    // Webhook Errors
    // =========================================================================
    /// Missing or wrong `X-LinkedStore-HMAC-SHA256`.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    // =========================================================================
    // Sync Job Errors
    // =========================================================================
    /// The job queue is at capacity.
    #[error("Sync queue is full, try again later")]
    QueueFull,

    /// The job worker has stopped.
    #[error("Sync worker is shutting down")]
    ShuttingDown,
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<reqwest::Error> for CloudError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CloudError::Timeout
        } else if err.is_decode() {
            CloudError::Decode(err.to_string())
        } else {
            CloudError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CloudError {
    fn from(err: serde_json::Error) -> Self {
        CloudError::Decode(err.to_string())
    }
}

impl From<url::ParseError> for CloudError {
    fn from(err: url::ParseError) -> Self {
        CloudError::InvalidUrl(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl CloudError {
    /// Returns true if the same call may succeed later.
    ///
    /// ## Retryable Errors
    /// - Transport failures and timeouts
    /// - 429 and 5xx answers
    ///
    /// ## Non-Retryable Errors
    /// - Configuration and payload errors
    /// - Other 4xx answers (the request itself is wrong)
    pub fn is_retryable(&self) -> bool {
        match self {
            CloudError::Http(_) | CloudError::Timeout => true,
            CloudError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(CloudError::Timeout.is_retryable());
        assert!(CloudError::Http("connection reset".into()).is_retryable());
        assert!(CloudError::Status {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(CloudError::Status {
            status: 429,
            body: String::new()
        }
        .is_retryable());

        assert!(!CloudError::Status {
            status: 422,
            body: "bad variant".into()
        }
        .is_retryable());
        assert!(!CloudError::Disabled.is_retryable());
        assert!(!CloudError::InvalidSignature.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = CloudError::Status {
            status: 404,
            body: "Not Found".into(),
        };
        assert!(err.to_string().contains("404"));
    }
}
