//! Error types for directory gateway operations.
//!
//! Every directory-protocol failure is translated into one of the kinds below at the
//! connection boundary, so callers never observe raw protocol errors. The informative
//! status mapping is provided for routing layers that expose the gateway over HTTP.

use serde::Serialize;
use thiserror::Error;

/// Main error type for directory gateway operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Lookup matched no entry, or the target entry does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Entry (or account name) is already taken
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Required attributes missing or malformed
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// Server-side policy refusal (weak password, insufficient rights, ...)
    #[error("Directory rejected the request: {0}")]
    DirectoryRejected(String),

    /// Network failure, timeout, or privileged bind failure
    #[error("Directory unreachable: {0}")]
    DirectoryUnreachable(String),

    /// Rename destination is occupied
    #[error("Target conflict: {0}")]
    TargetConflict(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid request (malformed names, DNs, ...)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Specialized result type for directory gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error response for serialization.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
    /// Optional request ID for tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error detail structure.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorDetail {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::SchemaViolation(_) => "SCHEMA_VIOLATION",
            Self::DirectoryRejected(_) => "DIRECTORY_REJECTED",
            Self::DirectoryUnreachable(_) => "DIRECTORY_UNREACHABLE",
            Self::TargetConflict(_) => "TARGET_CONFLICT",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Suggested HTTP status for a routing layer. Informative only.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::AlreadyExists(_) | Self::TargetConflict(_) => 409,
            Self::SchemaViolation(_)
            | Self::DirectoryRejected(_)
            | Self::InvalidRequest(_)
            | Self::ValidationError(_) => 400,
            Self::DirectoryUnreachable(_) => 503,
            Self::ConfigError(_) | Self::InternalError(_) => 500,
        }
    }

    /// Returns true when the failure means the underlying connection can no longer be trusted.
    #[must_use]
    pub const fn is_connection_failure(&self) -> bool {
        matches!(self, Self::DirectoryUnreachable(_))
    }

    /// Converts the error into an `ErrorResponse`.
    #[must_use]
    pub fn into_error_response(self) -> ErrorResponse {
        self.into_error_response_with_id(None)
    }

    /// Converts the error into an `ErrorResponse` with a request ID.
    #[must_use]
    pub fn into_error_response_with_id(self, request_id: Option<String>) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
                details: None,
            },
            request_id,
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::InternalError(_) | Self::ConfigError(_) | Self::DirectoryUnreachable(_)
        )
    }
}

// Conversions from external error types
impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::ConfigError(format!("invalid directory URL: {err}"))
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::NotFound("x".into()).error_code(), "NOT_FOUND");
        assert_eq!(
            Error::AlreadyExists("x".into()).error_code(),
            "ALREADY_EXISTS"
        );
        assert_eq!(
            Error::SchemaViolation("x".into()).error_code(),
            "SCHEMA_VIOLATION"
        );
        assert_eq!(
            Error::DirectoryRejected("x".into()).error_code(),
            "DIRECTORY_REJECTED"
        );
        assert_eq!(
            Error::DirectoryUnreachable("x".into()).error_code(),
            "DIRECTORY_UNREACHABLE"
        );
        assert_eq!(
            Error::TargetConflict("x".into()).error_code(),
            "TARGET_CONFLICT"
        );
        assert_eq!(Error::ConfigError("x".into()).error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::NotFound("jdoe".into()).status_code(), 404);
        assert_eq!(Error::AlreadyExists("PC1".into()).status_code(), 409);
        assert_eq!(Error::DirectoryRejected("policy".into()).status_code(), 400);
        assert_eq!(Error::DirectoryUnreachable("down".into()).status_code(), 503);
        assert_eq!(Error::InternalError("bug".into()).status_code(), 500);
    }

    #[test]
    fn test_error_display() {
        let err = Error::DirectoryRejected("constraintViolation".to_string());
        assert_eq!(
            err.to_string(),
            "Directory rejected the request: constraintViolation"
        );
    }

    #[test]
    fn test_into_error_response() {
        let err = Error::NotFound("user `ghost`".to_string());
        let response = err.clone().into_error_response();

        assert_eq!(response.error.code, "NOT_FOUND");
        assert_eq!(response.error.message, "Not found: user `ghost`");
        assert!(response.request_id.is_none());

        let response_with_id = err.into_error_response_with_id(Some("req-456".to_string()));
        assert_eq!(response_with_id.request_id, Some("req-456".to_string()));

        let json = serde_json::to_string(&response_with_id).unwrap();
        assert!(json.contains("NOT_FOUND"));
        assert!(!json.contains("details"));
    }

    #[test]
    fn test_should_log_and_connection_failure() {
        let unreachable = Error::DirectoryUnreachable("timed out".to_string());
        assert!(unreachable.should_log());
        assert!(unreachable.is_connection_failure());

        let missing = Error::NotFound("ghost".to_string());
        assert!(!missing.should_log());
        assert!(!missing.is_connection_failure());
        assert!(!Error::DirectoryRejected("weak".into()).is_connection_failure());
    }

    #[test]
    fn test_from_url_parse_error() {
        let err = url::Url::parse("not a url").unwrap_err();
        let converted: Error = err.into();
        assert!(matches!(converted, Error::ConfigError(_)));
    }
}
