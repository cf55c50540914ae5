//! Centralized Error Handling Module
//!
//! Every failure carries a unique error code so log lines and API bodies can be
//! grepped by category.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - INPUT_xxx: malformed requests
//! - UPSTREAM_xxx: external collaborator failures

use std::fmt;

use super::types::ResponseCode;

/// Application-wide error type
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new AppError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create AppError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // Input Errors
    // ============================================
    /// Body is not valid JSON for the route
    InputInvalidJson,
    /// Required field missing or empty
    InputMissingField,
    /// Address is not a 0x-prefixed 20-byte hex string
    InputInvalidAddress,
    /// Field present but not acceptable (chain, wei value, calldata)
    InputInvalidValue,
    /// Route exists, method does not
    InputMethodNotAllowed,

    // ============================================
    // Upstream Errors
    // ============================================
    /// External collaborator returned an error
    UpstreamFailed,
    /// External collaborator did not answer in time
    UpstreamTimeout,
    /// External collaborator answered with something unparseable
    UpstreamInvalidResponse,

    // ============================================
    // Generic Errors
    // ============================================
    /// Invariant violated inside a request (panic, poisoned state)
    Internal,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputInvalidJson => "INPUT_INVALID_JSON",
            Self::InputMissingField => "INPUT_MISSING_FIELD",
            Self::InputInvalidAddress => "INPUT_INVALID_ADDRESS",
            Self::InputInvalidValue => "INPUT_INVALID_VALUE",
            Self::InputMethodNotAllowed => "INPUT_METHOD_NOT_ALLOWED",

            Self::UpstreamFailed => "UPSTREAM_FAILED",
            Self::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            Self::UpstreamInvalidResponse => "UPSTREAM_INVALID_RESPONSE",

            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// Terminal response code this error maps to when it reaches the caller
    pub fn response_code(&self) -> ResponseCode {
        match self {
            Self::InputInvalidJson
            | Self::InputMissingField
            | Self::InputInvalidAddress
            | Self::InputInvalidValue => ResponseCode::BadInput,
            Self::InputMethodNotAllowed => ResponseCode::MethodNotAllowed,
            _ => ResponseCode::InternalFailure,
        }
    }

    /// Get HTTP status code for API responses
    pub fn http_status(&self) -> u16 {
        self.response_code().http_status()
    }

    /// Upstream failures are recovered with a fallback payload, never surfaced
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::UpstreamFailed | Self::UpstreamTimeout | Self::UpstreamInvalidResponse
        )
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    /// Required field missing
    pub fn missing_field(field: &str) -> Self {
        Self::new(ErrorCode::InputMissingField, format!("Missing {}", field))
    }

    /// Invalid address
    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InputInvalidAddress, msg)
    }

    /// Invalid field value
    pub fn invalid_value(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InputInvalidValue, msg)
    }

    /// Body could not be decoded
    pub fn invalid_json(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InputInvalidJson, msg)
    }

    /// Route matched, method did not
    pub fn method_not_allowed(method: &str) -> Self {
        Self::new(
            ErrorCode::InputMethodNotAllowed,
            format!("Method {} not allowed", method),
        )
    }

    /// Upstream failure
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamFailed, msg)
    }

    /// Upstream timeout
    pub fn upstream_timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamTimeout, msg)
    }

    /// Internal invariant violated
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
    }
}

// ============================================
// Result type alias
// ============================================

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<eyre::Report> for AppError {
    fn from(err: eyre::Report) -> Self {
        Self::new(ErrorCode::UpstreamFailed, err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorCode::UpstreamTimeout, "Request timeout")
        } else {
            Self::with_source(ErrorCode::UpstreamFailed, "Upstream request failed", err)
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::UpstreamInvalidResponse, "JSON parse error", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = AppError::upstream_timeout("explorer timed out");
        assert_eq!(err.code, ErrorCode::UpstreamTimeout);
        assert_eq!(err.code.as_str(), "UPSTREAM_TIMEOUT");
        assert_eq!(err.to_string(), "[UPSTREAM_TIMEOUT] explorer timed out");
    }

    #[test]
    fn test_upstream_classification() {
        assert!(ErrorCode::UpstreamTimeout.is_upstream());
        assert!(ErrorCode::UpstreamInvalidResponse.is_upstream());
        assert!(!ErrorCode::InputMissingField.is_upstream());
        assert!(!ErrorCode::Internal.is_upstream());
    }

    #[test]
    fn test_http_status() {
        assert_eq!(ErrorCode::InputInvalidAddress.http_status(), 400);
        assert_eq!(ErrorCode::InputMethodNotAllowed.http_status(), 405);
        assert_eq!(ErrorCode::Internal.http_status(), 500);
    }
}
