//! API-specific error types
//!
//! Provides error classification for API operations; the queue and the
//! uploader branch on the category rather than on status codes.

use thiserror::Error;

/// Categories of API errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// Authorization failures (401, 403) - eligible for refresh-and-retry
    Authentication,
    /// Server errors (5xx)
    Server,
    /// Client errors (4xx except auth)
    Client,
    /// Network/connection errors - no response received
    Network,
    /// Configuration errors
    Config,
}

/// API operation errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl ApiError {
    /// Get the error category for this error
    #[must_use]
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Auth(_) => ApiErrorCategory::Authentication,
            Self::Server(_) => ApiErrorCategory::Server,
            Self::Client(_) => ApiErrorCategory::Client,
            Self::Network(_) => ApiErrorCategory::Network,
            Self::Config(_) | Self::Cancelled => ApiErrorCategory::Config,
        }
    }

    /// True for authorization-class failures (401/403).
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        self.category() == ApiErrorCategory::Authentication
    }
}

impl From<pagetrail_domain::PagetrailError> for ApiError {
    fn from(err: pagetrail_domain::PagetrailError) -> Self {
        use pagetrail_domain::PagetrailError;
        match err {
            PagetrailError::Network(message) => Self::Network(message),
            PagetrailError::Auth(message) => Self::Auth(message),
            PagetrailError::Config(message) => Self::Config(message),
            PagetrailError::InvalidInput(message) => Self::Client(message),
            PagetrailError::Storage(message) | PagetrailError::Internal(message) => {
                Self::Server(message)
            }
        }
    }
}

impl From<ApiError> for pagetrail_domain::PagetrailError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Auth(message) => Self::Auth(message),
            ApiError::Network(message) => Self::Network(message),
            ApiError::Config(message) => Self::Config(message),
            ApiError::Client(message) | ApiError::Server(message) => Self::Network(message),
            ApiError::Cancelled => Self::Network("operation cancelled".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(ApiError::Auth("x".into()).category(), ApiErrorCategory::Authentication);
        assert_eq!(ApiError::Server("x".into()).category(), ApiErrorCategory::Server);
        assert_eq!(ApiError::Client("x".into()).category(), ApiErrorCategory::Client);
        assert_eq!(ApiError::Network("x".into()).category(), ApiErrorCategory::Network);
        assert_eq!(ApiError::Cancelled.category(), ApiErrorCategory::Config);
    }

    #[test]
    fn test_auth_failure_detection() {
        assert!(ApiError::Auth("401".into()).is_auth_failure());
        assert!(!ApiError::Server("500".into()).is_auth_failure());
        assert!(!ApiError::Cancelled.is_auth_failure());
    }
}
