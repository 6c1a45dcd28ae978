//! Token Lifecycle Error Types
//!
//! Error hierarchy for token storage, refresh, and manager operations.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Root error type for token lifecycle operations.
#[derive(Error, Debug)]
pub enum TokenLifecycleError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Refresh error: {0}")]
    Refresh(#[from] RefreshError),
}

impl TokenLifecycleError {
    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "TOKEN_CONFIG",
            Self::Storage(_) => "TOKEN_STORAGE",
            Self::Token(_) => "TOKEN_STATE",
            Self::Refresh(_) => "TOKEN_REFRESH",
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Refresh(e) => e.is_retryable(),
            Self::Token(TokenError::Timeout { .. }) => true,
            Self::Storage(StorageError::Io { .. }) => true,
            _ => false,
        }
    }

    /// Check if error requires the user to sign in again.
    pub fn needs_reauth(&self) -> bool {
        matches!(
            self,
            Self::Token(TokenError::NotFound { .. })
                | Self::Token(TokenError::NoRefreshToken { .. })
                | Self::Refresh(RefreshError::InvalidGrant { .. })
        )
    }

    /// Check if the operation was abandoned because of a cancellation or deadline.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            Self::Token(TokenError::Cancelled) | Self::Token(TokenError::Timeout { .. })
        )
    }
}

/// Configuration error.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Missing required field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Storage backend error.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid entry: {message}")]
    InvalidEntry { message: String },

    #[error("I/O failure on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization failed: {message}")]
    Serialization { message: String },

    #[error("Corrupted data in {}: {message}", .path.display())]
    Corrupted { path: PathBuf, message: String },

    #[error("Storage unavailable: {message}")]
    Unavailable { message: String },
}

impl StorageError {
    pub(crate) fn invalid_entry(message: impl Into<String>) -> Self {
        Self::InvalidEntry {
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Token state error.
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("No token for resource: {resource}")]
    NotFound { resource: String },

    #[error("Token for resource {resource} cannot be refreshed")]
    NoRefreshToken { resource: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },
}

/// Error reported by a [`RefreshHandler`](crate::refresh::RefreshHandler).
#[derive(Error, Debug, Clone)]
pub enum RefreshError {
    #[error("Refresh rejected: {message}")]
    Rejected { message: String },

    #[error("Invalid grant: {message}")]
    InvalidGrant { message: String },

    #[error("Network failure: {message}")]
    Network { message: String },

    #[error("Invalid token response: {message}")]
    InvalidResponse { message: String },
}

impl RefreshError {
    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

/// Result type for token lifecycle operations.
pub type TokenResult<T> = Result<T, TokenLifecycleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let error: TokenLifecycleError = TokenError::Cancelled.into();
        assert_eq!(error.error_code(), "TOKEN_STATE");

        let error: TokenLifecycleError = StorageError::invalid_entry("empty").into();
        assert_eq!(error.error_code(), "TOKEN_STORAGE");
    }

    #[test]
    fn test_error_is_retryable() {
        let error: TokenLifecycleError = RefreshError::Network {
            message: "connection reset".to_string(),
        }
        .into();
        assert!(error.is_retryable());

        let error: TokenLifecycleError = RefreshError::InvalidGrant {
            message: "revoked".to_string(),
        }
        .into();
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_needs_reauth() {
        let error: TokenLifecycleError = TokenError::NotFound {
            resource: "user-1".to_string(),
        }
        .into();
        assert!(error.needs_reauth());

        let error: TokenLifecycleError = TokenError::Cancelled.into();
        assert!(!error.needs_reauth());
        assert!(error.is_cancellation());
    }

    #[test]
    fn test_display_includes_resource() {
        let error: TokenLifecycleError = TokenError::NotFound {
            resource: "svc-a".to_string(),
        }
        .into();
        assert_eq!(
            error.to_string(),
            "Token error: No token for resource: svc-a"
        );
    }
}
