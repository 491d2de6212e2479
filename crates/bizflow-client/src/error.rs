//! # Client Error Types
//!
//! Error types for everything that crosses an I/O boundary.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Client Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Persistence   │  │      Transport          │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  StorageFailed  │  │  ConnectionFailed       │ │
//! │  │  InvalidUrl     │  │  CorruptState   │  │  Disconnected           │ │
//! │  │  ConfigLoad/Save│  │  VersionMismatch│  │  Timeout                │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Protocol     │  │       API       │  │      Internal           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Serialization  │  │  Http (status)  │  │  NotAuthenticated       │ │
//! │  │  Core (decode)  │  │  Request        │  │  ChannelError           │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here is fatal. Stream and decode errors are logged and absorbed;
//! notification and restore errors become a toast.

use bizflow_core::CoreError;
use thiserror::Error;

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid client configuration.
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),

    /// Invalid API or stream URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    // =========================================================================
    // Persistence Errors
    // =========================================================================
    /// Reading or writing a persisted blob failed.
    #[error("Storage error: {0}")]
    StorageFailed(String),

    /// A persisted blob exists but cannot be decoded.
    #[error("Persisted state '{name}' is corrupt: {reason}")]
    CorruptState { name: String, reason: String },

    /// A persisted blob was written by an incompatible client version.
    #[error("Persisted state '{name}' has version {found}, expected {expected}")]
    VersionMismatch { name: String, found: u32, expected: u32 },

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Failed to open the push channel.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Push channel ended unexpectedly.
    #[error("Disconnected from event stream")]
    Disconnected,

    /// Request or connect timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// JSON encode/decode failed.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Domain-level decode or validation failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    // =========================================================================
    // API Errors
    // =========================================================================
    /// Server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Request could not be sent or its body not read.
    #[error("Request failed: {0}")]
    RequestFailed(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// An operation needed a session token and none is present.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::StorageFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ClientError {
    fn from(err: toml::de::Error) -> Self {
        ClientError::ConfigLoadFailed(err.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            ClientError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_connect() {
            ClientError::ConnectionFailed(err.to_string())
        } else if err.is_decode() {
            ClientError::SerializationFailed(err.to_string())
        } else {
            ClientError::RequestFailed(err.to_string())
        }
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl ClientError {
    /// Returns true if the operation can be retried as-is.
    ///
    /// ## Retryable Errors
    /// - Connection failures and disconnects
    /// - Timeouts
    /// - 5xx and 429 responses
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::ConnectionFailed(_)
            | ClientError::Disconnected
            | ClientError::Timeout(_)
            | ClientError::RequestFailed(_) => true,
            ClientError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ClientError::InvalidConfig(_)
                | ClientError::InvalidUrl(_)
                | ClientError::ConfigLoadFailed(_)
        )
    }

    /// Returns true if the server rejected the session token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            ClientError::NotAuthenticated | ClientError::Http { status: 401, .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(ClientError::ConnectionFailed("refused".into()).is_retryable());
        assert!(ClientError::Disconnected.is_retryable());
        assert!(ClientError::Http { status: 503, message: "busy".into() }.is_retryable());
        assert!(ClientError::Http { status: 429, message: "slow down".into() }.is_retryable());

        assert!(!ClientError::Http { status: 404, message: "gone".into() }.is_retryable());
        assert!(!ClientError::InvalidConfig("bad".into()).is_retryable());
        assert!(!ClientError::NotAuthenticated.is_retryable());
    }

    #[test]
    fn test_config_errors() {
        assert!(ClientError::InvalidUrl("x".into()).is_config_error());
        assert!(!ClientError::StorageFailed("x".into()).is_config_error());
    }

    #[test]
    fn test_core_error_is_transparent() {
        let err: ClientError = CoreError::UnknownEventType("UNKNOWN_X".into()).into();
        assert_eq!(err.to_string(), "Unknown stream event type: UNKNOWN_X");
        assert!(ClientError::Http { status: 401, message: String::new() }.is_unauthorized());
    }
}
