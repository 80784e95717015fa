//! Platform error types

use adbridge_core::BridgeError;
use thiserror::Error;

/// Collaborator-related errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlatformError {
    /// SDK initialization could not be started
    #[error("SDK initialization failed: {0}")]
    InitFailed(String),

    /// Host context not available
    #[error("Platform not available: {0}")]
    Unavailable(String),

    /// Operation not supported by this collaborator
    #[error("Platform not supported: {0}")]
    Unsupported(String),

    /// Failed to attach a view to the host hierarchy
    #[error("Failed to attach view: {0}")]
    ViewAttach(String),

    /// The UI thread no longer accepts work
    #[error("UI thread unavailable: {0}")]
    ThreadGone(String),

    /// Generic SDK error
    #[error("SDK error: {0}")]
    Other(String),
}

/// Result type for platform operations
pub type Result<T> = std::result::Result<T, PlatformError>;

/// Failure reported by the SDK through an error callback
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("code={code}, msg={message}")]
pub struct SdkFailure {
    pub code: i32,
    pub message: String,
}

impl SdkFailure {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<PlatformError> for BridgeError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Unavailable(_) => BridgeError::activity_null(),
            PlatformError::Unsupported(what) => BridgeError::Unsupported(what),
            other => BridgeError::Internal(other.to_string()),
        }
    }
}

impl From<SdkFailure> for BridgeError {
    fn from(failure: SdkFailure) -> Self {
        BridgeError::Sdk {
            code: failure.code,
            message: failure.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_bridge_error() {
        let err: BridgeError = PlatformError::Other("boom".into()).into();
        assert_eq!(err.code(), "exception");
        assert_eq!(err.message(), "SDK error: boom");

        let err: BridgeError = PlatformError::Unavailable("no activity".into()).into();
        assert_eq!(err.code(), "activity_null");

        let err: BridgeError = SdkFailure::new(40001, "no fill").into();
        assert_eq!(err.code(), "40001");
        assert_eq!(err.message(), "no fill");
    }
}
