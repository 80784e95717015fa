//! Bridge error types
//!
//! Every failure that crosses the public surface is one of these variants and
//! reaches the caller through a listener or a conservative return value,
//! never as a panic. [`BridgeError::code`] gives the stable string the host
//! receives alongside the message.

use thiserror::Error;

/// Wire code for a missing configuration map
pub const CODE_INVALID_REQUEST: &str = "invalid_request";
/// Wire code for an absent or non-positive `space_id`
pub const CODE_INVALID_SPACE_ID: &str = "invalid_space_id";
/// Wire code when no host activity is available
pub const CODE_ACTIVITY_NULL: &str = "activity_null";
/// Wire code for a bounded wait that ran out
pub const CODE_TIMEOUT: &str = "timeout";
/// Wire code for an ad kind the bridge cannot load
pub const CODE_UNSUPPORTED_TYPE: &str = "unsupported_type";
/// Wire code for unexpected collaborator failures
pub const CODE_EXCEPTION: &str = "exception";
/// Wire code for a load that completed after its handle was destroyed
pub const CODE_DESTROYED: &str = "destroyed";

/// Errors produced by the bridge
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// Missing or malformed configuration
    #[error("{message}")]
    InvalidRequest { code: &'static str, message: String },

    /// No host execution context (activity) available
    #[error("host context unavailable: {0}")]
    ResourceUnavailable(String),

    /// A bounded wait was exceeded
    #[error("{0} timed out")]
    Timeout(String),

    /// Unknown or unimplemented resource kind
    #[error("unsupported ad type: {0}")]
    Unsupported(String),

    /// Unexpected failure from the SDK collaborator or the dispatcher
    #[error("{0}")]
    Internal(String),

    /// Failure reported by the SDK through its error callback
    #[error("sdk error {code}: {message}")]
    Sdk { code: i32, message: String },

    /// The handle was destroyed while the operation was in flight
    #[error("ad {0} was destroyed")]
    Destroyed(String),
}

impl BridgeError {
    /// Configuration map was not supplied at all
    pub fn missing_config() -> Self {
        BridgeError::InvalidRequest {
            code: CODE_INVALID_REQUEST,
            message: "Request extras cannot be null, must include space_id".to_string(),
        }
    }

    /// Identifying field absent, non-numeric or not positive
    pub fn invalid_space_id(field: &str) -> Self {
        BridgeError::InvalidRequest {
            code: CODE_INVALID_SPACE_ID,
            message: format!("{} must be provided and greater than zero in extras", field),
        }
    }

    /// Host has no current activity
    pub fn activity_null() -> Self {
        BridgeError::ResourceUnavailable("activity is null".to_string())
    }

    /// Stable string code delivered to listeners
    pub fn code(&self) -> String {
        match self {
            BridgeError::InvalidRequest { code, .. } => (*code).to_string(),
            BridgeError::ResourceUnavailable(_) => CODE_ACTIVITY_NULL.to_string(),
            BridgeError::Timeout(_) => CODE_TIMEOUT.to_string(),
            BridgeError::Unsupported(_) => CODE_UNSUPPORTED_TYPE.to_string(),
            BridgeError::Internal(_) => CODE_EXCEPTION.to_string(),
            BridgeError::Sdk { code, .. } => code.to_string(),
            BridgeError::Destroyed(_) => CODE_DESTROYED.to_string(),
        }
    }

    /// Message delivered to listeners alongside [`code`](Self::code)
    pub fn message(&self) -> String {
        match self {
            BridgeError::Sdk { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(BridgeError::missing_config().code(), "invalid_request");
        assert_eq!(BridgeError::invalid_space_id("space_id").code(), "invalid_space_id");
        assert_eq!(BridgeError::activity_null().code(), "activity_null");
        assert_eq!(BridgeError::Timeout("initialize".into()).code(), "timeout");
        assert_eq!(BridgeError::Unsupported("native_feed".into()).code(), "unsupported_type");
        assert_eq!(BridgeError::Internal("boom".into()).code(), "exception");
    }

    #[test]
    fn test_sdk_error_code_is_numeric_string() {
        let err = BridgeError::Sdk {
            code: -3,
            message: "no fill".into(),
        };
        assert_eq!(err.code(), "-3");
        assert_eq!(err.message(), "no fill");
    }
}
