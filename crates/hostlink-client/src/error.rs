//! Error types for hostlink client operations

use hostlink_json_rpc::{JsonRpcErrorObject, error_codes};
use serde_json::{Value, json};
use thiserror::Error;

/// Result type for hostlink client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Every way a `call()` can settle unsuccessfully.
///
/// Each variant maps onto a JSON-RPC error code via [`ClientError::code`], so
/// callers can branch on the structured `{code, message, data}` shape returned
/// by [`ClientError::to_error_object`] regardless of which transport is active.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The host answered with a JSON-RPC error object, carried verbatim
    #[error("Server error (code {code}): {message}")]
    Server {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    /// No response arrived before the call's deadline
    #[error("Request '{method}' timed out after {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },

    /// The underlying channel is absent or the transport was disposed
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    /// The transport was disposed while the call was in flight
    #[error("Transport disposed")]
    Disposed,

    /// Channel-level I/O failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The peer answered with something that does not settle the call
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Typed params/result (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Rejected configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Transport-specific errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP transport error: {0}")]
    Http(String),

    #[error("SSE transport error: {0}")]
    Sse(String),

    #[error("Host channel error: {0}")]
    Channel(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
}

impl ClientError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an unavailable error
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::TransportUnavailable(reason.into())
    }

    /// The JSON-RPC error code for this failure
    pub fn code(&self) -> i64 {
        match self {
            Self::Server { code, .. } => *code,
            Self::Timeout { .. } => error_codes::TIMEOUT,
            Self::TransportUnavailable(_) => error_codes::TRANSPORT_UNAVAILABLE,
            Self::Transport(TransportError::ConnectionFailed(_)) => {
                error_codes::TRANSPORT_UNAVAILABLE
            }
            Self::Json(_) => error_codes::PARSE_ERROR,
            Self::Disposed
            | Self::Transport(_)
            | Self::InvalidResponse(_)
            | Self::Config(_) => error_codes::INTERNAL_ERROR,
        }
    }

    /// Diagnostic data attached to the failure, if any
    pub fn data(&self) -> Option<Value> {
        match self {
            Self::Server { data, .. } => data.clone(),
            Self::Timeout { method, timeout_ms } => Some(json!({
                "method": method,
                "timeout": timeout_ms,
            })),
            _ => None,
        }
    }

    /// The structured `{code, message, data?}` form
    pub fn to_error_object(&self) -> JsonRpcErrorObject {
        let message = match self {
            Self::Server { message, .. } => message.clone(),
            other => other.to_string(),
        };
        JsonRpcErrorObject {
            code: self.code(),
            message,
            data: self.data(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_unavailable(&self) -> bool {
        self.code() == error_codes::TRANSPORT_UNAVAILABLE
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed)
    }
}

impl From<JsonRpcErrorObject> for ClientError {
    fn from(error: JsonRpcErrorObject) -> Self {
        Self::Server {
            code: error.code,
            message: error.message,
            data: error.data,
        }
    }
}
