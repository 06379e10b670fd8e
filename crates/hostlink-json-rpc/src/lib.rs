//! # JSON-RPC 2.0 Wire Types
//!
//! The protocol vocabulary shared by every hostlink transport: requests,
//! responses, error responses, notifications and the structural classifier
//! applied to every inbound message before it reaches correlation state.
//!
//! ## Features
//! - JSON-RPC 2.0 message shapes with the mandatory `"jsonrpc": "2.0"` marker
//! - Standard error codes plus the client-detected timeout/unavailable codes
//! - [`JsonRpcMessage::classify`] for rejecting malformed inbound input
//!
//! This crate contains no transport or async code.

pub mod error;
pub mod message;
pub mod notification;
pub mod request;
pub mod response;
pub mod types;

pub mod prelude;

// Re-export main types
pub use error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject};
pub use message::{JsonRpcMessage, MalformedMessage};
pub use notification::JsonRpcNotification;
pub use request::JsonRpcRequest;
pub use response::JsonRpcResponse;
pub use types::{JsonRpcVersion, RequestId};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes and the client-detected extensions
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    // Client-detected, inside the implementation-defined server range
    pub const TIMEOUT: i64 = -32001;
    pub const TRANSPORT_UNAVAILABLE: i64 = -32002;
}
