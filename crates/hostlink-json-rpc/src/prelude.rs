//! # JSON-RPC Prelude
//!
//! Convenient re-exports of the wire types.
//!
//! ```rust
//! use hostlink_json_rpc::prelude::*;
//! ```

pub use crate::error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject};
pub use crate::message::{JsonRpcMessage, MalformedMessage};
pub use crate::notification::JsonRpcNotification;
pub use crate::request::JsonRpcRequest;
pub use crate::response::JsonRpcResponse;
pub use crate::types::{JsonRpcVersion, RequestId};

// Standard error codes
pub use crate::error_codes::*;
