//! # Hostlink Client Prelude
//!
//! Convenient re-exports of the most commonly used client types.
//!
//! ```rust
//! use hostlink_client::prelude::*;
//! ```

// Core client types
pub use crate::client::{RpcClient, RpcClientBuilder};
pub use crate::config::{ClientConfig, TransportPreference};
pub use crate::correlation::Subscription;
pub use crate::error::{ClientError, ClientResult};

// Transport types
pub use crate::transport::{HostChannel, MessagePort, Transport, TransportStats, TransportType};

// Wire types
pub use hostlink_json_rpc::prelude::*;

// Standard library types commonly used with the client
pub use std::time::Duration;
