//! # Hostlink Client Library
//!
//! A transport-agnostic JSON-RPC 2.0 client bridging a web-rendered UI to its
//! native host process. Many concurrent calls are multiplexed over one
//! unordered channel, and host-pushed notifications fan out to independently
//! registered handlers.
//!
//! ## Features
//!
//! - **Two transports, one interface**: an embedded message channel injected by
//!   the host, or a plain HTTP endpoint with an optional SSE notification stream
//! - **Correlation**: sequential ids, per-call timeouts, exactly-once settlement
//! - **Notifications**: multiple handlers per method, removed by token
//! - **Lifecycle**: lazy transport construction, explicit `dispose` and `reset`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hostlink_client::RpcClient;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RpcClient::builder()
//!         .with_endpoint("http://127.0.0.1:8600/rpc")
//!         .build()?;
//!     client.initialize().await;
//!
//!     let theme = client.call("settings.get", Some(json!({"key": "theme"}))).await?;
//!     println!("theme: {}", theme);
//!
//!     let _progress = client.on("gallery.scanProgress", |params| {
//!         println!("scan progress: {}", params);
//!     })?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Embedded hosts
//!
//! A native host hands the client a [`transport::HostChannel`]. For in-process
//! hosts and tests, [`transport::MessagePort::pair`] provides both ends:
//!
//! ```rust,no_run
//! use hostlink_client::{transport::MessagePort, RpcClient};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let (port, mut host) = MessagePort::pair();
//! let client = RpcClient::builder().with_host_channel(Arc::new(port)).build()?;
//! client.initialize().await;
//!
//! tokio::spawn(async move {
//!     while let Some(request) = host.next_request().await {
//!         host.respond(request.id, serde_json::json!({"ok": true}));
//!     }
//! });
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod correlation;
pub mod environment;
pub mod error;
pub mod lifecycle;
pub mod transport;

pub mod prelude;

// Re-export main types
pub use client::{RpcClient, RpcClientBuilder};
pub use config::{ClientConfig, EmbeddedConfig, HttpConfig, TimeoutConfig, TransportPreference};
pub use correlation::{Correlator, HandlerCount, Subscription, SubscriptionId};
pub use environment::{EnvironmentResolver, RuntimeEnvironment};
pub use error::{ClientError, ClientResult, TransportError};
pub use lifecycle::TransportManager;
pub use transport::{SharedTransport, Transport, TransportStats, TransportType};

// Re-export the wire types for convenience
pub use hostlink_json_rpc;

/// Client library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
