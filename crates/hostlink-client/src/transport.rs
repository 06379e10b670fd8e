//! Transport layer for the hostlink client

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::correlation::{Correlator, HandlerCount, NotificationHandler, Subscription};
use crate::error::ClientResult;

pub mod channel;
pub mod embedded;
pub mod http;
pub mod sse;

// Re-export transport implementations
pub use channel::{HostChannel, HostEndpoint, HostPoster, LoggingChannel, MessagePort};
pub use embedded::EmbeddedTransport;
pub use http::HttpTransport;

/// Transport type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    /// Message channel injected by the native host
    Embedded,
    /// Plain HTTP endpoint with optional SSE notifications
    Http,
}

impl std::fmt::Display for TransportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportType::Embedded => write!(f, "embedded"),
            TransportType::Http => write!(f, "http"),
        }
    }
}

/// Point-in-time view of a transport, derived on demand
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportStats {
    pub pending_requests: usize,
    pub event_handlers: Vec<HandlerCount>,
    pub is_connected: bool,
    pub transport_type: TransportType,
}

/// Uniform contract over every concrete channel.
///
/// All methods take `&self`; concurrent calls are serialized only inside the
/// correlator's map operations, never behind a transport-wide lock.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Get transport type
    fn transport_type(&self) -> TransportType;

    /// Whether the underlying channel can currently carry traffic
    fn is_connected(&self) -> bool;

    /// Start background listeners. Idempotent; failures are logged, not returned.
    async fn initialize(&self);

    /// Send a request and wait for its settlement
    async fn call(&self, method: &str, params: Option<Value>, timeout: Duration)
        -> ClientResult<Value>;

    /// Reject pending calls, clear handlers and stop listeners. Idempotent.
    fn dispose(&self);

    /// Correlation state backing this transport
    fn correlator(&self) -> &Arc<Correlator>;

    /// Register a notification handler. Fails once the transport is disposed.
    fn on(&self, method: &str, handler: NotificationHandler) -> ClientResult<Subscription> {
        self.correlator().on(method, handler)
    }

    /// Remove a notification handler
    fn off(&self, subscription: &Subscription) -> bool {
        self.correlator().off(subscription)
    }

    /// Get transport statistics
    fn stats(&self) -> TransportStats {
        let correlator = self.correlator();
        TransportStats {
            pending_requests: correlator.pending_count(),
            event_handlers: correlator.handler_counts(),
            is_connected: self.is_connected(),
            transport_type: self.transport_type(),
        }
    }
}

/// Type alias for a shared transport
pub type SharedTransport = Arc<dyn Transport>;

/// Transport factory for creating transport instances
pub struct TransportFactory;

impl TransportFactory {
    /// Create a specific transport type.
    ///
    /// Construction never touches the network; channel setup happens in
    /// [`Transport::initialize`].
    pub fn create(
        transport_type: TransportType,
        config: &ClientConfig,
        host_channel: Option<Arc<dyn HostChannel>>,
    ) -> ClientResult<SharedTransport> {
        match transport_type {
            TransportType::Http => Ok(Arc::new(HttpTransport::new(&config.http)?)),
            TransportType::Embedded => {
                let channel = host_channel.or_else(|| {
                    config
                        .embedded
                        .mock_when_unhosted
                        .then(|| Arc::new(LoggingChannel) as Arc<dyn HostChannel>)
                });
                Ok(Arc::new(EmbeddedTransport::new(channel)))
            }
        }
    }
}
