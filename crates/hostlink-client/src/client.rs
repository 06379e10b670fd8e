//! Main hostlink client implementation

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{ClientConfig, TransportPreference};
use crate::correlation::{NotificationHandler, Subscription};
use crate::error::ClientResult;
use crate::lifecycle::TransportManager;
use crate::transport::{HostChannel, TransportStats, TransportType};

/// Transport-independent entry point for feature code.
///
/// Cloning is cheap and every clone shares the same transport. The transport
/// is built on first use and disposed when the last clone is dropped.
#[derive(Clone)]
pub struct RpcClient {
    manager: Arc<TransportManager>,
}

impl RpcClient {
    /// Create a client that auto-detects its transport from `config`
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        RpcClientBuilder::new().with_config(config).build()
    }

    /// Create a builder
    pub fn builder() -> RpcClientBuilder {
        RpcClientBuilder::new()
    }

    pub fn config(&self) -> &ClientConfig {
        self.manager.config()
    }

    /// Call `method` with the configured default timeout
    pub async fn call(&self, method: &str, params: Option<Value>) -> ClientResult<Value> {
        self.call_with_timeout(method, params, self.config().timeouts.request)
            .await
    }

    /// Call `method`, rejecting with a timeout error after `timeout`
    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> ClientResult<Value> {
        let transport = self.manager.get_transport()?;
        debug!(method = %method, transport = %transport.transport_type(), "Calling host method");
        transport.call(method, params, timeout).await
    }

    /// Typed call: serialize `params`, deserialize the result
    pub async fn request<P, R>(&self, method: &str, params: &P) -> ClientResult<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let params = match serde_json::to_value(params)? {
            Value::Null => None,
            value => Some(value),
        };
        let result = self.call(method, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Register a handler for host notifications named `method`
    pub fn on<F>(&self, method: &str, handler: F) -> ClientResult<Subscription>
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        let handler: NotificationHandler = Arc::new(handler);
        self.manager.get_transport()?.on(method, handler)
    }

    /// Remove a handler registered with [`RpcClient::on`]
    pub fn off(&self, subscription: &Subscription) -> bool {
        self.manager
            .current()
            .is_some_and(|transport| transport.off(subscription))
    }

    /// Build the transport (if needed) and start its listeners.
    /// Failures are logged rather than returned.
    pub async fn initialize(&self) {
        match self.manager.get_transport() {
            Ok(transport) => transport.initialize().await,
            Err(e) => warn!(error = %e, "Failed to initialize transport"),
        }
    }

    /// Dispose the active transport, if one was built
    pub fn dispose(&self) {
        if let Some(transport) = self.manager.current() {
            transport.dispose();
        }
    }

    pub fn stats(&self) -> ClientResult<TransportStats> {
        Ok(self.manager.get_transport()?.stats())
    }

    pub fn is_connected(&self) -> bool {
        match self.manager.get_transport() {
            Ok(transport) => transport.is_connected(),
            Err(e) => {
                debug!(error = %e, "No transport available");
                false
            }
        }
    }

    /// Type of the active transport; never builds one
    pub fn transport_type(&self) -> Option<TransportType> {
        self.manager.transport_type()
    }

    /// Dispose the active transport so the next use builds a fresh one
    pub fn reset(&self) {
        self.manager.reset();
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("transport_type", &self.transport_type())
            .finish()
    }
}

/// Builder for creating hostlink clients
#[derive(Default)]
pub struct RpcClientBuilder {
    config: ClientConfig,
    host_channel: Option<Arc<dyn HostChannel>>,
}

impl RpcClientBuilder {
    /// Create a new client builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set configuration
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach the host-injected message channel
    pub fn with_host_channel(mut self, channel: Arc<dyn HostChannel>) -> Self {
        self.host_channel = Some(channel);
        self
    }

    /// Force a transport instead of auto-detecting
    pub fn with_transport(mut self, preference: TransportPreference) -> Self {
        self.config.transport = preference;
        self
    }

    /// Set the HTTP RPC endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.http.endpoint = endpoint.into();
        self
    }

    /// Set the SSE endpoint for host notifications over HTTP
    pub fn with_events_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.http.events_endpoint = Some(endpoint.into());
        self
    }

    /// Set the default request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeouts.request = timeout;
        self
    }

    /// Validate the configuration and build the client
    pub fn build(self) -> ClientResult<RpcClient> {
        self.config.validate()?;
        Ok(RpcClient {
            manager: Arc::new(TransportManager::new(self.config, self.host_channel)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;

    #[tokio::test]
    async fn test_client_builder() {
        let client = RpcClient::builder()
            .with_endpoint("http://localhost:8080/rpc")
            .with_request_timeout(Duration::from_secs(3))
            .build()
            .unwrap();

        assert!(client.transport_type().is_none());
        assert_eq!(client.config().timeouts.request, Duration::from_secs(3));

        // is_connected builds the transport lazily
        assert!(client.is_connected());
        assert_eq!(client.transport_type(), Some(TransportType::Http));
    }

    #[test]
    fn test_builder_validates_config() {
        let result = RpcClient::builder().with_endpoint("ftp://host/rpc").build();
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[test]
    fn test_dispose_does_not_build_transport() {
        let client = RpcClient::new(ClientConfig::default()).unwrap();

        client.dispose();
        assert!(client.transport_type().is_none());
    }

    #[tokio::test]
    async fn test_unhosted_embedded_is_unavailable() {
        let client = RpcClient::builder()
            .with_transport(TransportPreference::Embedded)
            .build()
            .unwrap();

        let err = client.call("settings.get", None).await.unwrap_err();
        assert!(err.is_unavailable());
        assert!(!client.is_connected());
        assert_eq!(client.stats().unwrap().pending_requests, 0);
    }
}
