//! Lazy construction and teardown of the active transport

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::environment::EnvironmentResolver;
use crate::error::ClientResult;
use crate::transport::{HostChannel, SharedTransport, TransportFactory, TransportType};

/// Owns at most one live transport at a time
pub struct TransportManager {
    config: ClientConfig,
    resolver: EnvironmentResolver,
    active: Mutex<Option<SharedTransport>>,
}

impl TransportManager {
    pub fn new(config: ClientConfig, host_channel: Option<Arc<dyn HostChannel>>) -> Self {
        Self {
            config,
            resolver: EnvironmentResolver::new(host_channel),
            active: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The cached transport, building one on first use.
    ///
    /// Construction errors are returned and not cached; the next access tries
    /// again.
    pub fn get_transport(&self) -> ClientResult<SharedTransport> {
        let mut active = self.active.lock();
        if let Some(transport) = active.as_ref() {
            return Ok(Arc::clone(transport));
        }

        let transport_type = self.resolver.transport_type(self.config.transport);
        let transport =
            TransportFactory::create(transport_type, &self.config, self.resolver.host_channel())?;

        info!(transport = %transport_type, "Created transport");
        *active = Some(Arc::clone(&transport));
        Ok(transport)
    }

    /// Type of the cached transport, without building one
    pub fn transport_type(&self) -> Option<TransportType> {
        self.active.lock().as_ref().map(|t| t.transport_type())
    }

    /// The cached transport, without building one
    pub fn current(&self) -> Option<SharedTransport> {
        self.active.lock().clone()
    }

    /// Dispose the cached transport and forget it
    pub fn reset(&self) {
        let previous = self.active.lock().take();
        if let Some(transport) = previous {
            debug!(transport = %transport.transport_type(), "Resetting transport");
            transport.dispose();
        }
    }
}

impl Drop for TransportManager {
    fn drop(&mut self) {
        if let Some(transport) = self.active.get_mut().take() {
            transport.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportPreference;
    use crate::transport::MessagePort;

    #[tokio::test]
    async fn test_transport_is_cached() {
        let manager = TransportManager::new(ClientConfig::default(), None);
        assert!(manager.transport_type().is_none());
        assert!(manager.current().is_none());

        let first = manager.get_transport().unwrap();
        let second = manager.get_transport().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.transport_type(), Some(TransportType::Http));
    }

    #[tokio::test]
    async fn test_host_channel_selects_embedded() {
        let (port, _host) = MessagePort::pair();
        let manager = TransportManager::new(ClientConfig::default(), Some(Arc::new(port)));

        let transport = manager.get_transport().unwrap();
        assert_eq!(transport.transport_type(), TransportType::Embedded);
        assert!(transport.is_connected());
    }

    #[tokio::test]
    async fn test_reset_disposes_and_rebuilds() {
        let manager = TransportManager::new(ClientConfig::default(), None);
        let first = manager.get_transport().unwrap();

        manager.reset();
        assert!(!first.is_connected());
        assert!(manager.current().is_none());

        let second = manager.get_transport().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.is_connected());

        manager.reset();
        manager.reset();
    }

    #[test]
    fn test_construction_errors_are_not_cached() {
        let mut config = ClientConfig::http("not a url");
        config.transport = TransportPreference::Http;
        let manager = TransportManager::new(config, None);

        assert!(manager.get_transport().is_err());
        assert!(manager.current().is_none());
    }
}
