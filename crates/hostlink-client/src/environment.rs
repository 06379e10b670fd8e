//! Runtime environment detection

use std::sync::{Arc, OnceLock};
use tracing::debug;

use crate::config::TransportPreference;
use crate::transport::{HostChannel, TransportType};

/// Where the UI is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEnvironment {
    /// Inside the native host, which injected a message channel
    Embedded,
    /// Anywhere else (a plain browser, tests, a dev server)
    Standalone,
}

/// Decides once which environment applies, then answers from memory
pub struct EnvironmentResolver {
    host_channel: Option<Arc<dyn HostChannel>>,
    resolved: OnceLock<RuntimeEnvironment>,
}

impl EnvironmentResolver {
    pub fn new(host_channel: Option<Arc<dyn HostChannel>>) -> Self {
        Self {
            host_channel,
            resolved: OnceLock::new(),
        }
    }

    /// The single capability probe: was a host channel injected?
    pub fn resolve(&self) -> RuntimeEnvironment {
        *self.resolved.get_or_init(|| {
            let environment = if self.host_channel.is_some() {
                RuntimeEnvironment::Embedded
            } else {
                RuntimeEnvironment::Standalone
            };
            debug!(?environment, "Resolved runtime environment");
            environment
        })
    }

    /// Transport to build for `preference`
    pub fn transport_type(&self, preference: TransportPreference) -> TransportType {
        match preference {
            TransportPreference::Embedded => TransportType::Embedded,
            TransportPreference::Http => TransportType::Http,
            TransportPreference::Auto => match self.resolve() {
                RuntimeEnvironment::Embedded => TransportType::Embedded,
                RuntimeEnvironment::Standalone => TransportType::Http,
            },
        }
    }

    pub fn host_channel(&self) -> Option<Arc<dyn HostChannel>> {
        self.host_channel.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MessagePort;

    #[test]
    fn test_probe_detects_host_channel() {
        let (port, _host) = MessagePort::pair();
        let hosted = EnvironmentResolver::new(Some(Arc::new(port)));
        assert_eq!(hosted.resolve(), RuntimeEnvironment::Embedded);
        assert_eq!(hosted.transport_type(TransportPreference::Auto), TransportType::Embedded);

        let standalone = EnvironmentResolver::new(None);
        assert_eq!(standalone.resolve(), RuntimeEnvironment::Standalone);
        assert_eq!(standalone.transport_type(TransportPreference::Auto), TransportType::Http);
    }

    #[test]
    fn test_preference_overrides_probe() {
        let standalone = EnvironmentResolver::new(None);
        assert_eq!(
            standalone.transport_type(TransportPreference::Embedded),
            TransportType::Embedded
        );

        let (port, _host) = MessagePort::pair();
        let hosted = EnvironmentResolver::new(Some(Arc::new(port)));
        assert_eq!(hosted.transport_type(TransportPreference::Http), TransportType::Http);
    }

    #[test]
    fn test_resolution_is_memoized() {
        let resolver = EnvironmentResolver::new(None);
        let first = resolver.resolve();
        assert_eq!(resolver.resolve(), first);
        assert!(resolver.resolved.get().is_some());
    }
}
