//! Embedded-channel transport

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::correlation::Correlator;
use crate::error::{ClientError, ClientResult};
use crate::transport::{HostChannel, Transport, TransportType};

/// Transport over a host-injected message channel
pub struct EmbeddedTransport {
    channel: Option<Arc<dyn HostChannel>>,
    correlator: Arc<Correlator>,
    /// Task pumping inbound host messages into the correlator
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl EmbeddedTransport {
    /// Create a transport; `None` means no host is attached and every call
    /// fails as unavailable
    pub fn new(channel: Option<Arc<dyn HostChannel>>) -> Self {
        Self {
            channel,
            correlator: Correlator::new(),
            listener: Mutex::new(None),
        }
    }

    /// Whether the channel is the logging stand-in
    pub fn is_mock(&self) -> bool {
        self.channel.as_ref().is_some_and(|c| c.is_mock())
    }

    fn channel(&self) -> ClientResult<&Arc<dyn HostChannel>> {
        if self.correlator.is_disposed() {
            return Err(ClientError::unavailable("transport disposed"));
        }
        self.channel
            .as_ref()
            .ok_or_else(|| ClientError::unavailable("no host channel attached"))
    }

    /// Subscribe to the host once and spawn the inbound pump
    fn ensure_listener(&self, channel: &Arc<dyn HostChannel>) {
        let mut listener = self.listener.lock();
        if listener.is_some() || self.correlator.is_disposed() {
            return;
        }

        let mut inbound = channel.subscribe();
        let correlator = Arc::clone(&self.correlator);
        *listener = Some(tokio::spawn(async move {
            while let Some(message) = inbound.recv().await {
                correlator.dispatch(message);
            }
            debug!("Host channel closed, inbound pump stopped");
        }));
    }
}

#[async_trait]
impl Transport for EmbeddedTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Embedded
    }

    fn is_connected(&self) -> bool {
        self.channel.is_some() && !self.is_mock() && !self.correlator.is_disposed()
    }

    async fn initialize(&self) {
        match self.channel() {
            Ok(channel) => {
                self.ensure_listener(channel);
                if self.is_mock() {
                    info!("Embedded transport running without a host; messages are logged only");
                } else {
                    info!("Embedded transport listening to host channel");
                }
            }
            Err(e) => warn!(error = %e, "Embedded transport cannot initialize"),
        }
    }

    async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> ClientResult<Value> {
        let channel = self.channel()?;
        self.ensure_listener(channel);

        let (request, pending) = self.correlator.register(method, params, timeout)?;
        debug!(method = %method, id = %request.id, "Posting request to host");

        if let Err(e) = channel.post_message(request.to_value()) {
            warn!(method = %method, id = %request.id, error = %e, "Host channel rejected request");
            self.correlator.fail(&request.id, e.into());
        }

        pending.wait().await
    }

    fn dispose(&self) {
        self.correlator.dispose();
        if let Some(listener) = self.listener.lock().take() {
            listener.abort();
        }
        debug!("Embedded transport disposed");
    }

    fn correlator(&self) -> &Arc<Correlator> {
        &self.correlator
    }
}

impl Drop for EmbeddedTransport {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.abort();
        }
    }
}
