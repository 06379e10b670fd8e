//! HTTP transport implementation for the hostlink client

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use hostlink_json_rpc::JsonRpcRequest;

use crate::config::{HttpConfig, parse_http_url};
use crate::correlation::{Correlator, DispatchOutcome};
use crate::error::{ClientError, ClientResult, TransportError};
use crate::transport::{Transport, TransportType, sse};

/// HTTP transport: one POST per call, notifications over an optional SSE stream
pub struct HttpTransport {
    /// HTTP client
    client: Client,
    /// RPC endpoint URL
    endpoint: Url,
    /// SSE endpoint for host notifications
    events_endpoint: Option<Url>,
    reconnect_delay: Duration,
    correlator: Arc<Correlator>,
    events_connected: Arc<AtomicBool>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl HttpTransport {
    /// Create a new HTTP transport. Does not touch the network.
    pub fn new(config: &HttpConfig) -> ClientResult<Self> {
        let endpoint = parse_http_url("endpoint", &config.endpoint)?;
        let events_endpoint = config
            .events_endpoint
            .as_deref()
            .map(|raw| parse_http_url("events_endpoint", raw))
            .transpose()?;

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.as_str())
            .default_headers(build_headers(config)?)
            .build()
            .map_err(|e| TransportError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::with_client(client, endpoint, events_endpoint, config.reconnect_delay))
    }

    /// Create HTTP transport with custom client
    pub fn with_client(
        client: Client,
        endpoint: Url,
        events_endpoint: Option<Url>,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            client,
            endpoint,
            events_endpoint,
            reconnect_delay,
            correlator: Correlator::new(),
            events_connected: Arc::new(AtomicBool::new(false)),
            listener: Mutex::new(None),
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Whether the SSE notification stream is currently open
    pub fn events_connected(&self) -> bool {
        self.events_connected.load(Ordering::SeqCst)
    }

    /// POST one request and return the parsed body
    async fn exchange(&self, request: &JsonRpcRequest) -> ClientResult<Value> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(ACCEPT, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    TransportError::ConnectionFailed(e.to_string())
                } else {
                    TransportError::Http(format!("Failed to send request: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Http(format!("Failed to read response body: {}", e)))?;

        match serde_json::from_slice::<Value>(&body) {
            Ok(json) if status.is_success() => Ok(json),
            // Error statuses carrying a JSON-RPC error body are still answers
            Ok(json) if json.get("error").is_some() => Ok(json),
            Err(e) if status.is_success() => Err(ClientError::InvalidResponse(format!(
                "Response body is not JSON: {}",
                e
            ))),
            _ => Err(TransportError::Http(format!(
                "HTTP error {}: {}",
                status,
                String::from_utf8_lossy(&body)
            ))
            .into()),
        }
    }
}

fn build_headers(config: &HttpConfig) -> ClientResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ClientError::config(format!("Invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ClientError::config(format!("Invalid value for header {}: {}", name, e)))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

#[async_trait]
impl Transport for HttpTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Http
    }

    fn is_connected(&self) -> bool {
        !self.correlator.is_disposed()
    }

    async fn initialize(&self) {
        if self.correlator.is_disposed() {
            warn!("HTTP transport already disposed; not starting event listener");
            return;
        }

        let Some(url) = self.events_endpoint.clone() else {
            debug!(
                endpoint = %self.endpoint,
                "No events endpoint configured; notifications disabled"
            );
            return;
        };

        let mut listener = self.listener.lock();
        if listener.is_some() {
            return;
        }

        info!(url = %url, "Starting SSE event listener");
        *listener = Some(tokio::spawn(sse::run_event_stream(
            self.client.clone(),
            url,
            Arc::downgrade(&self.correlator),
            Arc::clone(&self.events_connected),
            self.reconnect_delay,
        )));
    }

    async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> ClientResult<Value> {
        let (request, pending) = self.correlator.register(method, params, timeout)?;
        let id = request.id.clone();
        debug!(method = %method, id = %id, endpoint = %self.endpoint, "Sending HTTP request");

        let settled = pending.wait();
        tokio::pin!(settled);

        tokio::select! {
            // Timer or dispose won; the in-flight exchange is dropped
            outcome = &mut settled => return outcome,
            exchange = self.exchange(&request) => {
                match exchange {
                    Ok(body) => {
                        if let DispatchOutcome::Uncorrelated(error) =
                            self.correlator.dispatch(body)
                        {
                            self.correlator.complete(&id, Err(error));
                        }
                    }
                    Err(e) => {
                        warn!(method = %method, id = %id, error = %e, "HTTP exchange failed");
                        self.correlator.fail(&id, e);
                    }
                }
                // No-op when the body already settled the call
                self.correlator.fail(
                    &id,
                    ClientError::InvalidResponse(format!("response did not settle request {}", id)),
                );
            }
        }

        settled.await
    }

    fn dispose(&self) {
        self.correlator.dispose();
        if let Some(listener) = self.listener.lock().take() {
            listener.abort();
        }
        self.events_connected.store(false, Ordering::SeqCst);
        debug!(endpoint = %self.endpoint, "HTTP transport disposed");
    }

    fn correlator(&self) -> &Arc<Correlator> {
        &self.correlator
    }
}

impl Drop for HttpTransport {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.abort();
        }
    }
}
