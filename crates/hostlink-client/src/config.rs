//! Configuration types for the hostlink client

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use crate::error::{ClientError, ClientResult};

/// Main client configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Which transport to build; `auto` probes for a host channel
    pub transport: TransportPreference,

    /// Timeout configurations
    pub timeouts: TimeoutConfig,

    /// HTTP transport configuration
    pub http: HttpConfig,

    /// Embedded-channel transport configuration
    pub embedded: EmbeddedConfig,
}

/// Transport selection override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportPreference {
    /// Embedded when a host channel was injected, HTTP otherwise
    #[default]
    Auto,
    /// Always the embedded-channel transport
    Embedded,
    /// Always the HTTP transport
    Http,
}

/// Timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Default deadline for a single call
    #[serde(with = "duration_serde")]
    pub request: Duration,
}

/// HTTP transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// RPC endpoint requests are POSTed to
    pub endpoint: String,

    /// Server-Sent Events endpoint for host notifications (none disables push)
    pub events_endpoint: Option<String>,

    /// User agent string
    pub user_agent: String,

    /// Custom headers to include in requests
    pub headers: HashMap<String, String>,

    /// TCP connect timeout
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Pause before re-opening a dropped event stream
    #[serde(with = "duration_serde")]
    pub reconnect_delay: Duration,
}

/// Embedded-channel transport configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EmbeddedConfig {
    /// Without a host channel, log outbound messages instead of failing calls.
    /// Intended for UI development outside the native host.
    pub mock_when_unhosted: bool,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request: Duration::from_millis(10_000),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8600/rpc".to_string(),
            events_endpoint: None,
            user_agent: format!("hostlink-client/{}", env!("CARGO_PKG_VERSION")),
            headers: HashMap::new(),
            connect_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(2),
        }
    }
}

impl ClientConfig {
    /// Configuration targeting an HTTP endpoint
    pub fn http(endpoint: impl Into<String>) -> Self {
        Self {
            transport: TransportPreference::Http,
            http: HttpConfig {
                endpoint: endpoint.into(),
                ..HttpConfig::default()
            },
            ..Self::default()
        }
    }

    /// Set the default request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.request = timeout;
        self
    }

    /// Reject configurations that could never produce a working transport
    pub fn validate(&self) -> ClientResult<()> {
        if self.timeouts.request.is_zero() {
            return Err(ClientError::config("request timeout must be non-zero"));
        }

        parse_http_url("endpoint", &self.http.endpoint)?;
        if let Some(events) = &self.http.events_endpoint {
            parse_http_url("events_endpoint", events)?;
        }

        Ok(())
    }
}

/// Parse and check an http(s) URL
pub(crate) fn parse_http_url(field: &str, raw: &str) -> ClientResult<Url> {
    let url = Url::parse(raw)
        .map_err(|e| ClientError::config(format!("Invalid {} URL '{}': {}", field, raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ClientError::config(format!(
            "Invalid scheme for {}: {}",
            field,
            url.scheme()
        )));
    }

    Ok(url)
}

// Helper module for Duration serialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
