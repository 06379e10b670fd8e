//! Host message channels for the embedded transport
//!
//! A [`HostChannel`] is the messaging handle a native host injects into the
//! UI process. [`MessagePort`] is an in-process implementation over tokio mpsc
//! channels, and [`LoggingChannel`] stands in when no host is present.

use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use hostlink_json_rpc::{
    JsonRpcError, JsonRpcErrorObject, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    RequestId,
};

use crate::error::TransportError;

/// Messaging handle supplied by the native host
pub trait HostChannel: Send + Sync {
    /// Hand one structured message to the host
    fn post_message(&self, message: Value) -> Result<(), TransportError>;

    /// Receive every message the host posts from now on.
    ///
    /// A later subscription replaces the earlier one.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<Value>;

    /// True for stand-ins that never deliver anything
    fn is_mock(&self) -> bool {
        false
    }
}

type SubscriberSlot = Arc<Mutex<Option<mpsc::UnboundedSender<Value>>>>;

/// Client side of an in-process host channel
#[derive(Debug, Clone)]
pub struct MessagePort {
    outbound: mpsc::UnboundedSender<Value>,
    subscriber: SubscriberSlot,
}

impl MessagePort {
    /// Create a connected client port and host endpoint
    pub fn pair() -> (Self, HostEndpoint) {
        let (outbound, requests) = mpsc::unbounded_channel();
        let subscriber: SubscriberSlot = Arc::new(Mutex::new(None));

        let port = Self {
            outbound,
            subscriber: Arc::clone(&subscriber),
        };
        let endpoint = HostEndpoint {
            requests,
            poster: HostPoster { subscriber },
        };
        (port, endpoint)
    }
}

impl HostChannel for MessagePort {
    fn post_message(&self, message: Value) -> Result<(), TransportError> {
        self.outbound
            .send(message)
            .map_err(|_| TransportError::Channel("host endpoint closed".to_string()))
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<Value> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.subscriber.lock() = Some(tx);
        rx
    }
}

/// Native side of a [`MessagePort`]
#[derive(Debug)]
pub struct HostEndpoint {
    requests: mpsc::UnboundedReceiver<Value>,
    poster: HostPoster,
}

impl HostEndpoint {
    /// Next raw message posted by the client
    pub async fn recv(&mut self) -> Option<Value> {
        self.requests.recv().await
    }

    /// Next message that parses as a request; anything else is skipped
    pub async fn next_request(&mut self) -> Option<JsonRpcRequest> {
        while let Some(message) = self.requests.recv().await {
            match serde_json::from_value::<JsonRpcRequest>(message) {
                Ok(request) => return Some(request),
                Err(e) => debug!(error = %e, "Host endpoint skipping non-request message"),
            }
        }
        None
    }

    /// Cloneable handle for posting to the client from other tasks
    pub fn poster(&self) -> HostPoster {
        self.poster.clone()
    }

    pub fn respond(&self, id: RequestId, result: Value) -> bool {
        self.poster.respond(id, result)
    }

    pub fn respond_error(&self, id: Option<RequestId>, error: JsonRpcErrorObject) -> bool {
        self.poster.respond_error(id, error)
    }

    pub fn notify(&self, method: &str, params: Option<Value>) -> bool {
        self.poster.notify(method, params)
    }

    pub fn post(&self, message: Value) -> bool {
        self.poster.post(message)
    }
}

/// Posts host-side messages to whichever client transport is subscribed
#[derive(Debug, Clone)]
pub struct HostPoster {
    subscriber: SubscriberSlot,
}

impl HostPoster {
    /// Deliver a raw message. Returns `false` when no client is listening.
    pub fn post(&self, message: Value) -> bool {
        let delivered = match self.subscriber.lock().as_ref() {
            Some(tx) => tx.send(message).is_ok(),
            None => false,
        };
        if !delivered {
            debug!("No client subscribed; host message dropped");
        }
        delivered
    }

    pub fn respond(&self, id: RequestId, result: Value) -> bool {
        self.post(to_value(&JsonRpcResponse::success(id, result)))
    }

    pub fn respond_error(&self, id: Option<RequestId>, error: JsonRpcErrorObject) -> bool {
        self.post(to_value(&JsonRpcError::new(id, error)))
    }

    pub fn notify(&self, method: &str, params: Option<Value>) -> bool {
        self.post(to_value(&JsonRpcNotification::new(method, params)))
    }
}

fn to_value<T: serde::Serialize>(message: &T) -> Value {
    serde_json::to_value(message).unwrap_or(Value::Null)
}

/// Stand-in for UI development outside the native host.
///
/// Every posted message is logged and dropped; nothing is ever delivered back.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingChannel;

impl HostChannel for LoggingChannel {
    fn post_message(&self, message: Value) -> Result<(), TransportError> {
        info!(message = %message, "No host attached; message not delivered");
        Ok(())
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<Value> {
        // Sender dropped immediately: the stream is empty and already closed
        let (_tx, rx) = mpsc::unbounded_channel();
        rx
    }

    fn is_mock(&self) -> bool {
        true
    }
}
