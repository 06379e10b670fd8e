//! Request/response correlation and notification fan-out
//!
//! A [`Correlator`] owns everything a transport needs to multiplex many calls
//! over one unordered channel: id assignment, the pending-call table with a
//! timer per entry, response matching, and the notification handler registry.
//! Both transports hold one correlator each and only differ in how bytes reach
//! the wire.
//!
//! Every pending entry is settled by whoever removes it from the table first.
//! A matching response, the entry's timer and [`Correlator::dispose`] all go
//! through that single removal, so a call can never be resolved twice.

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::{debug, trace, warn};

use hostlink_json_rpc::{JsonRpcErrorObject, JsonRpcMessage, JsonRpcRequest, RequestId};

use crate::error::{ClientError, ClientResult};

/// Callback invoked with the `params` of each matching notification
pub type NotificationHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// Subscription ids are unique across every correlator in the process
static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier of one registered handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Token returned by `on()`; pass it to `off()` to remove exactly that handler
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    method: String,
    id: SubscriptionId,
}

impl Subscription {
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

/// Registered handler count for one notification method
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerCount {
    pub method: String,
    pub handler_count: usize,
}

/// What happened to one inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// A pending call was settled
    Settled,
    /// A response for an id that is not (or no longer) pending
    Untracked(RequestId),
    /// A notification was handed to this many handlers
    Notified(usize),
    /// An error response whose id the peer could not determine
    Uncorrelated(JsonRpcErrorObject),
    /// Malformed input or a peer-initiated request, discarded
    Ignored,
}

struct PendingCall {
    sender: oneshot::Sender<ClientResult<Value>>,
    method: String,
    timeout: Duration,
    timer: AbortHandle,
}

/// Receiving half of a registered call
#[derive(Debug)]
pub struct PendingResponse {
    id: RequestId,
    receiver: oneshot::Receiver<ClientResult<Value>>,
}

impl PendingResponse {
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Wait until the call is settled by a response, its timer or disposal
    pub async fn wait(self) -> ClientResult<Value> {
        match self.receiver.await {
            Ok(outcome) => outcome,
            // Sender dropped without settling: the correlator itself went away
            Err(_) => Err(ClientError::Disposed),
        }
    }
}

/// Correlation state for one transport instance
pub struct Correlator {
    next_id: AtomicI64,
    pending: Mutex<HashMap<RequestId, PendingCall>>,
    handlers: Mutex<HashMap<String, Vec<(SubscriptionId, NotificationHandler)>>>,
    disposed: AtomicBool,
}

impl Correlator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicI64::new(1),
            pending: Mutex::new(HashMap::new()),
            handlers: Mutex::new(HashMap::new()),
            disposed: AtomicBool::new(false),
        })
    }

    /// Allocate an id, build the request and arm its timer.
    ///
    /// The returned request must be pushed onto the wire by the caller; if
    /// that fails, settle the entry with [`Correlator::fail`]. Must be called
    /// from within a tokio runtime.
    pub fn register(
        self: &Arc<Self>,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> ClientResult<(JsonRpcRequest, PendingResponse)> {
        let (id, receiver) = {
            let mut pending = self.pending.lock();
            // `dispose` flips the flag under this lock, so nothing lands after its drain
            if self.is_disposed() {
                return Err(ClientError::unavailable("transport disposed"));
            }

            let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst));
            let (sender, receiver) = oneshot::channel();
            // Spawned under the lock so even a zero timeout finds the entry
            let timer = {
                let weak: Weak<Self> = Arc::downgrade(self);
                let id = id.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(timeout).await;
                    if let Some(correlator) = weak.upgrade() {
                        correlator.expire(&id);
                    }
                })
                .abort_handle()
            };
            pending.insert(
                id.clone(),
                PendingCall {
                    sender,
                    method: method.to_string(),
                    timeout,
                    timer,
                },
            );
            (id, receiver)
        };

        trace!(method = %method, id = %id, "Registered pending call");

        let request = JsonRpcRequest::new(id.clone(), method, params);
        Ok((request, PendingResponse { id, receiver }))
    }

    /// Settle a pending call with the peer's outcome. Returns `false` if the
    /// id was not pending.
    pub fn complete(&self, id: &RequestId, outcome: Result<Value, JsonRpcErrorObject>) -> bool {
        self.settle(id, outcome.map_err(ClientError::from))
    }

    /// Settle a pending call with a client-side failure
    pub fn fail(&self, id: &RequestId, error: ClientError) -> bool {
        self.settle(id, Err(error))
    }

    /// Timer path: reject with a timeout if still pending
    pub fn expire(&self, id: &RequestId) -> bool {
        let Some(call) = self.pending.lock().remove(id) else {
            return false;
        };

        debug!(method = %call.method, id = %id, "Request timed out");
        let _ = call.sender.send(Err(ClientError::Timeout {
            method: call.method,
            timeout_ms: call.timeout.as_millis() as u64,
        }));
        true
    }

    fn settle(&self, id: &RequestId, outcome: ClientResult<Value>) -> bool {
        let Some(call) = self.pending.lock().remove(id) else {
            return false;
        };

        call.timer.abort();
        trace!(method = %call.method, id = %id, ok = outcome.is_ok(), "Settled pending call");
        // The caller may have dropped its future; nothing left to notify
        let _ = call.sender.send(outcome);
        true
    }

    /// Classify one inbound message and route it
    pub fn dispatch(&self, value: Value) -> DispatchOutcome {
        let message = match JsonRpcMessage::classify(value) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "Discarding malformed inbound message");
                return DispatchOutcome::Ignored;
            }
        };

        match message {
            JsonRpcMessage::Response(response) => {
                if self.complete(&response.id, Ok(response.result)) {
                    DispatchOutcome::Settled
                } else {
                    debug!(id = %response.id, "Dropping response for untracked id");
                    DispatchOutcome::Untracked(response.id)
                }
            }
            JsonRpcMessage::Error(error) => match error.id {
                Some(id) => {
                    if self.complete(&id, Err(error.error)) {
                        DispatchOutcome::Settled
                    } else {
                        debug!(id = %id, "Dropping error response for untracked id");
                        DispatchOutcome::Untracked(id)
                    }
                }
                None => {
                    debug!(code = error.error.code, "Error response without id");
                    DispatchOutcome::Uncorrelated(error.error)
                }
            },
            JsonRpcMessage::Notification(notification) => {
                let params = notification.params.unwrap_or(Value::Null);
                DispatchOutcome::Notified(self.notify(&notification.method, params))
            }
            JsonRpcMessage::Request(request) => {
                debug!(
                    method = %request.method,
                    id = %request.id,
                    "Dropping host-initiated request; client exposes no methods"
                );
                DispatchOutcome::Ignored
            }
        }
    }

    /// Invoke every handler registered for `method`. Returns how many ran.
    ///
    /// Handlers run against a snapshot with no lock held, so they may call
    /// `on`/`off` themselves. A panicking handler does not stop the others.
    pub fn notify(&self, method: &str, params: Value) -> usize {
        let snapshot: Vec<NotificationHandler> = match self.handlers.lock().get(method) {
            Some(entries) => entries.iter().map(|(_, h)| Arc::clone(h)).collect(),
            None => Vec::new(),
        };

        if snapshot.is_empty() {
            trace!(method = %method, "Notification with no handlers");
            return 0;
        }

        for handler in &snapshot {
            let params = params.clone();
            if catch_unwind(AssertUnwindSafe(|| handler(params))).is_err() {
                warn!(method = %method, "Notification handler panicked");
            }
        }

        snapshot.len()
    }

    /// Register a notification handler. Fails once the correlator is disposed.
    pub fn on(&self, method: &str, handler: NotificationHandler) -> ClientResult<Subscription> {
        let mut handlers = self.handlers.lock();
        if self.is_disposed() {
            return Err(ClientError::unavailable("transport disposed"));
        }

        let id = SubscriptionId(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed));
        handlers
            .entry(method.to_string())
            .or_default()
            .push((id, handler));
        drop(handlers);

        debug!(method = %method, "Registered notification handler");
        Ok(Subscription {
            method: method.to_string(),
            id,
        })
    }

    /// Remove one handler. Removing the last handler drops the method entry.
    pub fn off(&self, subscription: &Subscription) -> bool {
        let mut handlers = self.handlers.lock();
        let Some(entries) = handlers.get_mut(&subscription.method) else {
            return false;
        };

        let before = entries.len();
        entries.retain(|(id, _)| *id != subscription.id);
        let removed = entries.len() != before;

        if entries.is_empty() {
            handlers.remove(&subscription.method);
        }
        removed
    }

    /// Reject everything pending and clear the registry. Idempotent.
    pub fn dispose(&self) {
        let drained: Vec<(RequestId, PendingCall)> = {
            let mut pending = self.pending.lock();
            if self.disposed.swap(true, Ordering::SeqCst) {
                return;
            }
            pending.drain().collect()
        };
        if !drained.is_empty() {
            debug!(count = drained.len(), "Rejecting pending calls on dispose");
        }
        for (_, call) in drained {
            call.timer.abort();
            let _ = call.sender.send(Err(ClientError::Disposed));
        }

        self.handlers.lock().clear();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Handler counts per method, sorted by method name
    pub fn handler_counts(&self) -> Vec<HandlerCount> {
        let mut counts: Vec<HandlerCount> = self
            .handlers
            .lock()
            .iter()
            .map(|(method, entries)| HandlerCount {
                method: method.clone(),
                handler_count: entries.len(),
            })
            .collect();
        counts.sort_by(|a, b| a.method.cmp(&b.method));
        counts
    }
}

impl Drop for Correlator {
    fn drop(&mut self) {
        for (_, call) in self.pending.get_mut().drain() {
            call.timer.abort();
        }
    }
}

impl std::fmt::Debug for Correlator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Correlator")
            .field("pending", &self.pending_count())
            .field("handlers", &self.handler_counts())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn counting_handler(counter: &Arc<AtomicUsize>) -> NotificationHandler {
        let counter = Arc::clone(counter);
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn test_ids_are_sequential() {
        let correlator = Correlator::new();

        let ids: Vec<i64> = (0..3)
            .map(|_| {
                let (request, _pending) =
                    correlator.register("settings.get", None, TIMEOUT).unwrap();
                request.id.as_i64().unwrap()
            })
            .collect();

        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_response_settles_exactly_once() {
        let correlator = Correlator::new();
        let (request, pending) = correlator
            .register("settings.get", Some(json!({"key": "theme"})), TIMEOUT)
            .unwrap();
        assert_eq!(correlator.pending_count(), 1);

        let first = correlator.dispatch(json!({
            "jsonrpc": "2.0", "id": request.id, "result": {"theme": "dark"}
        }));
        let second = correlator.dispatch(json!({
            "jsonrpc": "2.0", "id": request.id, "result": {"theme": "light"}
        }));

        assert_eq!(first, DispatchOutcome::Settled);
        assert_eq!(second, DispatchOutcome::Untracked(request.id.clone()));
        assert_eq!(pending.wait().await.unwrap(), json!({"theme": "dark"}));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_error_response_rejects_with_server_error() {
        let correlator = Correlator::new();
        let (request, pending) = correlator.register("albums.delete", None, TIMEOUT).unwrap();

        correlator.dispatch(json!({
            "jsonrpc": "2.0",
            "id": request.id,
            "error": {"code": -32601, "message": "Method not found", "data": {"hint": "x"}}
        }));

        match pending.wait().await {
            Err(ClientError::Server { code, message, data }) => {
                assert_eq!(code, -32601);
                assert_eq!(message, "Method not found");
                assert_eq!(data, Some(json!({"hint": "x"})));
            }
            other => panic!("Expected server error, got: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_rejects_and_ignores_late_response() {
        let correlator = Correlator::new();
        let started = tokio::time::Instant::now();
        let (request, pending) = correlator
            .register("settings.get", None, Duration::from_millis(5000))
            .unwrap();

        let err = pending.wait().await.unwrap_err();
        assert!(started.elapsed() >= Duration::from_millis(5000));
        assert_eq!(err.code(), -32001);
        assert!(err.to_string().contains("settings.get"));
        assert_eq!(
            err.data(),
            Some(json!({"method": "settings.get", "timeout": 5000}))
        );
        assert_eq!(correlator.pending_count(), 0);

        let late = correlator.dispatch(json!({"jsonrpc": "2.0", "id": request.id, "result": 1}));
        assert_eq!(late, DispatchOutcome::Untracked(request.id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_still_settles() {
        let correlator = Correlator::new();
        let (_, pending) = correlator.register("ping", None, Duration::ZERO).unwrap();

        assert!(pending.wait().await.unwrap_err().is_timeout());
    }

    #[tokio::test]
    async fn test_dispose_rejects_pending_and_clears_handlers() {
        let correlator = Correlator::new();
        let (_, first) = correlator.register("a", None, TIMEOUT).unwrap();
        let (_, second) = correlator.register("b", None, TIMEOUT).unwrap();
        correlator.on("gallery.scanProgress", Arc::new(|_| {})).unwrap();

        correlator.dispose();
        correlator.dispose();

        for pending in [first, second] {
            let err = pending.wait().await.unwrap_err();
            assert!(err.is_disposed());
            assert_eq!(err.code(), -32603);
        }
        assert_eq!(correlator.pending_count(), 0);
        assert!(correlator.handler_counts().is_empty());

        let err = correlator.register("c", None, TIMEOUT).unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_dispose_racing_register_leaves_nothing_pending() {
        for _ in 0..500 {
            let correlator = Correlator::new();
            let registering = {
                let correlator = Arc::clone(&correlator);
                tokio::spawn(async move {
                    let mut accepted = Vec::new();
                    for _ in 0..50 {
                        if let Ok((_, pending)) = correlator.register("m", None, TIMEOUT) {
                            accepted.push(pending);
                        }
                    }
                    accepted
                })
            };
            let disposing = {
                let correlator = Arc::clone(&correlator);
                tokio::spawn(async move { correlator.dispose() })
            };

            disposing.await.unwrap();
            let accepted = registering.await.unwrap();

            assert!(correlator.is_disposed());
            assert_eq!(correlator.pending_count(), 0);
            for pending in accepted {
                assert!(pending.wait().await.unwrap_err().is_disposed());
            }
        }
    }

    #[test]
    fn test_on_after_dispose_is_rejected() {
        let correlator = Correlator::new();
        correlator.dispose();

        let err = correlator
            .on("gallery.scanProgress", Arc::new(|_| {}))
            .unwrap_err();

        assert!(err.is_unavailable());
        assert!(correlator.handler_counts().is_empty());
    }

    #[tokio::test]
    async fn test_notification_fans_out_despite_panicking_handler() {
        let correlator = Correlator::new();
        let counter = Arc::new(AtomicUsize::new(0));

        correlator
            .on("gallery.scanProgress", counting_handler(&counter))
            .unwrap();
        correlator
            .on("gallery.scanProgress", Arc::new(|_| panic!("handler failure")))
            .unwrap();
        correlator
            .on("gallery.scanProgress", counting_handler(&counter))
            .unwrap();

        let outcome = correlator.dispatch(json!({
            "jsonrpc": "2.0",
            "method": "gallery.scanProgress",
            "params": {"percent": 50}
        }));

        assert_eq!(outcome, DispatchOutcome::Notified(3));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_off_removes_only_that_handler() {
        let correlator = Correlator::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let first = correlator
            .on("gallery.scanProgress", counting_handler(&counter))
            .unwrap();
        let second = correlator
            .on("gallery.scanProgress", counting_handler(&counter))
            .unwrap();
        assert_ne!(first.id(), second.id());

        assert!(correlator.off(&first));
        assert!(!correlator.off(&first));
        correlator.notify("gallery.scanProgress", json!({}));
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        assert!(correlator.off(&second));
        assert!(correlator.handler_counts().is_empty());
    }

    #[test]
    fn test_handler_may_unsubscribe_itself() {
        let correlator = Correlator::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let subscription = {
            let weak = Arc::downgrade(&correlator);
            let slot = Arc::clone(&slot);
            correlator.on(
                "albums.changed",
                Arc::new(move |_| {
                    if let (Some(correlator), Some(sub)) = (weak.upgrade(), slot.lock().take()) {
                        correlator.off(&sub);
                    }
                }),
            )
            .unwrap()
        };
        *slot.lock() = Some(subscription);

        assert_eq!(correlator.notify("albums.changed", Value::Null), 1);
        assert_eq!(correlator.notify("albums.changed", Value::Null), 0);
    }

    #[test]
    fn test_handler_counts_are_sorted() {
        let correlator = Correlator::new();
        correlator.on("settings.changed", Arc::new(|_| {})).unwrap();
        correlator.on("albums.changed", Arc::new(|_| {})).unwrap();
        correlator.on("albums.changed", Arc::new(|_| {})).unwrap();

        assert_eq!(
            correlator.handler_counts(),
            vec![
                HandlerCount {
                    method: "albums.changed".into(),
                    handler_count: 2
                },
                HandlerCount {
                    method: "settings.changed".into(),
                    handler_count: 1
                },
            ]
        );
    }

    #[test]
    fn test_discards_malformed_and_host_requests() {
        let correlator = Correlator::new();

        assert_eq!(correlator.dispatch(json!("garbage")), DispatchOutcome::Ignored);
        assert_eq!(
            correlator.dispatch(json!({"id": 1, "result": true})),
            DispatchOutcome::Ignored
        );
        assert_eq!(
            correlator.dispatch(json!({"jsonrpc": "2.0", "method": "ui.confirm", "id": 4})),
            DispatchOutcome::Ignored
        );

        let outcome = correlator.dispatch(json!({
            "jsonrpc": "2.0", "id": null, "error": {"code": -32700, "message": "Parse error"}
        }));
        assert!(matches!(outcome, DispatchOutcome::Uncorrelated(ref e) if e.code == -32700));
    }
}
