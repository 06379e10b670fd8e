//! Server-Sent Events decoding and the HTTP notification listener

use futures::{Stream, StreamExt};
use reqwest::Client;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::correlation::Correlator;
use crate::error::TransportError;

/// One decoded SSE event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub id: Option<String>,
    pub data: String,
}

/// Incremental `text/event-stream` decoder.
///
/// Chunks may split events, lines or UTF-8 sequences anywhere; bytes are
/// buffered until a blank line terminates an event.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    // Last chunk ended on CR; a leading LF in the next one belongs to it
    after_cr: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, returning every event it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        // CRLF, CR and LF all end a line; fold them into LF
        for &byte in chunk {
            if std::mem::take(&mut self.after_cr) && byte == b'\n' {
                continue;
            }
            if byte == b'\r' {
                self.buffer.push(b'\n');
                self.after_cr = true;
            } else {
                self.buffer.push(byte);
            }
        }

        let mut events = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let frame: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(event) = parse_event(&String::from_utf8_lossy(&frame[..end])) {
                events.push(event);
            }
        }
        events
    }
}

/// Parse the lines of one event block. Blocks without data are skipped.
fn parse_event(block: &str) -> Option<SseEvent> {
    let mut event = SseEvent::default();
    let mut has_data = false;

    for line in block.lines() {
        // Comment lines carry keep-alives
        if line.starts_with(':') {
            continue;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => event.event = Some(value.to_string()),
            "id" => event.id = Some(value.to_string()),
            "data" => {
                if has_data {
                    event.data.push('\n');
                }
                event.data.push_str(value);
                has_data = true;
            }
            _ => {}
        }
    }

    has_data.then_some(event)
}

/// Drain a byte stream through a decoder, handing each event to `on_event`.
/// Returns when the stream ends or fails.
pub async fn pump<S, B, E, F>(mut stream: S, mut on_event: F) -> Result<(), TransportError>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
    F: FnMut(SseEvent),
{
    let mut decoder = SseDecoder::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| TransportError::Sse(format!("Stream error: {}", e)))?;
        for event in decoder.push(chunk.as_ref()) {
            on_event(event);
        }
    }

    Ok(())
}

/// Route one event's JSON payload into the correlator
pub(crate) fn dispatch_event(correlator: &Correlator, event: SseEvent) {
    match serde_json::from_str::<Value>(&event.data) {
        Ok(message) => {
            debug!(event = ?event.event, id = ?event.id, "Received SSE message");
            correlator.dispatch(message);
        }
        Err(e) => warn!(error = %e, data = %event.data, "Failed to parse SSE data as JSON"),
    }
}

/// Keep an event stream open until the correlator is disposed or dropped,
/// reconnecting after `reconnect_delay` whenever it ends.
pub(crate) async fn run_event_stream(
    client: Client,
    url: Url,
    correlator: Weak<Correlator>,
    connected: Arc<AtomicBool>,
    reconnect_delay: Duration,
) {
    loop {
        match correlator.upgrade() {
            Some(c) if !c.is_disposed() => {}
            _ => break,
        }

        let response = client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                connected.store(true, Ordering::SeqCst);
                info!(url = %url, "SSE event stream connected");

                let result = pump(Box::pin(resp.bytes_stream()), |event| {
                    if let Some(correlator) = correlator.upgrade() {
                        dispatch_event(&correlator, event);
                    }
                })
                .await;

                connected.store(false, Ordering::SeqCst);
                match result {
                    Ok(()) => info!(url = %url, "SSE event stream ended, reconnecting"),
                    Err(e) => {
                        warn!(url = %url, error = %e, "SSE event stream failed, reconnecting")
                    }
                }
            }
            Ok(resp) => {
                warn!(url = %url, status = %resp.status(), "SSE connection rejected");
            }
            Err(e) => {
                warn!(url = %url, error = %e, "SSE connection error");
            }
        }

        tokio::time::sleep(reconnect_delay).await;
    }

    connected.store(false, Ordering::SeqCst);
    debug!(url = %url, "SSE listener stopped");
}
