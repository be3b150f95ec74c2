/*!
 * DevTools Protocol Connection
 * Minimal Chrome DevTools protocol client: request/response correlation by
 * call id over a websocket, with event fan-out for session listeners
 */

use super::types::{EngineError, EngineResult};
use dashmap::DashMap;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use log::{debug, warn};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Buffered browser-pushed events; laggards drop the oldest
const EVENT_CHANNEL_CAPACITY: usize = 256;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// An event pushed by the browser, scoped to a session when applicable
#[derive(Debug, Clone)]
pub struct CdpEvent {
    pub method: String,
    pub session_id: Option<String>,
    pub params: Value,
}

/// One websocket connection to a browser's DevTools endpoint
pub struct CdpConnection {
    sink: Mutex<WsSink>,
    next_id: AtomicU64,
    pending: Arc<DashMap<u64, oneshot::Sender<Result<Value, String>>>>,
    events: broadcast::Sender<CdpEvent>,
    reader: tokio::task::JoinHandle<()>,
}

impl CdpConnection {
    pub async fn connect(url: &str) -> EngineResult<Self> {
        let (stream, _) = connect_async(url)
            .await
            .map_err(|e| EngineError::Connection(e.to_string()))?;
        let (sink, source) = stream.split();

        let pending: Arc<DashMap<u64, oneshot::Sender<Result<Value, String>>>> =
            Arc::new(DashMap::new());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let reader = tokio::spawn(read_loop(source, Arc::clone(&pending), events.clone()));

        Ok(Self {
            sink: Mutex::new(sink),
            next_id: AtomicU64::new(1),
            pending,
            events,
            reader,
        })
    }

    /// Issue one protocol call and await its response
    pub async fn call(
        &self,
        method: &str,
        params: Value,
        session_id: Option<&str>,
    ) -> EngineResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        let mut message = json!({ "id": id, "method": method, "params": params });
        if let Some(session) = session_id {
            message["sessionId"] = Value::String(session.to_string());
        }

        let sent = {
            let mut sink = self.sink.lock().await;
            sink.send(Message::text(message.to_string())).await
        };
        if let Err(e) = sent {
            self.pending.remove(&id);
            return Err(EngineError::Connection(e.to_string()));
        }

        match rx.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(message)) => Err(EngineError::Protocol {
                method: method.to_string(),
                message,
            }),
            Err(_) => Err(EngineError::Connection(
                "DevTools stream closed mid-call".to_string(),
            )),
        }
    }

    /// Subscribe to browser-pushed events
    pub fn subscribe(&self) -> broadcast::Receiver<CdpEvent> {
        self.events.subscribe()
    }
}

impl Drop for CdpConnection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop(
    mut source: futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    pending: Arc<DashMap<u64, oneshot::Sender<Result<Value, String>>>>,
    events: broadcast::Sender<CdpEvent>,
) {
    while let Some(frame) = source.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };
        let message: Value = match serde_json::from_str(text.as_str()) {
            Ok(value) => value,
            Err(e) => {
                warn!("Discarding unparseable DevTools frame: {}", e);
                continue;
            }
        };

        if let Some(id) = message.get("id").and_then(Value::as_u64) {
            if let Some((_, tx)) = pending.remove(&id) {
                let outcome = match message.get("error") {
                    Some(error) => Err(error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown protocol error")
                        .to_string()),
                    None => Ok(message.get("result").cloned().unwrap_or(Value::Null)),
                };
                let _ = tx.send(outcome);
            }
        } else if let Some(method) = message.get("method").and_then(Value::as_str) {
            // No receivers is fine; events are advisory
            let _ = events.send(CdpEvent {
                method: method.to_string(),
                session_id: message
                    .get("sessionId")
                    .and_then(Value::as_str)
                    .map(String::from),
                params: message.get("params").cloned().unwrap_or(Value::Null),
            });
        }
    }
    debug!("DevTools stream closed");
}
