//! DevTools WebSocket connection, a thin client over `tokio-tungstenite`.
//!
//! One connection per page target. A spawned handler loop owns the socket:
//! commands go out with a fresh id, responses are routed back by id, and
//! protocol events are broadcast to every subscriber.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, connect_async};

use crate::error::BrowserError;

/// Pending command waiting for its response.
type PendingTx = oneshot::Sender<Result<Value, String>>;

/// Buffered events per subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 1024;

/// A protocol event (a message with a `method` and no `id`).
#[derive(Clone, Debug)]
pub struct CdpEvent {
    /// Event name, e.g. `Page.loadEventFired`.
    pub method: String,
    /// Event parameters.
    pub params: Value,
}

struct CdpCommand {
    method: String,
    params: Value,
    response_tx: PendingTx,
}

/// An open DevTools connection.
pub struct CdpConnection {
    cmd_tx: mpsc::Sender<CdpCommand>,
    events: broadcast::Sender<CdpEvent>,
    handler: JoinHandle<()>,
}

impl CdpConnection {
    /// Connect to a target's `webSocketDebuggerUrl`.
    pub async fn connect(ws_url: &str) -> Result<Self, BrowserError> {
        let (ws, _) = connect_async(ws_url)
            .await
            .map_err(|e| BrowserError::Cdp(format!("WebSocket connect: {e}")))?;
        Ok(Self::from_stream(ws))
    }

    /// Wrap an already-established WebSocket.
    pub fn from_stream<S>(ws: WebSocketStream<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel::<CdpCommand>(64);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let handler = tokio::spawn(cdp_handler_loop(ws, cmd_rx, events.clone()));
        Self {
            cmd_tx,
            events,
            handler,
        }
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CdpEvent> {
        self.events.subscribe()
    }

    /// Send a command and wait for its result. `None` waits indefinitely.
    pub async fn send(
        &self,
        method: &str,
        params: Value,
        timeout: Option<Duration>,
    ) -> Result<Value, BrowserError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(CdpCommand {
                method: method.into(),
                params,
                response_tx: tx,
            })
            .await
            .map_err(|_| BrowserError::Closed)?;

        let result = bounded(timeout, format!("CDP {method}"), async {
            rx.await.map_err(|_| BrowserError::Closed)
        })
        .await?;

        result.map_err(BrowserError::Cdp)
    }
}

impl Drop for CdpConnection {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// Run `fut`, failing with [`BrowserError::Timeout`] once `limit` elapses.
pub(crate) async fn bounded<T, F>(
    limit: Option<Duration>,
    context: String,
    fut: F,
) -> Result<T, BrowserError>
where
    F: Future<Output = Result<T, BrowserError>>,
{
    match limit {
        None => fut.await,
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| BrowserError::Timeout {
            timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            context,
        })?,
    }
}

async fn cdp_handler_loop<S>(
    ws: WebSocketStream<S>,
    mut cmd_rx: mpsc::Receiver<CdpCommand>,
    events: broadcast::Sender<CdpEvent>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut ws_tx, mut ws_rx) = ws.split();
    let mut pending: HashMap<u64, PendingTx> = HashMap::new();
    let mut next_id: u64 = 1;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break };
                let id = next_id;
                next_id += 1;
                let msg = json!({
                    "id": id,
                    "method": cmd.method,
                    "params": cmd.params,
                });
                let _ = pending.insert(id, cmd.response_tx);
                if ws_tx.send(Message::Text(msg.to_string().into())).await.is_err() {
                    break;
                }
            }
            msg = ws_rx.next() => {
                let Some(Ok(msg)) = msg else { break };
                let Message::Text(text) = msg else { continue };
                let Ok(val): Result<Value, _> = serde_json::from_str(&text) else {
                    continue;
                };
                if let Some(id) = val.get("id").and_then(Value::as_u64) {
                    if let Some(tx) = pending.remove(&id) {
                        if let Some(err) = val.get("error") {
                            let msg = err["message"].as_str().unwrap_or("CDP error");
                            let _ = tx.send(Err(msg.into()));
                        } else {
                            let _ = tx.send(Ok(val["result"].clone()));
                        }
                    }
                } else if let Some(method) = val.get("method").and_then(Value::as_str) {
                    // no subscribers is fine
                    let _ = events.send(CdpEvent {
                        method: method.to_string(),
                        params: val.get("params").cloned().unwrap_or(Value::Null),
                    });
                }
            }
        }
    }

    tracing::debug!(pending = pending.len(), "DevTools connection closed");
}
