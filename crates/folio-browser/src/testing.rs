//! In-process fake DevTools endpoint for unit tests.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

/// How the fake answers one command.
pub(crate) struct FakeReply {
    result: Option<Result<Value, String>>,
    events: Vec<(String, Value)>,
}

impl FakeReply {
    pub(crate) fn ok(result: Value) -> Self {
        Self {
            result: Some(Ok(result)),
            events: Vec::new(),
        }
    }

    pub(crate) fn err(message: &str) -> Self {
        Self {
            result: Some(Err(message.to_string())),
            events: Vec::new(),
        }
    }

    /// Never answer.
    pub(crate) fn silent() -> Self {
        Self {
            result: None,
            events: Vec::new(),
        }
    }

    /// Emit an event after the response.
    pub(crate) fn with_event(mut self, method: &str, params: Value) -> Self {
        self.events.push((method.to_string(), params));
        self
    }
}

type Calls = Arc<Mutex<Vec<(String, Value)>>>;

pub(crate) struct FakeDevtools {
    addr: SocketAddr,
    calls: Calls,
    task: JoinHandle<()>,
}

impl FakeDevtools {
    pub(crate) fn ws_url(&self) -> String {
        format!("ws://{}/devtools/page/FAKE", self.addr)
    }

    pub(crate) fn methods(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(m, _)| m.clone()).collect()
    }

    pub(crate) fn params_of(&self, method: &str) -> Option<Value> {
        self.calls
            .lock()
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
    }
}

impl Drop for FakeDevtools {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub(crate) async fn fake_devtools<F>(respond: F) -> FakeDevtools
where
    F: Fn(&str, &Value) -> FakeReply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let calls: Calls = Arc::default();
    let respond = Arc::new(respond);

    let task = {
        let calls = Arc::clone(&calls);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let calls = Arc::clone(&calls);
                let respond = Arc::clone(&respond);
                let _ = tokio::spawn(async move {
                    let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    let (mut tx, mut rx) = ws.split();
                    while let Some(Ok(Message::Text(text))) = rx.next().await {
                        let msg: Value = serde_json::from_str(&text).unwrap();
                        let method = msg["method"].as_str().unwrap_or_default().to_string();
                        let params = msg["params"].clone();
                        calls.lock().push((method.clone(), params.clone()));

                        let reply = respond(&method, &params);
                        let mut out = Vec::new();
                        match reply.result {
                            Some(Ok(result)) => out.push(json!({"id": msg["id"], "result": result})),
                            Some(Err(message)) => out.push(json!({
                                "id": msg["id"],
                                "error": {"code": -32000, "message": message},
                            })),
                            None => {}
                        }
                        for (method, params) in reply.events {
                            out.push(json!({"method": method, "params": params}));
                        }
                        for frame in out {
                            if tx.send(Message::Text(frame.to_string().into())).await.is_err() {
                                return;
                            }
                        }
                    }
                });
            }
        })
    };

    FakeDevtools { addr, calls, task }
}
