//! Minimal scripted CDP WebSocket server for integration tests.
//!
//! Accepts one connection, reads `{id, method, params}` command frames and
//! hands each to a caller-supplied handler that decides the response body
//! and an artificial delay. Responses are sent from their own spawned
//! task so out-of-order completion (a later command finishing before an
//! earlier one) is exercised the same way a real browser's event loop
//! would produce it.

use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

type ServerStream = WebSocketStream<tokio::net::TcpStream>;

/// `(method, params) -> (delay_ms, response_fragment)`, where
/// `response_fragment` is an object with a `"result"` or `"error"` key —
/// everything an `{"id": ..}` frame needs besides the id.
pub type Handler = dyn Fn(&str, &Value) -> (u64, Value) + Send + Sync;

pub struct MockCdpServer {
    pub ws_url: String,
    accept_task: tokio::task::JoinHandle<()>,
}

impl Drop for MockCdpServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

pub async fn start_mock_server<F>(handler: F) -> MockCdpServer
where
    F: Fn(&str, &Value) -> (u64, Value) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock server");
    let addr = listener.local_addr().expect("local addr");
    let handler: Arc<Handler> = Arc::new(handler);

    let accept_task = tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else { return };
            let Ok(ws) = tokio_tungstenite::accept_async(stream).await else { continue };
            let (sink, mut source) = ws.split();
            let sink: Arc<Mutex<SplitSink<ServerStream, Message>>> = Arc::new(Mutex::new(sink));
            let handler = Arc::clone(&handler);

            while let Some(Ok(msg)) = source.next().await {
                match msg {
                    Message::Text(text) => {
                        let Ok(frame) = serde_json::from_str::<Value>(&text) else { continue };
                        let Some(id) = frame.get("id").and_then(Value::as_u64) else { continue };
                        let method = frame.get("method").and_then(Value::as_str).unwrap_or_default().to_string();
                        let params = frame.get("params").cloned().unwrap_or(Value::Null);

                        let handler = Arc::clone(&handler);
                        let sink = Arc::clone(&sink);
                        tokio::spawn(async move {
                            let (delay_ms, mut body) = handler(&method, &params);
                            if delay_ms > 0 {
                                tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                            }
                            if let Some(obj) = body.as_object_mut() {
                                obj.insert("id".to_string(), Value::from(id));
                            }
                            let text = serde_json::to_string(&body).unwrap();
                            let _ = sink.lock().await.send(Message::Text(text.into())).await;
                        });
                    }
                    Message::Close(_) => return,
                    _ => {}
                }
            }
        }
    });

    MockCdpServer { ws_url: format!("ws://{addr}/devtools/page/mock"), accept_task }
}

/// Default response for methods a test doesn't care about (domain
/// `.enable` calls, `Target.*` bookkeeping): an empty success result.
#[must_use]
pub fn empty_ok() -> (u64, Value) {
    (0, serde_json::json!({"result": {}}))
}
