//! Browser discovery (`GET /json`) and the raw WebSocket transport
//! [`crate::session::Session`] speaks CDP frames over.
//!
//! A minimal wire-level client: no external devtools-driver crate opens
//! the WebSocket on the caller's behalf, so this module owns the
//! discovery and connect sequence directly, falling back through a few
//! candidate connection strategies before giving up.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::{CdpError, ReasonCode, Result};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type WsSink = SplitSink<WsStream, Message>;
pub type WsSource = SplitStream<WsStream>;

/// `GET http://127.0.0.1:<port>/json` and pick the first page target:
/// `type == "page"` and a URL that doesn't start with the browser's
/// internal scheme.
pub async fn discover_ws_url(remote_port: u16, timeout_ms: u64) -> Result<String> {
    let url = format!("http://127.0.0.1:{remote_port}/json");
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_millis(timeout_ms))
        .build()
        .map_err(|e| CdpError::new(ReasonCode::NetworkError, e.to_string()))?;

    let body: Vec<serde_json::Value> = client
        .get(&url)
        .send()
        .await
        .map_err(|e| CdpError::new(ReasonCode::NetworkError, e.to_string()))?
        .json()
        .await
        .map_err(|e| CdpError::new(ReasonCode::ResponseError, e.to_string()))?;

    body.iter()
        .find(|page| {
            page.get("type").and_then(|t| t.as_str()) == Some("page")
                && !page
                    .get("url")
                    .and_then(|u| u.as_str())
                    .unwrap_or_default()
                    .starts_with("devtools://")
        })
        .and_then(|page| page.get("webSocketDebuggerUrl"))
        .and_then(|ws| ws.as_str())
        .map(str::to_owned)
        .ok_or_else(|| {
            CdpError::new(
                ReasonCode::NavigationFailed,
                format!("no page target found at {url}"),
            )
        })
}

/// Connect to a DevTools WebSocket endpoint. The Origin header is dropped
/// on the first attempt (some embedders reject a browser-shaped Origin on
/// the debugger port); if the handshake is rejected, retry once with the
/// Host header explicitly echoed from the URL's authority.
pub async fn connect(ws_url: &str) -> Result<WsStream> {
    let mut request = ws_url
        .into_client_request()
        .map_err(|e| CdpError::new(ReasonCode::ValidationFailed, e.to_string()))?;
    request.headers_mut().remove("origin");

    match connect_async(request.clone()).await {
        Ok((stream, _)) => Ok(stream),
        Err(first_err) => {
            if let Some(host) = request.uri().host() {
                if let Ok(value) = host.parse() {
                    request.headers_mut().insert("host", value);
                }
            }
            connect_async(request)
                .await
                .map(|(stream, _)| stream)
                .map_err(|_| CdpError::new(ReasonCode::CdpDisconnected, first_err.to_string()))
        }
    }
}

pub fn split(stream: WsStream) -> (WsSink, WsSource) {
    stream.split()
}

pub async fn send_frame(sink: &mut WsSink, frame: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string(frame)?;
    sink.send(Message::Text(text.into()))
        .await
        .map_err(CdpError::from)
}
