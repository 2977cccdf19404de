//! Background task that drains the WebSocket source, matching responses to
//! their pending command and publishing everything else as an event.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::event_bus::CdpEvent;

use super::core::Session;

pub(super) fn spawn(session: Arc<Session>, mut source: crate::transport::WsSource) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut detached = false;

        while let Some(message) = source.next().await {
            let text = match message {
                Ok(Message::Text(text)) => text.to_string(),
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "transport read error");
                    break;
                }
            };

            let frame: serde_json::Value = match serde_json::from_str(&text) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(error = %e, "unparsable CDP frame");
                    continue;
                }
            };

            if let Some(id) = frame.get("id").and_then(serde_json::Value::as_u64) {
                if let Some((_, tx)) = session.pending.remove(&id) {
                    let _ = tx.send(frame);
                }
                continue;
            }

            if let Some(method) = frame.get("method").and_then(|m| m.as_str()) {
                let params = frame.get("params").cloned().unwrap_or(serde_json::json!({}));
                session.events.publish(CdpEvent::new(method, params));
                if method == "Inspector.detached" {
                    detached = true;
                    break;
                }
            }
        }

        tracing::debug!(detached, "session reader loop exited");
        session.handle_disconnect().await;
    })
}
