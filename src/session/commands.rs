//! Command dispatch: id allocation, in-flight backpressure, and the
//! out-of-band JS-argument helpers used throughout waits/selectors/actions.

use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::error::{CdpError, ReasonCode, Result};
use crate::transport;

use super::core::Session;
use super::types::SessionState;

impl Session {
    /// Send one `{id, method, params}` command and await its matching
    /// response, respecting the in-flight semaphore and command timeout.
    ///
    /// Admission is bounded two ways: `config.command_queue_size` caps how
    /// many callers may be waiting on the in-flight semaphore at once (a
    /// caller arriving once that cap is already reached fails immediately),
    /// and a caller that *is* admitted to wait still fails with `queue-full`
    /// if the semaphore isn't freed within `command_timeout_ms`.
    ///
    /// Every exit path — response observed, timeout, or session closed —
    /// releases the semaphore permit and removes the pending entry, so no
    /// in-flight slot is ever leaked.
    pub async fn send_command(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        if matches!(
            self.state(),
            SessionState::Closed | SessionState::Closing | SessionState::Failed
        ) {
            return Err(CdpError::new(ReasonCode::CdpDisconnected, "session closed"));
        }

        if self.queue_depth.fetch_add(1, Ordering::AcqRel) >= self.config.command_queue_size {
            self.queue_depth.fetch_sub(1, Ordering::AcqRel);
            return Err(CdpError::new(
                ReasonCode::QueueFull,
                format!("command queue at capacity ({})", self.config.command_queue_size),
            ));
        }
        let acquire = tokio::time::timeout(
            Duration::from_millis(self.config.command_timeout_ms),
            self.in_flight.acquire(),
        )
        .await;
        self.queue_depth.fetch_sub(1, Ordering::AcqRel);

        let _permit = match acquire {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(CdpError::new(ReasonCode::CdpDisconnected, "in-flight semaphore closed"));
            }
            Err(_) => {
                return Err(CdpError::new(
                    ReasonCode::QueueFull,
                    "timed out waiting for an in-flight command slot",
                ));
            }
        };

        let throttle = self.throttle.lock().clone();
        let _throttle_permit = match &throttle {
            Some(throttle) => Some(throttle.acquire().await),
            None => None,
        };

        let started = std::time::Instant::now();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        let frame = serde_json::json!({"id": id, "method": method, "params": params});

        {
            let mut guard = self.sink.lock().await;
            let sink = guard.as_mut().ok_or_else(|| {
                CdpError::new(ReasonCode::CdpDisconnected, "no active transport")
            })?;
            if let Err(e) = transport::send_frame(sink, &frame).await {
                self.pending.remove(&id);
                return Err(e);
            }
        }

        let response = tokio::time::timeout(
            Duration::from_millis(self.config.command_timeout_ms),
            rx,
        )
        .await;

        if let Some(throttle) = &throttle {
            throttle.record_latency(started.elapsed());
        }

        match response {
            Ok(Ok(frame)) => {
                if let Some(error) = frame.get("error") {
                    let message = error
                        .get("message")
                        .and_then(|m| m.as_str())
                        .unwrap_or("command failed")
                        .to_string();
                    return Err(CdpError::new(ReasonCode::CdpCommandFailed, message)
                        .with_context("method", method));
                }
                Ok(frame.get("result").cloned().unwrap_or(serde_json::json!({})))
            }
            Ok(Err(_)) => {
                self.pending.remove(&id);
                Err(CdpError::new(ReasonCode::CdpDisconnected, "response channel dropped"))
            }
            Err(_) => {
                self.pending.remove(&id);
                Err(CdpError::new(ReasonCode::TimeoutStep, format!("{method} timed out")))
            }
        }
    }

    /// `Runtime.evaluate` with `returnByValue: true` on the page's main
    /// execution context.
    pub async fn evaluate_js(&self, expression: &str) -> Result<serde_json::Value> {
        let result = self
            .send_command(
                "Runtime.evaluate",
                serde_json::json!({"expression": expression, "returnByValue": true}),
            )
            .await?;
        Ok(result.get("result").and_then(|r| r.get("value")).cloned().unwrap_or(serde_json::Value::Null))
    }

    /// `Runtime.callFunctionOn` with the arguments passed out-of-band via
    /// the `arguments` array rather than interpolated into the function
    /// body text: a value containing a quote or backslash can never break
    /// out of the function body, because it never becomes part of the
    /// body text.
    pub async fn call_function_on(
        &self,
        object_id: Option<&str>,
        function_declaration: &str,
        args: &[serde_json::Value],
    ) -> Result<serde_json::Value> {
        let arguments: Vec<serde_json::Value> = args
            .iter()
            .map(|v| serde_json::json!({"value": v}))
            .collect();

        let mut params = serde_json::json!({
            "functionDeclaration": function_declaration,
            "arguments": arguments,
            "returnByValue": true,
        });
        if let Some(object_id) = object_id {
            params["objectId"] = serde_json::Value::String(object_id.to_string());
        } else {
            // No receiver object: evaluate in the default execution context
            // by wrapping the declaration as an IIFE via Runtime.evaluate's
            // sibling call convention (executionContextId unspecified).
            return self
                .call_function_global(function_declaration, &arguments)
                .await;
        }

        let result = self.send_command("Runtime.callFunctionOn", params).await?;
        Ok(result.get("result").and_then(|r| r.get("value")).cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn call_function_global(
        &self,
        function_declaration: &str,
        arguments: &[serde_json::Value],
    ) -> Result<serde_json::Value> {
        // Runtime.callFunctionOn requires either an objectId or an
        // executionContextId; resolve `window` as the receiver first.
        let window = self
            .send_command("Runtime.evaluate", serde_json::json!({"expression": "window"}))
            .await?;
        let object_id = window
            .get("result")
            .and_then(|r| r.get("objectId"))
            .and_then(|o| o.as_str())
            .ok_or_else(|| CdpError::new(ReasonCode::CdpProtocolError, "no window objectId"))?
            .to_string();

        let params = serde_json::json!({
            "functionDeclaration": function_declaration,
            "arguments": arguments,
            "objectId": object_id,
            "returnByValue": true,
        });
        let result = self.send_command("Runtime.callFunctionOn", params).await?;
        Ok(result.get("result").and_then(|r| r.get("value")).cloned().unwrap_or(serde_json::Value::Null))
    }

    /// Like [`Self::call_function_on`], but returns the remote object's
    /// `objectId` instead of its by-value result — for callers (the
    /// selector engine) that need a live handle to operate on further
    /// rather than a JSON snapshot.
    pub async fn call_function_on_ref(
        &self,
        object_id: Option<&str>,
        function_declaration: &str,
        args: &[serde_json::Value],
    ) -> Result<Option<String>> {
        let arguments: Vec<serde_json::Value> = args
            .iter()
            .map(|v| serde_json::json!({"value": v}))
            .collect();

        let receiver = match object_id {
            Some(id) => id.to_string(),
            None => {
                let window = self
                    .send_command("Runtime.evaluate", serde_json::json!({"expression": "window"}))
                    .await?;
                window
                    .get("result")
                    .and_then(|r| r.get("objectId"))
                    .and_then(|o| o.as_str())
                    .ok_or_else(|| CdpError::new(ReasonCode::CdpProtocolError, "no window objectId"))?
                    .to_string()
            }
        };

        let params = serde_json::json!({
            "functionDeclaration": function_declaration,
            "arguments": arguments,
            "objectId": receiver,
            "returnByValue": false,
        });
        let result = self.send_command("Runtime.callFunctionOn", params).await?;
        let object = result.get("result");
        if matches!(object.and_then(|o| o.get("subtype")).and_then(|s| s.as_str()), Some("null")) {
            return Ok(None);
        }
        Ok(object
            .and_then(|o| o.get("objectId"))
            .and_then(|o| o.as_str())
            .map(str::to_string))
    }

    pub async fn get_current_url(&self) -> Result<String> {
        let value = self.evaluate_js("window.location.href").await?;
        let url = value
            .as_str()
            .ok_or_else(|| CdpError::new(ReasonCode::CdpProtocolError, "location.href not a string"))?
            .to_string();
        *self.current_url.lock() = Some(url.clone());
        Ok(url)
    }

    #[must_use]
    pub fn cached_current_url(&self) -> Option<String> {
        self.current_url.lock().clone()
    }

    pub async fn get_document(&self) -> Result<serde_json::Value> {
        self.send_command("DOM.getDocument", serde_json::json!({"depth": -1}))
            .await
    }

    /// `DOM.describeNode` with `pierce: true`, so an `<iframe>`/`<frame>`
    /// element's `contentDocument` is included inline rather than requiring
    /// a separate frame-tree walk — used by the selector engine to resolve
    /// a frame-scoped locator's own document root.
    pub async fn describe_node(&self, node_id: i64) -> Result<serde_json::Value> {
        self.send_command(
            "DOM.describeNode",
            serde_json::json!({"nodeId": node_id, "pierce": true}),
        )
        .await
    }

    /// Creates an isolated execution context attached to `frame_id`, sharing
    /// that frame's DOM but with its own JS globals, and returns its
    /// `executionContextId` — used to evaluate locator scripts against a
    /// specific frame's `document` rather than the main frame's.
    pub async fn create_isolated_world(&self, frame_id: &str) -> Result<i64> {
        let result = self
            .send_command(
                "Page.createIsolatedWorld",
                serde_json::json!({
                    "frameId": frame_id,
                    "worldName": "cdp_remote_locator",
                    "grantUniveralAccess": true,
                }),
            )
            .await?;
        result
            .get("executionContextId")
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| CdpError::new(ReasonCode::CdpProtocolError, "Page.createIsolatedWorld returned no executionContextId"))
    }

    /// Like [`Self::call_function_on_ref`], but evaluated in `context_id`'s
    /// execution context with no receiver bound, instead of the main
    /// frame's default context — for a frame-scoped locator with nothing
    /// further to scope it to.
    pub async fn call_function_in_context_ref(
        &self,
        context_id: i64,
        function_declaration: &str,
        args: &[serde_json::Value],
    ) -> Result<Option<String>> {
        let arguments: Vec<serde_json::Value> = args
            .iter()
            .map(|v| serde_json::json!({"value": v}))
            .collect();

        let params = serde_json::json!({
            "functionDeclaration": function_declaration,
            "arguments": arguments,
            "executionContextId": context_id,
            "returnByValue": false,
        });
        let result = self.send_command("Runtime.callFunctionOn", params).await?;
        let object = result.get("result");
        if matches!(object.and_then(|o| o.get("subtype")).and_then(|s| s.as_str()), Some("null")) {
            return Ok(None);
        }
        Ok(object
            .and_then(|o| o.get("objectId"))
            .and_then(|o| o.as_str())
            .map(str::to_string))
    }
}
