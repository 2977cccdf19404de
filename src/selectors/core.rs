//! Element-finding engine: CSS-resolvable locators go through
//! `DOM.querySelector[All]`; text and XPath locators are resolved in JS
//! with the query passed as a structured argument rather than
//! interpolated into the function body, then bound to a DOM node via
//! `DOM.requestNode`.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

use crate::error::{CdpError, ReasonCode, Result};
use crate::session::Session;

use super::types::{ElementHandle, FrameContext, Locator, LocatorType};

// `this` is the scope element when one was resolved (an object id was
// available to bind as the receiver); otherwise `this` is `window`/
// `undefined` and the search root falls back to the current frame's own
// `document`, which is a frame-specific document when run inside that
// frame's isolated world.
const FIND_BY_XPATH_JS: &str = r"function(xpath) {
    const root = (this && this.nodeType) ? this : document;
    const result = document.evaluate(xpath, root, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null);
    return result.singleNodeValue;
}";
const FIND_BY_TEXT_EXACT_JS: &str = r"function(text) {
    const root = (this && this.nodeType) ? this : document.body;
    const walker = document.createTreeWalker(root, NodeFilter.SHOW_TEXT);
    while (walker.nextNode()) {
        if (walker.currentNode.textContent.trim() === text) {
            return walker.currentNode.parentElement;
        }
    }
    return null;
}";
const FIND_BY_TEXT_CONTAINS_JS: &str = r"function(text) {
    const root = (this && this.nodeType) ? this : document;
    const elements = root.querySelectorAll('*');
    for (const el of elements) {
        if (el.childNodes.length <= 3 && el.textContent.includes(text)) {
            return el;
        }
    }
    return null;
}";

pub struct SelectorEngine {
    session: Arc<Session>,
    current_frame: Mutex<FrameContext>,
    frame_stack: Mutex<Vec<FrameContext>>,
}

impl SelectorEngine {
    #[must_use]
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            current_frame: Mutex::new(FrameContext {
                is_main_frame: true,
                ..Default::default()
            }),
            frame_stack: Mutex::new(Vec::new()),
        }
    }

    pub async fn find(&self, locator: &Locator) -> Result<Option<ElementHandle>> {
        let Some(frame_selector) = locator.frame.clone() else {
            return self.find_in_current_frame(locator).await;
        };
        if !self.switch_to_frame(&frame_selector).await? {
            return Err(CdpError::new(ReasonCode::ElementNotFound, format!("frame not found: {frame_selector}")));
        }
        let result = self.find_in_current_frame(locator).await;
        self.switch_to_parent_frame();
        result
    }

    pub async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementHandle>> {
        let Some(frame_selector) = locator.frame.clone() else {
            return self.find_all_in_current_frame(locator).await;
        };
        if !self.switch_to_frame(&frame_selector).await? {
            return Err(CdpError::new(ReasonCode::ElementNotFound, format!("frame not found: {frame_selector}")));
        }
        let result = self.find_all_in_current_frame(locator).await;
        self.switch_to_parent_frame();
        result
    }

    /// Resolves `locator` against the currently active frame (main frame
    /// unless a `switch_to_frame`/`locator.frame` push is in effect),
    /// first walking its scope chain outer-to-inner so each step is
    /// resolved within the node the previous step produced.
    async fn find_in_current_frame(&self, locator: &Locator) -> Result<Option<ElementHandle>> {
        let scope = self.resolve_scope_chain(locator).await?;
        let scope_node_id = scope.as_ref().map(|h| h.node_id);
        let scope_object_id = scope.as_ref().and_then(|h| h.object_id.as_deref());
        self.resolve_one(locator, scope_node_id, scope_object_id).await
    }

    async fn find_all_in_current_frame(&self, locator: &Locator) -> Result<Vec<ElementHandle>> {
        if locator.kind.is_xpath() || locator.kind.is_text_based() {
            // Multi-match text/xpath search is not supported without a
            // richer node-set bridge; callers needing "all matches" for
            // these locator kinds should narrow via `find` + scope instead.
            return Ok(self.find_in_current_frame(locator).await?.into_iter().collect());
        }
        let scope = self.resolve_scope_chain(locator).await?;
        self.find_all_by_css(locator, scope.as_ref().map(|h| h.node_id)).await
    }

    /// Walks `locator.scope`'s chain from outermost to innermost, resolving
    /// each link inside the node the previous link produced, and returns
    /// the innermost resolved handle (the direct scope `locator` itself
    /// resolves within). `None` means "no scope, resolve against the
    /// current frame's document root".
    async fn resolve_scope_chain(&self, locator: &Locator) -> Result<Option<ElementHandle>> {
        let mut chain = Vec::new();
        let mut current = locator;
        while let Some(scope) = current.scope.as_deref() {
            chain.push(scope);
            current = scope;
        }
        chain.reverse();

        let mut scope_handle: Option<ElementHandle> = None;
        for scope_locator in chain {
            let scope_node_id = scope_handle.as_ref().map(|h| h.node_id);
            let scope_object_id = scope_handle.as_ref().and_then(|h| h.object_id.as_deref());
            let resolved = self.resolve_one(scope_locator, scope_node_id, scope_object_id).await?;
            scope_handle = Some(
                resolved.ok_or_else(|| CdpError::new(ReasonCode::ElementNotFound, format!("scope not found: {}", scope_locator.description)))?,
            );
        }
        Ok(scope_handle)
    }

    /// Dispatches a single (non-chained) locator to the CSS- or
    /// JS-runtime-based resolver, scoped to `scope_node_id`/`scope_object_id`
    /// when given, else the current frame's own root.
    async fn resolve_one(&self, locator: &Locator, scope_node_id: Option<i64>, scope_object_id: Option<&str>) -> Result<Option<ElementHandle>> {
        if locator.kind.is_xpath() {
            self.find_by_runtime(locator, FIND_BY_XPATH_JS, &locator.value, scope_object_id).await
        } else if locator.kind.is_text_based() {
            let js = if locator.kind == LocatorType::TextExact {
                FIND_BY_TEXT_EXACT_JS
            } else {
                FIND_BY_TEXT_CONTAINS_JS
            };
            self.find_by_runtime(locator, js, &locator.value, scope_object_id).await
        } else {
            self.find_by_css(locator, scope_node_id).await
        }
    }

    /// The current frame's document root, or the top-level document's when
    /// no frame is pushed.
    async fn document_node_id(&self) -> Result<i64> {
        if let Some(id) = self.current_frame.lock().document_node_id {
            return Ok(id);
        }
        let doc = self.session.get_document().await?;
        doc.get("root")
            .and_then(|r| r.get("nodeId"))
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| CdpError::new(ReasonCode::CdpProtocolError, "DOM.getDocument returned no root nodeId"))
    }

    async fn find_by_css(&self, locator: &Locator, scope_node_id: Option<i64>) -> Result<Option<ElementHandle>> {
        let Some(selector) = locator.to_css_selector() else {
            return Ok(None);
        };
        let node_id = match scope_node_id {
            Some(id) => id,
            None => self.document_node_id().await?,
        };

        let result = self
            .session
            .send_command(
                "DOM.querySelector",
                serde_json::json!({"nodeId": node_id, "selector": selector}),
            )
            .await?;

        let found = result.get("nodeId").and_then(serde_json::Value::as_i64).unwrap_or(0);
        if found == 0 {
            return Ok(None);
        }
        self.create_handle(found, locator.clone()).await.map(Some)
    }

    async fn find_all_by_css(&self, locator: &Locator, scope_node_id: Option<i64>) -> Result<Vec<ElementHandle>> {
        let Some(selector) = locator.to_css_selector() else {
            return Ok(Vec::new());
        };
        let node_id = match scope_node_id {
            Some(id) => id,
            None => self.document_node_id().await?,
        };

        let result = self
            .session
            .send_command(
                "DOM.querySelectorAll",
                serde_json::json!({"nodeId": node_id, "selector": selector}),
            )
            .await?;

        let ids = result
            .get("nodeIds")
            .and_then(serde_json::Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut handles = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(id) = id.as_i64() {
                if id != 0 {
                    handles.push(self.create_handle(id, locator.clone()).await?);
                }
            }
        }
        Ok(handles)
    }

    /// Resolves a text/XPath locator in JS, scoped to `scope_object_id`
    /// (bound as `this`) when given, else evaluated in the current frame's
    /// own execution context (the isolated world created by
    /// `switch_to_frame`, or the main world when no frame is pushed).
    async fn find_by_runtime(
        &self,
        locator: &Locator,
        function_declaration: &str,
        query: &str,
        scope_object_id: Option<&str>,
    ) -> Result<Option<ElementHandle>> {
        let args = [serde_json::Value::String(query.to_string())];
        let object_id = match scope_object_id {
            Some(scope) => self.session.call_function_on_ref(Some(scope), function_declaration, &args).await?,
            None => match self.current_frame.lock().execution_context_id {
                Some(context_id) => self.session.call_function_in_context_ref(context_id, function_declaration, &args).await?,
                None => self.session.call_function_on_ref(None, function_declaration, &args).await?,
            },
        };
        let Some(object_id) = object_id else {
            return Ok(None);
        };

        let node = self
            .session
            .send_command("DOM.requestNode", serde_json::json!({"objectId": object_id}))
            .await?;
        let node_id = node.get("nodeId").and_then(serde_json::Value::as_i64).unwrap_or(0);
        if node_id == 0 {
            return Ok(None);
        }

        Ok(Some(ElementHandle {
            node_id,
            object_id: Some(object_id),
            locator: locator.clone(),
            frame_context: self.current_frame.lock().clone(),
            found_at: Utc::now(),
        }))
    }

    async fn create_handle(&self, node_id: i64, locator: Locator) -> Result<ElementHandle> {
        let object_id = self
            .session
            .send_command("DOM.resolveNode", serde_json::json!({"nodeId": node_id}))
            .await
            .ok()
            .and_then(|r| r.get("object").and_then(|o| o.get("objectId")).and_then(|v| v.as_str()).map(str::to_string));

        Ok(ElementHandle {
            node_id,
            object_id,
            locator,
            frame_context: self.current_frame.lock().clone(),
            found_at: Utc::now(),
        })
    }

    /// Switches into the iframe matched by `frame_selector`: resolves it
    /// in the current frame, pierces into its `contentDocument` for the
    /// DOM-domain resolution root, and opens an isolated world on its
    /// `frameId` for JS-runtime locator scripts. Pushes the previous
    /// frame context onto the stack so `switch_to_parent_frame` can
    /// restore it.
    pub async fn switch_to_frame(&self, frame_selector: &str) -> Result<bool> {
        let current_root = self.current_frame.lock().document_node_id;
        let css = super::types::by_css(frame_selector);
        let Some(handle) = self.find_by_css(&css, current_root).await? else {
            return Ok(false);
        };

        let described = self.session.describe_node(handle.node_id).await?;
        let node = described.get("node");
        let frame_id = node.and_then(|n| n.get("frameId")).and_then(|v| v.as_str()).map(str::to_string);
        let Some(frame_id) = frame_id else {
            return Err(CdpError::new(
                ReasonCode::CdpProtocolError,
                format!("{frame_selector} matched an element with no frameId (not an iframe/frame)"),
            ));
        };
        let content_document_id = node
            .and_then(|n| n.get("contentDocument"))
            .and_then(|d| d.get("nodeId"))
            .and_then(serde_json::Value::as_i64);
        let context_id = self.session.create_isolated_world(&frame_id).await.ok();

        let previous = std::mem::replace(
            &mut *self.current_frame.lock(),
            FrameContext {
                frame_id: Some(frame_id),
                frame_selector: Some(frame_selector.to_string()),
                is_main_frame: false,
                document_node_id: content_document_id,
                execution_context_id: context_id,
            },
        );
        self.frame_stack.lock().push(previous);
        Ok(true)
    }

    pub fn switch_to_main_frame(&self) {
        *self.current_frame.lock() = FrameContext { is_main_frame: true, ..Default::default() };
        self.frame_stack.lock().clear();
    }

    pub fn switch_to_parent_frame(&self) {
        let popped = self.frame_stack.lock().pop();
        *self.current_frame.lock() = popped.unwrap_or(FrameContext { is_main_frame: true, ..Default::default() });
    }

    /// Picks one locator from whichever hints a caller supplied, in
    /// priority order — see [`super::types::build_locator`]. The engine
    /// itself never reorders a locator a caller built explicitly; this is
    /// only for the caller that wants the priority applied for them.
    #[must_use]
    pub fn build_locator(&self, hints: &super::types::HintsMap) -> Option<Locator> {
        super::types::build_locator(hints)
    }
}
