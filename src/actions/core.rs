//! Action Executor: idempotent-guard → precondition → execute →
//! postcondition sequencing for the element-level user actions.
//!
//! All JS run against a located element uses `Runtime.callFunctionOn`
//! against the element's `objectId` with arguments passed out-of-band,
//! never interpolated into the function body text — a quote or backslash
//! in an argument can never break out of the function body, because it
//! never becomes part of the body text.

use std::sync::Arc;
use std::time::Instant;

use crate::error::{CdpError, ReasonCode, Result};
use crate::selectors::{ElementHandle, Locator, SelectorEngine};
use crate::session::Session;
use crate::waits::{WaitCondition, WaitEngine};

use super::types::{ActionResult, ActionType, Guard, IdempotentGuard};

const CLICK_JS: &str = r"function() {
    const r = this.getBoundingClientRect();
    const cx = r.left + r.width / 2;
    const cy = r.top + r.height / 2;
    const top = document.elementFromPoint(cx, cy);
    if (top !== this && !this.contains(top)) {
        return 'covered';
    }
    this.click();
    return 'ok';
}";
const DOUBLE_CLICK_JS: &str = "function() { this.dispatchEvent(new MouseEvent('dblclick', {bubbles: true})); this.click(); return 'ok'; }";
const RIGHT_CLICK_JS: &str = "function() { this.dispatchEvent(new MouseEvent('contextmenu', {bubbles: true})); return 'ok'; }";
const FOCUS_JS: &str = "function() { this.focus(); return 'ok'; }";
const BLUR_JS: &str = "function() { this.blur(); return 'ok'; }";
const CLEAR_JS: &str = r"function() {
    if ('value' in this) { this.value = ''; }
    else { this.textContent = ''; }
    this.dispatchEvent(new Event('input', {bubbles: true}));
    this.dispatchEvent(new Event('change', {bubbles: true}));
    return 'ok';
}";
const SET_VALUE_JS: &str = r"function(value) {
    const proto = Object.getPrototypeOf(this);
    const setter = Object.getOwnPropertyDescriptor(proto, 'value');
    if (setter && setter.set) { setter.set.call(this, value); } else { this.value = value; }
    this.dispatchEvent(new Event('input', {bubbles: true}));
    this.dispatchEvent(new Event('change', {bubbles: true}));
    return 'ok';
}";
const IS_CONTENTEDITABLE_JS: &str = "function() { return this.isContentEditable === true; }";
const VERIFY_TEXT_JS: &str = r"function(expected) {
    const actual = ('value' in this) ? this.value : this.textContent;
    return actual === expected;
}";
const SCROLL_INTO_VIEW_JS: &str = "function() { this.scrollIntoView({block: 'center', inline: 'center'}); return 'ok'; }";
const CENTER_POINT_JS: &str = r"function() {
    const r = this.getBoundingClientRect();
    return [r.left + r.width / 2, r.top + r.height / 2];
}";
const IS_CHECKED_JS: &str = "function() { return !!this.checked; }";
const SET_CHECKED_JS: &str = r"function(checked) {
    if (this.checked !== checked) { this.click(); }
    return 'ok';
}";

/// Executes verified actions against elements located by the selector
/// engine, honoring idempotent guards and pre/postconditions.
pub struct ActionExecutor {
    session: Arc<Session>,
    selectors: Arc<SelectorEngine>,
    waits: Arc<WaitEngine>,
}

impl ActionExecutor {
    #[must_use]
    pub fn new(session: Arc<Session>, selectors: Arc<SelectorEngine>, waits: Arc<WaitEngine>) -> Self {
        Self { session, selectors, waits }
    }

    async fn locate(&self, locator: &Locator) -> Result<ElementHandle> {
        self.selectors
            .find(locator)
            .await?
            .ok_or_else(|| CdpError::new(ReasonCode::ElementNotFound, format!("no match for {}", locator.description)))
    }

    async fn run_js_on(&self, handle: &ElementHandle, function_declaration: &str, args: &[serde_json::Value]) -> Result<serde_json::Value> {
        let object_id = handle
            .object_id
            .as_deref()
            .ok_or_else(|| CdpError::new(ReasonCode::ElementDetached, "element has no live object handle"))?;
        self.session.call_function_on(Some(object_id), function_declaration, args).await
    }

    /// Runs `guard` (if given) first; a passing guard short-circuits the
    /// whole action as already-done (failures in the guard itself are
    /// treated as "not done").
    async fn check_idempotent(&self, guard: Option<&IdempotentGuard>) -> bool {
        match guard {
            Some(guard) => guard.wait_until(&self.session).await,
            None => false,
        }
    }

    /// `postcondition`, when given, must hold (within its own timeout)
    /// before the click is declared successful. A passing
    /// `idempotent_guard` short-circuits before the postcondition is ever
    /// evaluated — the action is already done, so there's nothing left to
    /// verify.
    pub async fn click(
        &self,
        locator: &Locator,
        idempotent_guard: Option<&IdempotentGuard>,
        postcondition: Option<&Guard>,
    ) -> ActionResult {
        self.timed_with_postcondition(ActionType::Click, idempotent_guard, postcondition, locator, |this, handle| {
            Box::pin(async move {
                let precondition = this
                    .waits
                    .wait_for(WaitCondition::element_clickable(handle.locator.value.clone()), None, None)
                    .await;
                if !precondition.success {
                    return Err(CdpError::new(
                        precondition.reason,
                        precondition.message.unwrap_or_else(|| "element did not become clickable".to_string()),
                    ));
                }
                let outcome = this.run_js_on(&handle, CLICK_JS, &[]).await?;
                if outcome.as_str() == Some("covered") {
                    return Err(CdpError::new(ReasonCode::ElementCovered, "element covered by another node at its center point"));
                }
                Ok(())
            })
        })
        .await
    }

    pub async fn double_click(&self, locator: &Locator) -> ActionResult {
        self.timed(ActionType::DoubleClick, None, locator, |this, handle| {
            Box::pin(async move {
                this.run_js_on(&handle, DOUBLE_CLICK_JS, &[]).await?;
                Ok(())
            })
        })
        .await
    }

    pub async fn right_click(&self, locator: &Locator) -> ActionResult {
        self.timed(ActionType::RightClick, None, locator, |this, handle| {
            Box::pin(async move {
                this.run_js_on(&handle, RIGHT_CLICK_JS, &[]).await?;
                Ok(())
            })
        })
        .await
    }

    pub async fn focus(&self, locator: &Locator) -> ActionResult {
        self.timed(ActionType::Focus, None, locator, |this, handle| {
            Box::pin(async move {
                this.run_js_on(&handle, FOCUS_JS, &[]).await?;
                Ok(())
            })
        })
        .await
    }

    pub async fn blur(&self, locator: &Locator) -> ActionResult {
        self.timed(ActionType::Blur, None, locator, |this, handle| {
            Box::pin(async move {
                this.run_js_on(&handle, BLUR_JS, &[]).await?;
                Ok(())
            })
        })
        .await
    }

    pub async fn clear(&self, locator: &Locator) -> ActionResult {
        self.timed(ActionType::Clear, None, locator, |this, handle| {
            Box::pin(async move {
                this.run_js_on(&handle, CLEAR_JS, &[]).await?;
                Ok(())
            })
        })
        .await
    }

    /// Types `text` into the element, using `Input.insertText` for
    /// contenteditable hosts and a property-setter assignment otherwise,
    /// then verifies the element's value/text matches.
    pub async fn type_text(&self, locator: &Locator, text: &str) -> ActionResult {
        let text = text.to_string();
        self.timed(ActionType::Type, None, locator, move |this, handle| {
            let text = text.clone();
            Box::pin(async move {
                let precondition = this
                    .waits
                    .wait_for(WaitCondition::element_visible(handle.locator.value.clone()), None, None)
                    .await;
                if !precondition.success {
                    return Err(CdpError::new(
                        precondition.reason,
                        precondition.message.unwrap_or_else(|| "element did not become visible".to_string()),
                    ));
                }
                this.run_js_on(&handle, FOCUS_JS, &[]).await?;
                this.run_js_on(&handle, CLEAR_JS, &[]).await?;

                let contenteditable = this.run_js_on(&handle, IS_CONTENTEDITABLE_JS, &[]).await?;
                if contenteditable.as_bool() == Some(true) {
                    this.session
                        .send_command("Input.insertText", serde_json::json!({"text": text}))
                        .await?;
                } else {
                    this.run_js_on(&handle, SET_VALUE_JS, &[serde_json::Value::String(text.clone())]).await?;
                }

                let verified = this
                    .run_js_on(&handle, VERIFY_TEXT_JS, &[serde_json::Value::String(text.clone())])
                    .await?;
                if verified.as_bool() != Some(true) {
                    return Err(CdpError::new(ReasonCode::PostconditionFailed, "typed text did not verify"));
                }
                Ok(())
            })
        })
        .await
    }

    pub async fn select(&self, locator: &Locator, checked: bool) -> ActionResult {
        self.timed(ActionType::Select, None, locator, move |this, handle| {
            Box::pin(async move {
                this.run_js_on(&handle, SET_CHECKED_JS, &[serde_json::Value::Bool(checked)]).await?;
                let observed = this.run_js_on(&handle, IS_CHECKED_JS, &[]).await?;
                if observed.as_bool() != Some(checked) {
                    return Err(CdpError::new(ReasonCode::PostconditionFailed, "checked state did not verify"));
                }
                Ok(())
            })
        })
        .await
    }

    pub async fn check(&self, locator: &Locator) -> ActionResult {
        self.select(locator, true).await
    }

    pub async fn uncheck(&self, locator: &Locator) -> ActionResult {
        self.select(locator, false).await
    }

    pub async fn scroll_to(&self, locator: &Locator) -> ActionResult {
        self.timed(ActionType::ScrollTo, None, locator, |this, handle| {
            Box::pin(async move {
                let precondition = this
                    .waits
                    .wait_for(WaitCondition::element_exists(handle.locator.value.clone()), None, None)
                    .await;
                if !precondition.success {
                    return Err(CdpError::new(
                        precondition.reason,
                        precondition.message.unwrap_or_else(|| "element did not exist".to_string()),
                    ));
                }
                this.run_js_on(&handle, SCROLL_INTO_VIEW_JS, &[]).await?;
                tokio::time::sleep(std::time::Duration::from_millis(300)).await;
                Ok(())
            })
        })
        .await
    }

    pub async fn hover(&self, locator: &Locator) -> ActionResult {
        self.timed(ActionType::Hover, None, locator, |this, handle| {
            Box::pin(async move {
                let point = this.run_js_on(&handle, CENTER_POINT_JS, &[]).await?;
                let (x, y) = point
                    .as_array()
                    .and_then(|arr| Some((arr.first()?.as_f64()?, arr.get(1)?.as_f64()?)))
                    .ok_or_else(|| CdpError::new(ReasonCode::CdpProtocolError, "could not compute element center"))?;
                this.session
                    .send_command(
                        "Input.dispatchMouseEvent",
                        serde_json::json!({"type": "mouseMoved", "x": x, "y": y}),
                    )
                    .await?;
                Ok(())
            })
        })
        .await
    }

    /// Shared timing/idempotent-guard/error-to-result wrapper every action
    /// above funnels through. No postcondition phase.
    async fn timed<'a, F>(
        &'a self,
        action: ActionType,
        idempotent_guard: Option<&IdempotentGuard>,
        locator: &Locator,
        body: F,
    ) -> ActionResult
    where
        F: FnOnce(&'a Self, ElementHandle) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>>,
    {
        self.timed_with_postcondition(action, idempotent_guard, None, locator, body).await
    }

    /// Full four-phase contract: idempotency guard → precondition (inside
    /// `body`, via the wait engine) → execute (`body`) → postcondition.
    async fn timed_with_postcondition<'a, F>(
        &'a self,
        action: ActionType,
        idempotent_guard: Option<&IdempotentGuard>,
        postcondition: Option<&Guard>,
        locator: &Locator,
        body: F,
    ) -> ActionResult
    where
        F: FnOnce(&'a Self, ElementHandle) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>>,
    {
        let start = Instant::now();
        if self.check_idempotent(idempotent_guard).await {
            return ActionResult::skipped(action, start.elapsed().as_millis() as u64);
        }

        let handle = match self.locate(locator).await {
            Ok(handle) => handle,
            Err(e) => return ActionResult::failure(action, e.code, start.elapsed().as_millis() as u64, e.to_string()),
        };

        if let Err(e) = body(self, handle).await {
            return ActionResult::failure(action, e.code, start.elapsed().as_millis() as u64, e.to_string());
        }

        if let Some(postcondition) = postcondition
            && !postcondition.wait_until(&self.session).await
        {
            return ActionResult::failure(
                action,
                ReasonCode::PostconditionFailed,
                start.elapsed().as_millis() as u64,
                format!("postcondition did not hold: {}", postcondition.description),
            );
        }

        ActionResult::success(action, start.elapsed().as_millis() as u64)
    }
}
