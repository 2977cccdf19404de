//! Wait Engine: stability-window polling for DOM/layout/custom
//! conditions, plus network-idle and navigation waits.
//!
//! Condition checks use [`Session::call_function_on`] with the selector
//! passed as a structured argument instead of a string-interpolated
//! `document.querySelector('{selector}')`.

mod network;
mod types;

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::config::WaitConfig;
use crate::error::ReasonCode;
use crate::session::Session;

pub use types::{ConditionType, WaitCondition, WaitResult};

const ELEMENT_EXISTS_JS: &str = "function(sel) { return !!document.querySelector(sel); }";
const ELEMENT_VISIBLE_JS: &str = r"function(sel) {
    const el = document.querySelector(sel);
    if (!el) return false;
    const r = el.getBoundingClientRect();
    const style = getComputedStyle(el);
    return r.width > 0 && r.height > 0 && style.visibility !== 'hidden' && style.display !== 'none';
}";
const ELEMENT_CLICKABLE_JS: &str = r"function(sel) {
    const el = document.querySelector(sel);
    if (!el) return false;
    const r = el.getBoundingClientRect();
    if (r.width === 0 || r.height === 0) return false;
    const style = getComputedStyle(el);
    if (style.visibility === 'hidden' || style.display === 'none') return false;
    if (el.disabled) return false;
    const cx = r.left + r.width / 2;
    const cy = r.top + r.height / 2;
    const top = document.elementFromPoint(cx, cy);
    return top === el || el.contains(top);
}";
const ELEMENT_HIDDEN_JS: &str = r"function(sel) {
    const el = document.querySelector(sel);
    if (!el) return true;
    const r = el.getBoundingClientRect();
    const style = getComputedStyle(el);
    return r.width === 0 || r.height === 0 || style.visibility === 'hidden' || style.display === 'none';
}";
const LAYOUT_RECT_JS: &str = r"function(sel) {
    const el = document.querySelector(sel);
    if (!el) return null;
    const r = el.getBoundingClientRect();
    return [r.left, r.top, r.width, r.height];
}";
const ELEMENT_ENABLED_JS: &str = r"function(sel) {
    const el = document.querySelector(sel);
    return !!el && !el.disabled;
}";
const TEXT_PRESENT_JS: &str = r"function(sel, text) {
    const el = document.querySelector(sel);
    return !!el && (el.textContent || '').trim().includes(text);
}";
const ATTRIBUTE_EQUALS_JS: &str = r"function(sel, attr, value) {
    const el = document.querySelector(sel);
    return !!el && el.getAttribute(attr) === value;
}";
const ATTRIBUTE_CONTAINS_JS: &str = r"function(sel, attr, value) {
    const el = document.querySelector(sel);
    const actual = el ? el.getAttribute(attr) : null;
    return actual !== null && actual !== undefined && actual.includes(value);
}";
const DOCUMENT_READY_JS: &str = "function() { return document.readyState === 'complete'; }";

/// Polls a condition until it has held continuously for the configured
/// stability window, or the deadline passes.
pub struct WaitEngine {
    session: Arc<Session>,
    config: WaitConfig,
}

impl WaitEngine {
    #[must_use]
    pub fn new(session: Arc<Session>, config: WaitConfig) -> Self {
        Self { session, config }
    }

    async fn check(&self, condition: &WaitCondition) -> bool {
        let result = match condition.kind {
            ConditionType::ElementExists => {
                self.session
                    .call_function_on(None, ELEMENT_EXISTS_JS, &[selector_arg(condition)])
                    .await
            }
            ConditionType::ElementVisible => {
                self.session
                    .call_function_on(None, ELEMENT_VISIBLE_JS, &[selector_arg(condition)])
                    .await
            }
            ConditionType::ElementClickable => {
                self.session
                    .call_function_on(None, ELEMENT_CLICKABLE_JS, &[selector_arg(condition)])
                    .await
            }
            ConditionType::ElementHidden => {
                self.session
                    .call_function_on(None, ELEMENT_HIDDEN_JS, &[selector_arg(condition)])
                    .await
            }
            ConditionType::ElementEnabled => {
                self.session
                    .call_function_on(None, ELEMENT_ENABLED_JS, &[selector_arg(condition)])
                    .await
            }
            ConditionType::TextPresent => {
                let text = condition.text.clone().unwrap_or_default();
                self.session
                    .call_function_on(
                        None,
                        TEXT_PRESENT_JS,
                        &[selector_arg(condition), serde_json::Value::String(text)],
                    )
                    .await
            }
            ConditionType::TextAbsent => {
                let text = condition.text.clone().unwrap_or_default();
                let present = self
                    .session
                    .call_function_on(
                        None,
                        TEXT_PRESENT_JS,
                        &[selector_arg(condition), serde_json::Value::String(text)],
                    )
                    .await;
                return !matches!(present, Ok(serde_json::Value::Bool(true)));
            }
            ConditionType::AttributeEquals => {
                let attr = condition.attribute.clone().unwrap_or_default();
                let value = condition.value.clone().unwrap_or_default();
                self.session
                    .call_function_on(
                        None,
                        ATTRIBUTE_EQUALS_JS,
                        &[
                            selector_arg(condition),
                            serde_json::Value::String(attr),
                            serde_json::Value::String(value),
                        ],
                    )
                    .await
            }
            ConditionType::AttributeContains => {
                let attr = condition.attribute.clone().unwrap_or_default();
                let value = condition.value.clone().unwrap_or_default();
                self.session
                    .call_function_on(
                        None,
                        ATTRIBUTE_CONTAINS_JS,
                        &[
                            selector_arg(condition),
                            serde_json::Value::String(attr),
                            serde_json::Value::String(value),
                        ],
                    )
                    .await
            }
            ConditionType::UrlContains => {
                let needle = condition.value.clone().unwrap_or_default();
                return self
                    .session
                    .get_current_url()
                    .await
                    .is_ok_and(|url| url.contains(&needle));
            }
            ConditionType::UrlMatches => {
                let Some(pattern) = condition.pattern.as_deref() else {
                    return false;
                };
                let Ok(re) = regex::Regex::new(pattern) else {
                    return false;
                };
                return self
                    .session
                    .get_current_url()
                    .await
                    .is_ok_and(|url| re.is_match(&url));
            }
            ConditionType::TitleContains => {
                let needle = condition.value.clone().unwrap_or_default();
                return self
                    .session
                    .evaluate_js("document.title")
                    .await
                    .ok()
                    .and_then(|v| v.as_str().map(|s| s.contains(&needle)))
                    .unwrap_or(false);
            }
            ConditionType::DocumentReady => {
                self.session.call_function_on(None, DOCUMENT_READY_JS, &[]).await
            }
            ConditionType::PageLoaded => {
                self.session.call_function_on(None, DOCUMENT_READY_JS, &[]).await
            }
            ConditionType::NetworkIdle | ConditionType::NoPendingRequests => {
                return self.session.events().pending_requests().is_empty();
            }
            ConditionType::JsExpression => {
                let expr = condition.expression.as_deref().unwrap_or("false");
                self.session.evaluate_js(expr).await
            }
            ConditionType::LayoutStable => return self.check_layout_stable(condition).await,
        };
        matches!(result, Ok(serde_json::Value::Bool(true)))
    }

    async fn check_layout_stable(&self, condition: &WaitCondition) -> bool {
        // Two consecutive rect reads within 2px on every axis. No
        // compositor-animation API is consulted.
        let Ok(first) = self
            .session
            .call_function_on(None, LAYOUT_RECT_JS, &[selector_arg(condition)])
            .await
        else {
            return false;
        };
        tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)).await;
        let Ok(second) = self
            .session
            .call_function_on(None, LAYOUT_RECT_JS, &[selector_arg(condition)])
            .await
        else {
            return false;
        };
        rects_close(&first, &second)
    }

    /// Poll `condition` until it has been continuously true for
    /// `stability_ms` (defaulting to the configured stability window), or
    /// `timeout_ms` (defaulting to the step timeout) elapses.
    pub async fn wait_for(
        &self,
        condition: WaitCondition,
        timeout_ms: Option<u64>,
        stability_ms: Option<u64>,
    ) -> WaitResult {
        let start = Instant::now();
        let timeout = Duration::from_millis(timeout_ms.unwrap_or(self.config.step_timeout_ms));
        let stability = Duration::from_millis(stability_ms.unwrap_or(self.config.stability_window_ms));
        let deadline = start + timeout;

        let mut stable_since: Option<Instant> = None;

        loop {
            let now = Instant::now();
            if self.check(&condition).await {
                let since = *stable_since.get_or_insert(now);
                if now.duration_since(since) >= stability {
                    return WaitResult::success(start.elapsed().as_millis() as u64);
                }
            } else {
                stable_since = None;
            }

            if Instant::now() >= deadline {
                return WaitResult::timeout(
                    failure_reason(condition.kind),
                    start.elapsed().as_millis() as u64,
                    format!("condition not met within {}ms", timeout.as_millis()),
                );
            }

            let jitter_ms: u64 = rand::rng().random_range(0..=self.config.poll_interval_ms.max(1) / 4);
            tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms) + Duration::from_millis(jitter_ms)).await;
        }
    }

    pub async fn wait_for_network_idle(&self, timeout_ms: Option<u64>, idle_ms: Option<u64>) -> WaitResult {
        network::wait_for_network_idle(
            &self.session,
            timeout_ms.unwrap_or(self.config.state_timeout_ms),
            idle_ms.unwrap_or(500),
        )
        .await
    }

    pub async fn wait_for_navigation(&self, timeout_ms: Option<u64>) -> WaitResult {
        network::wait_for_navigation(
            &self.session,
            timeout_ms.unwrap_or(self.config.state_timeout_ms),
        )
        .await
    }
}

fn selector_arg(condition: &WaitCondition) -> serde_json::Value {
    serde_json::Value::String(condition.selector.clone().unwrap_or_default())
}

fn failure_reason(kind: ConditionType) -> ReasonCode {
    match kind {
        ConditionType::ElementExists => ReasonCode::ElementNotFound,
        ConditionType::ElementVisible => ReasonCode::ElementNotVisible,
        ConditionType::ElementClickable => ReasonCode::ElementNotClickable,
        ConditionType::NetworkIdle | ConditionType::NoPendingRequests => ReasonCode::TimeoutNetwork,
        ConditionType::UrlContains
        | ConditionType::UrlMatches
        | ConditionType::TitleContains
        | ConditionType::PageLoaded => ReasonCode::NavigationTimeout,
        ConditionType::ElementEnabled
        | ConditionType::ElementHidden
        | ConditionType::TextPresent
        | ConditionType::TextAbsent
        | ConditionType::AttributeEquals
        | ConditionType::AttributeContains
        | ConditionType::DocumentReady
        | ConditionType::LayoutStable
        | ConditionType::JsExpression => ReasonCode::TimeoutStep,
    }
}

fn rects_close(a: &serde_json::Value, b: &serde_json::Value) -> bool {
    let (Some(a), Some(b)) = (a.as_array(), b.as_array()) else {
        return false;
    };
    if a.len() != 4 || b.len() != 4 {
        return false;
    }
    a.iter().zip(b.iter()).all(|(x, y)| {
        let (Some(x), Some(y)) = (x.as_f64(), y.as_f64()) else {
            return false;
        };
        (x - y).abs() <= 2.0
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rects_within_tolerance_are_considered_stable() {
        let a = serde_json::json!([10.0, 10.0, 100.0, 40.0]);
        let b = serde_json::json!([11.0, 10.5, 101.0, 40.0]);
        assert!(rects_close(&a, &b));
    }

    #[test]
    fn rects_outside_tolerance_are_not_stable() {
        let a = serde_json::json!([10.0, 10.0, 100.0, 40.0]);
        let b = serde_json::json!([20.0, 10.0, 100.0, 40.0]);
        assert!(!rects_close(&a, &b));
    }

    #[test]
    fn failure_reason_matches_condition() {
        assert_eq!(failure_reason(ConditionType::ElementVisible), ReasonCode::ElementNotVisible);
        assert_eq!(failure_reason(ConditionType::ElementClickable), ReasonCode::ElementNotClickable);
    }
}
