//! End-to-end `Client::click_with_postcondition`: locate an element,
//! click it, then require a caller-supplied postcondition (the button's
//! `aria-label` flipping from "Like" to "Unlike") to hold before the
//! action is reported successful.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cdp_remote::actions::Guard;
use cdp_remote::client::Client;
use cdp_remote::config::ClientConfig;
use cdp_remote::error::ReasonCode;
use cdp_remote::selectors::by_css;

#[tokio::test]
async fn click_waits_for_postcondition_before_reporting_success() {
    let aria_calls = Arc::new(AtomicU64::new(0));
    let counted = Arc::clone(&aria_calls);

    let server = common::start_mock_server(move |method, params| {
        match method {
            m if m.ends_with(".enable") => common::empty_ok(),
            "Target.setDiscoverTargets" | "Target.setAutoAttach" => common::empty_ok(),
            "Target.getTargets" => (0, serde_json::json!({"result": {"targetInfos": []}})),
            "DOM.getDocument" => (0, serde_json::json!({"result": {"root": {"nodeId": 1}}})),
            "DOM.querySelector" => (0, serde_json::json!({"result": {"nodeId": 42}})),
            "DOM.resolveNode" => (0, serde_json::json!({"result": {"object": {"objectId": "node-42"}}})),
            "Runtime.evaluate" => {
                let expr = params.get("expression").and_then(serde_json::Value::as_str).unwrap_or("");
                if expr == "window" {
                    (0, serde_json::json!({"result": {"result": {"objectId": "window-1"}}}))
                } else if expr.contains("aria-label") {
                    let n = counted.fetch_add(1, Ordering::SeqCst);
                    let label = if n < 2 { "Like" } else { "Unlike" };
                    (0, serde_json::json!({"result": {"result": {"value": label}}}))
                } else {
                    (0, serde_json::json!({"result": {"result": {"value": serde_json::Value::Null}}}))
                }
            }
            "Runtime.callFunctionOn" => {
                let decl = params.get("functionDeclaration").and_then(serde_json::Value::as_str).unwrap_or("");
                if decl.contains("el.disabled") {
                    // element-clickable check: always true, so the wait
                    // engine's stability window is the only delay.
                    (0, serde_json::json!({"result": {"result": {"value": true}}}))
                } else if decl.contains("this.click()") {
                    (0, serde_json::json!({"result": {"result": {"value": "ok"}}}))
                } else {
                    (0, serde_json::json!({"result": {"result": {"value": serde_json::Value::Null}}}))
                }
            }
            _ => common::empty_ok(),
        }
    })
    .await;

    let config = ClientConfig::builder()
        .ws_url(server.ws_url.clone())
        .auto_reconnect(false)
        .poll_interval_ms(20)
        .stability_window_ms(40)
        .step_timeout_ms(2_000)
        .build();

    let client = Client::new(config);
    client.connect().await.expect("mock server connect");

    let locator = by_css("button.like");
    let postcondition = Guard::new(
        "aria-label flips from Like to Unlike",
        ReasonCode::PostconditionFailed,
        2_000,
        |session| {
            Box::pin(async move {
                session
                    .evaluate_js("document.querySelector('button.like').getAttribute('aria-label')")
                    .await
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_owned))
                    .as_deref()
                    == Some("Unlike")
            })
        },
    );

    let result = client.click_with_postcondition(&locator, &postcondition).await;

    assert!(result.success, "click with postcondition should have succeeded: {result:?}");
    assert!(aria_calls.load(Ordering::SeqCst) >= 2, "postcondition should have polled at least twice before flipping");

    client.close().await;
}

#[tokio::test]
async fn click_fails_when_postcondition_never_holds() {
    let server = common::start_mock_server(|method, params| {
        match method {
            m if m.ends_with(".enable") => common::empty_ok(),
            "Target.setDiscoverTargets" | "Target.setAutoAttach" => common::empty_ok(),
            "Target.getTargets" => (0, serde_json::json!({"result": {"targetInfos": []}})),
            "DOM.getDocument" => (0, serde_json::json!({"result": {"root": {"nodeId": 1}}})),
            "DOM.querySelector" => (0, serde_json::json!({"result": {"nodeId": 42}})),
            "DOM.resolveNode" => (0, serde_json::json!({"result": {"object": {"objectId": "node-42"}}})),
            "Runtime.evaluate" => {
                let expr = params.get("expression").and_then(serde_json::Value::as_str).unwrap_or("");
                if expr == "window" {
                    (0, serde_json::json!({"result": {"result": {"objectId": "window-1"}}}))
                } else {
                    (0, serde_json::json!({"result": {"result": {"value": "Like"}}}))
                }
            }
            "Runtime.callFunctionOn" => {
                let decl = params.get("functionDeclaration").and_then(serde_json::Value::as_str).unwrap_or("");
                if decl.contains("el.disabled") {
                    (0, serde_json::json!({"result": {"result": {"value": true}}}))
                } else if decl.contains("this.click()") {
                    (0, serde_json::json!({"result": {"result": {"value": "ok"}}}))
                } else {
                    (0, serde_json::json!({"result": {"result": {"value": serde_json::Value::Null}}}))
                }
            }
            _ => common::empty_ok(),
        }
    })
    .await;

    let config = ClientConfig::builder()
        .ws_url(server.ws_url.clone())
        .auto_reconnect(false)
        .poll_interval_ms(20)
        .stability_window_ms(40)
        .build();

    let client = Client::new(config);
    client.connect().await.expect("mock server connect");

    let locator = by_css("button.like");
    let postcondition = Guard::new(
        "aria-label becomes Unlike",
        ReasonCode::PostconditionFailed,
        150,
        |session| {
            Box::pin(async move {
                session
                    .evaluate_js("document.querySelector('button.like').getAttribute('aria-label')")
                    .await
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_owned))
                    .as_deref()
                    == Some("Unlike")
            })
        },
    );

    let result = client.click_with_postcondition(&locator, &postcondition).await;

    assert!(!result.success);
    assert_eq!(result.reason, ReasonCode::PostconditionFailed);

    client.close().await;
}
