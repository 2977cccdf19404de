//! A `JsExpression` wait must not report success the first instant the
//! condition is observed true; it has to hold continuously across the
//! configured stability window first.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use cdp_remote::config::{SessionConfig, WaitConfig};
use cdp_remote::event_bus::EventBus;
use cdp_remote::session::Session;
use cdp_remote::waits::{WaitCondition, WaitEngine};

#[tokio::test]
async fn condition_must_hold_through_the_full_stability_window() {
    let poll_count = Arc::new(AtomicU64::new(0));
    let counted = Arc::clone(&poll_count);

    let server = common::start_mock_server(move |method, _params| {
        if method.ends_with(".enable") {
            return common::empty_ok();
        }
        if method == "Runtime.evaluate" {
            // Flip true/false on alternating polls for the first several
            // checks, then settle true — the engine must reset its
            // stability timer on every false observation.
            let n = counted.fetch_add(1, Ordering::SeqCst);
            let value = n >= 3;
            return (0, serde_json::json!({"result": {"result": {"value": value}}}));
        }
        common::empty_ok()
    })
    .await;

    let config = SessionConfig { ws_url: Some(server.ws_url.clone()), auto_reconnect: false, ..Default::default() };
    let events = Arc::new(EventBus::new(64));
    let session = Session::new(config, events);
    session.connect().await.expect("mock server connect");

    let wait_config = WaitConfig { poll_interval_ms: 30, stability_window_ms: 120, step_timeout_ms: 5_000, ..WaitConfig::default() };
    let engine = WaitEngine::new(Arc::clone(&session), wait_config);

    let start = Instant::now();
    let result = engine.wait_for(WaitCondition::js_expression("document.readyState === 'complete'"), None, None).await;
    let elapsed = start.elapsed();

    assert!(result.success, "expected the condition to eventually stabilize: {result:?}");
    // At minimum the full stability window must elapse after the value
    // turns true at poll index 3 before success is reported.
    assert!(elapsed.as_millis() >= 120, "reported success before the stability window elapsed: {elapsed:?}");

    session.close().await;
}

#[tokio::test]
async fn condition_that_never_holds_times_out_with_the_right_reason() {
    let server = common::start_mock_server(|method, _params| {
        if method.ends_with(".enable") {
            return common::empty_ok();
        }
        if method == "Runtime.evaluate" {
            return (0, serde_json::json!({"result": {"result": {"value": false}}}));
        }
        common::empty_ok()
    })
    .await;

    let config = SessionConfig { ws_url: Some(server.ws_url.clone()), auto_reconnect: false, ..Default::default() };
    let events = Arc::new(EventBus::new(64));
    let session = Session::new(config, events);
    session.connect().await.expect("mock server connect");

    let wait_config = WaitConfig { poll_interval_ms: 20, stability_window_ms: 50, step_timeout_ms: 150, ..WaitConfig::default() };
    let engine = WaitEngine::new(Arc::clone(&session), wait_config);

    let result = engine.wait_for(WaitCondition::js_expression("false"), None, None).await;
    assert!(!result.success);

    session.close().await;
}
