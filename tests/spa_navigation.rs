//! `NavigationManager::navigate_spa` must wait for a URL pattern match,
//! network idle, and loading-indicator clearance rather than a full page
//! load, since an SPA route change never fires `Page.loadEventFired`.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cdp_remote::config::{SessionConfig, WaitConfig};
use cdp_remote::error::ReasonCode;
use cdp_remote::event_bus::EventBus;
use cdp_remote::navigation::{NavigationManager, NavigationType, SpaConfig};
use cdp_remote::session::Session;
use cdp_remote::waits::WaitEngine;

fn spa_config() -> SpaConfig {
    SpaConfig {
        loading_indicators: vec!["[data-loading]".into()],
        route_settle_ms: 10,
        data_fetch_timeout_ms: 500,
        render_stable_ms: 10,
    }
}

#[tokio::test]
async fn spa_route_change_succeeds_once_url_and_loading_indicator_settle() {
    let url_calls = Arc::new(AtomicU64::new(0));
    let counted = Arc::clone(&url_calls);

    let server = common::start_mock_server(move |method, params| {
        match method {
            m if m.ends_with(".enable") => common::empty_ok(),
            "Runtime.evaluate" => {
                let expr = params.get("expression").and_then(serde_json::Value::as_str).unwrap_or("");
                if expr == "window.location.href" {
                    let n = counted.fetch_add(1, Ordering::SeqCst);
                    let url = if n < 2 { "https://app.example/home" } else { "https://app.example/settings" };
                    (0, serde_json::json!({"result": {"result": {"value": url}}}))
                } else if expr.contains("data-loading") {
                    // loading indicator never present: SPA content is already rendered
                    (0, serde_json::json!({"result": {"result": {"value": false}}}))
                } else {
                    (0, serde_json::json!({"result": {"result": {"value": serde_json::Value::Null}}}))
                }
            }
            "Runtime.callFunctionOn" => {
                // network-idle probe and anything else resolved against `window`
                (0, serde_json::json!({"result": {"result": {"objectId": "window-1"}}}))
            }
            _ => common::empty_ok(),
        }
    })
    .await;

    let config = SessionConfig { ws_url: Some(server.ws_url.clone()), auto_reconnect: false, ..Default::default() };
    let events = Arc::new(EventBus::new(64));
    let session = Session::new(config, events);
    session.connect().await.expect("mock server connect");

    let wait_config = WaitConfig { poll_interval_ms: 10, stability_window_ms: 10, state_timeout_ms: 2_000, ..WaitConfig::default() };
    let waits = Arc::new(WaitEngine::new(Arc::clone(&session), wait_config));
    let navigation = NavigationManager::new(Arc::clone(&session), waits, spa_config());

    let result = navigation
        .navigate_spa(
            || async { Ok(()) },
            Some("settings"),
            2_000,
        )
        .await;

    assert!(result.success, "SPA navigation should have succeeded: {result:?}");
    assert_eq!(result.navigation_type, NavigationType::SpaRoute);
    assert!(result.is_spa);
    assert!(result.end_url.contains("settings"));

    session.close().await;
}

#[tokio::test]
async fn spa_route_change_fails_when_url_pattern_never_matches() {
    let server = common::start_mock_server(|method, params| {
        match method {
            m if m.ends_with(".enable") => common::empty_ok(),
            "Runtime.evaluate" => {
                let expr = params.get("expression").and_then(serde_json::Value::as_str).unwrap_or("");
                if expr == "window.location.href" {
                    (0, serde_json::json!({"result": {"result": {"value": "https://app.example/home"}}}))
                } else {
                    (0, serde_json::json!({"result": {"result": {"value": serde_json::Value::Null}}}))
                }
            }
            _ => common::empty_ok(),
        }
    })
    .await;

    let config = SessionConfig { ws_url: Some(server.ws_url.clone()), auto_reconnect: false, ..Default::default() };
    let events = Arc::new(EventBus::new(64));
    let session = Session::new(config, events);
    session.connect().await.expect("mock server connect");

    let wait_config = WaitConfig { poll_interval_ms: 10, stability_window_ms: 10, ..WaitConfig::default() };
    let waits = Arc::new(WaitEngine::new(Arc::clone(&session), wait_config));
    let navigation = NavigationManager::new(Arc::clone(&session), waits, spa_config());

    let result = navigation.navigate_spa(|| async { Ok(()) }, Some("settings"), 200).await;

    assert!(!result.success);
    assert_eq!(result.reason, Some(ReasonCode::SpaNotReady));

    session.close().await;
}
