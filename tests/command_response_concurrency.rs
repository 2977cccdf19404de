//! Every in-flight `Session::send_command` call must resolve with the
//! response matching its own id, even when the mock server answers out
//! of the order the commands were sent in.

mod common;

use std::sync::Arc;

use cdp_remote::config::SessionConfig;
use cdp_remote::event_bus::EventBus;
use cdp_remote::session::Session;

#[tokio::test]
async fn concurrent_commands_match_responses_despite_out_of_order_delivery() {
    let server = common::start_mock_server(|method, params| {
        if method.ends_with(".enable") {
            return common::empty_ok();
        }
        if method == "Test.echo" {
            let n = params.get("n").and_then(serde_json::Value::as_u64).unwrap_or(0);
            // Deliberately invert the delay so higher n finishes sooner,
            // forcing responses to arrive in a different order than sent.
            let delay = (20 - (n % 20)) * 2;
            return (delay, serde_json::json!({"result": {"echoed": n}}));
        }
        common::empty_ok()
    })
    .await;

    let config = SessionConfig { ws_url: Some(server.ws_url.clone()), auto_reconnect: false, ..Default::default() };
    let events = Arc::new(EventBus::new(64));
    let session = Session::new(config, events);
    session.connect().await.expect("mock server connect");

    let mut handles = Vec::new();
    for n in 0..20u64 {
        let session = Arc::clone(&session);
        handles.push(tokio::spawn(async move {
            let result = session.send_command("Test.echo", serde_json::json!({"n": n})).await.unwrap();
            (n, result)
        }));
    }

    for handle in handles {
        let (n, result) = handle.await.unwrap();
        assert_eq!(result.get("echoed").and_then(serde_json::Value::as_u64), Some(n), "command {n} got a mismatched response");
    }

    session.close().await;
}
