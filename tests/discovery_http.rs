//! `discover_ws_url` must pick the first `type == "page"` target that isn't
//! an internal `devtools://` page, and report `ReasonCode::NavigationFailed`
//! when `GET /json` has nothing usable.

use cdp_remote::error::ReasonCode;
use cdp_remote::transport::discover_ws_url;

fn port_of(server: &mockito::ServerGuard) -> u16 {
    server
        .host_with_port()
        .rsplit(':')
        .next()
        .and_then(|p| p.parse().ok())
        .expect("mockito server always binds to a concrete port")
}

#[tokio::test]
async fn picks_the_first_page_target_and_skips_devtools_internal_pages() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            serde_json::json!([
                {
                    "type": "page",
                    "url": "devtools://devtools/bundled/inspector.html",
                    "webSocketDebuggerUrl": "ws://127.0.0.1:0/devtools/page/internal"
                },
                {
                    "type": "page",
                    "url": "https://example.com/",
                    "webSocketDebuggerUrl": "ws://127.0.0.1:0/devtools/page/ABCDEF"
                },
                {
                    "type": "background_page",
                    "url": "https://example.com/extension",
                    "webSocketDebuggerUrl": "ws://127.0.0.1:0/devtools/page/other"
                }
            ])
            .to_string(),
        )
        .create_async()
        .await;

    let ws_url = discover_ws_url(port_of(&server), 5_000).await.expect("a page target exists");
    assert_eq!(ws_url, "ws://127.0.0.1:0/devtools/page/ABCDEF");
}

#[tokio::test]
async fn reports_navigation_failed_when_no_page_target_exists() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            serde_json::json!([
                {
                    "type": "background_page",
                    "url": "https://example.com/extension",
                    "webSocketDebuggerUrl": "ws://127.0.0.1:0/devtools/page/other"
                }
            ])
            .to_string(),
        )
        .create_async()
        .await;

    let err = discover_ws_url(port_of(&server), 5_000).await.expect_err("no page target is present");
    assert_eq!(err.code, ReasonCode::NavigationFailed);
}

#[tokio::test]
async fn reports_network_error_when_the_debugging_port_is_unreachable() {
    // Nothing is listening on this port: the request itself must fail to
    // connect, distinct from a reachable server returning a bad body.
    let err = discover_ws_url(1, 200).await.expect_err("port 1 is never a debugging port");
    assert!(matches!(err.code, ReasonCode::NetworkError | ReasonCode::ResponseError));
}
