//! Demo CLI: connects to an already-running browser's debugging endpoint,
//! navigates to a URL, and reports the reason codes a real job would see.
//!
//! Not part of the library's public surface — a thin, runnable example of
//! `client::Client` for manual smoke-testing against a local Chrome started
//! with `--remote-debugging-port=9222`.

use std::env;

use cdp_remote::config::ClientConfig;
use cdp_remote::navigation::WaitUntil;
use cdp_remote::Client;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let mut args = env::args().skip(1);
    let url = args.next().unwrap_or_else(|| "https://example.com".to_string());
    let remote_port: u16 = env::var("CDP_REMOTE_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(9222);

    let config = ClientConfig::builder().remote_port(remote_port).build();
    let client = Client::new(config);

    tracing::info!(remote_port, "connecting");
    client.connect().await?;

    tracing::info!(%url, "navigating");
    let result = client.navigate(&url, None, WaitUntil::Load).await;
    if result.success {
        tracing::info!(
            end_url = %result.end_url,
            elapsed_ms = result.elapsed_ms,
            is_spa = result.is_spa,
            "navigation complete"
        );
    } else {
        tracing::error!(
            reason = ?result.reason,
            message = ?result.message,
            "navigation failed"
        );
    }

    for target in client.list_targets() {
        tracing::info!(id = %target.target_id, url = %target.url, title = %target.title, "target");
    }

    client.close().await;
    Ok(())
}
