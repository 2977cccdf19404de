//! Network-idle and navigation waits, driven by the event bus rather
//! than polling.

use std::time::{Duration, Instant};

use tokio::time::sleep;

use crate::error::ReasonCode;
use crate::session::Session;

use super::types::WaitResult;

/// Waits until no `Network.requestWillBeSent` without a matching
/// `Network.loadingFinished`/`Network.loadingFailed` has been outstanding
/// for at least `idle_ms`, or `timeout_ms` elapses.
pub(super) async fn wait_for_network_idle(session: &Session, timeout_ms: u64, idle_ms: u64) -> WaitResult {
    let start = Instant::now();
    let deadline = start + Duration::from_millis(timeout_ms);

    let mut sent = session.events().on("Network.requestWillBeSent");
    let mut finished = session.events().on("Network.loadingFinished");
    let mut failed = session.events().on("Network.loadingFailed");

    // Requests already in flight before this wait was called are invisible
    // to the subscriptions above (they fire only on events observed from
    // here on); seed the counter from the history-derived set so they still
    // count against idleness.
    let mut in_flight: usize = session.events().pending_requests().len();
    let mut last_activity = Instant::now();

    loop {
        let idle_for = Instant::now().duration_since(last_activity);
        if in_flight == 0 && idle_for >= Duration::from_millis(idle_ms) {
            return WaitResult::success(start.elapsed().as_millis() as u64);
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return WaitResult::timeout(
                ReasonCode::TimeoutNetwork,
                start.elapsed().as_millis() as u64,
                format!("{in_flight} request(s) still in flight after {timeout_ms}ms"),
            );
        }

        let tick = Duration::from_millis(idle_ms).min(remaining);
        tokio::select! {
            Some(_) = sent.recv() => {
                in_flight += 1;
                last_activity = Instant::now();
            }
            Some(_) = finished.recv() => {
                in_flight = in_flight.saturating_sub(1);
                last_activity = Instant::now();
            }
            Some(_) = failed.recv() => {
                in_flight = in_flight.saturating_sub(1);
                last_activity = Instant::now();
            }
            () = sleep(tick) => {}
        }
    }
}

/// Waits for `Page.loadEventFired` (full load) or a `Page.frameNavigated`
/// for the main frame; either one satisfies the wait.
pub(super) async fn wait_for_navigation(session: &Session, timeout_ms: u64) -> WaitResult {
    let start = Instant::now();
    let mut load_fired = session.events().on("Page.loadEventFired");
    let mut frame_navigated = session.events().on("Page.frameNavigated");

    let outcome = tokio::time::timeout(Duration::from_millis(timeout_ms), async {
        tokio::select! {
            Some(_) = load_fired.recv() => {}
            Some(_) = frame_navigated.recv() => {}
        }
    })
    .await;

    match outcome {
        Ok(()) => WaitResult::success(start.elapsed().as_millis() as u64),
        Err(_) => WaitResult::timeout(
            ReasonCode::NavigationTimeout,
            start.elapsed().as_millis() as u64,
            format!("no navigation observed within {timeout_ms}ms"),
        ),
    }
}
