//! Event Bus: typed pub/sub over CDP events with bounded replay history
//! and race-free waiters.
//!
//! Backed by a [`parking_lot::Mutex`]-guarded ring buffer plus waiter
//! slots rather than `tokio::sync::broadcast` — a waiter must be able to
//! register and then see an event published a moment later without a
//! lagged/dropped-receiver race.

mod core;
mod metrics;
mod publishing;
mod subscription;
mod types;

pub use core::EventBus;
pub use metrics::{EventBusMetrics, EventBusMetricsSnapshot};
pub use types::CdpEvent;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn wait_for_sees_event_published_after_registration() {
        let bus = EventBus::new(16);
        let wait = bus.wait_for("Page.loadEventFired", |_| true, Duration::from_secs(1));
        let publish = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            bus.publish(CdpEvent::new("Page.loadEventFired", serde_json::json!({})));
        };
        let (got, ()) = tokio::join!(wait, publish);
        assert!(got.is_some());
    }

    #[tokio::test]
    async fn wait_for_replays_an_already_published_event() {
        let bus = EventBus::new(16);
        bus.publish(CdpEvent::new("Page.loadEventFired", serde_json::json!({})));
        let got = bus
            .wait_for("Page.loadEventFired", |_| true, Duration::from_millis(50))
            .await;
        assert!(got.is_some());
    }

    #[tokio::test]
    async fn wait_for_times_out_when_predicate_never_matches() {
        let bus = EventBus::new(16);
        let got = bus
            .wait_for("Page.loadEventFired", |_| false, Duration::from_millis(20))
            .await;
        assert!(got.is_none());
        assert_eq!(bus.metrics().snapshot().waiters_timed_out, 1);
    }

    #[tokio::test]
    async fn subscribe_once_delivers_only_the_first_matching_event() {
        let bus = EventBus::new(16);
        let rx = bus.subscribe_once("Page.loadEventFired");
        bus.publish(CdpEvent::new("Page.loadEventFired", serde_json::json!({"n": 1})));
        bus.publish(CdpEvent::new("Page.loadEventFired", serde_json::json!({"n": 2})));
        let event = rx.await.unwrap();
        assert_eq!(event.params.get("n").and_then(|v| v.as_i64()), Some(1));
    }

    #[tokio::test]
    async fn wait_any_resolves_on_whichever_method_fires_first() {
        let bus = EventBus::new(16);
        let wait = bus.wait_any(
            &["Page.loadEventFired", "Page.frameNavigated"],
            |_| true,
            Duration::from_secs(1),
        );
        let publish = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            bus.publish(CdpEvent::new("Page.frameNavigated", serde_json::json!({})));
        };
        let (got, ()) = tokio::join!(wait, publish);
        assert_eq!(got.unwrap().method, "Page.frameNavigated");
    }

    #[tokio::test]
    async fn wait_any_replays_an_already_published_event() {
        let bus = EventBus::new(16);
        bus.publish(CdpEvent::new("Page.loadEventFired", serde_json::json!({})));
        let got = bus
            .wait_any(&["Page.loadEventFired", "Page.frameNavigated"], |_| true, Duration::from_millis(50))
            .await;
        assert!(got.is_some());
    }

    #[tokio::test]
    async fn subscribers_receive_every_matching_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.on("Network.responseReceived");
        bus.publish(CdpEvent::new(
            "Network.responseReceived",
            serde_json::json!({"requestId": "1"}),
        ));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.field_str("requestId"), Some("1"));
    }

    #[test]
    fn history_eviction_drops_oldest_first() {
        let bus = EventBus::new(2);
        bus.publish(CdpEvent::new("A", serde_json::json!({})));
        bus.publish(CdpEvent::new("A", serde_json::json!({})));
        bus.publish(CdpEvent::new("A", serde_json::json!({})));
        assert_eq!(bus.buffer_len(), 2);
        assert_eq!(bus.metrics().snapshot().dropped, 1);
    }

    #[test]
    fn pending_requests_tracks_unfinished_ids_from_history() {
        let bus = EventBus::new(16);
        bus.publish(CdpEvent::new(
            "Network.requestWillBeSent",
            serde_json::json!({"requestId": "1"}),
        ));
        bus.publish(CdpEvent::new(
            "Network.requestWillBeSent",
            serde_json::json!({"requestId": "2"}),
        ));
        bus.publish(CdpEvent::new(
            "Network.loadingFinished",
            serde_json::json!({"requestId": "1"}),
        ));
        let pending = bus.pending_requests();
        assert_eq!(pending.len(), 1);
        assert!(pending.contains("2"));
    }

    #[test]
    fn pending_requests_removes_failed_as_well_as_finished() {
        let bus = EventBus::new(16);
        bus.publish(CdpEvent::new(
            "Network.requestWillBeSent",
            serde_json::json!({"requestId": "1"}),
        ));
        bus.publish(CdpEvent::new(
            "Network.loadingFailed",
            serde_json::json!({"requestId": "1"}),
        ));
        assert!(bus.pending_requests().is_empty());
    }
}
