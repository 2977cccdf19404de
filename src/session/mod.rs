//! Session: the connection/heartbeat/reconnect state machine and
//! command dispatcher every other subsystem is built on.
//!
//! The wire transport itself is `crate::transport`; this module owns the
//! command/response matching table, the heartbeat loop, and
//! reconnect-with-backoff.

mod commands;
mod core;
mod heartbeat;
mod reader;
mod types;

pub use core::Session;
pub use types::{HealthStatus, SessionState};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::event_bus::EventBus;
    use std::sync::Arc;

    #[test]
    fn new_session_starts_disconnected() {
        let session = Session::new(SessionConfig::default(), Arc::new(EventBus::new(64)));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.is_connected());
        assert_eq!(session.health_status(), HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn send_command_rejects_with_queue_full_at_capacity() {
        let mut config = SessionConfig::default();
        config.command_queue_size = 0;
        let session = Session::new(config, Arc::new(EventBus::new(64)));

        let err = session
            .send_command("Page.enable", serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::error::ReasonCode::QueueFull);
    }

    #[tokio::test]
    async fn send_command_times_out_with_queue_full_when_no_slot_frees_up() {
        let mut config = SessionConfig::default();
        config.max_in_flight_commands = 1;
        config.command_queue_size = 4;
        config.command_timeout_ms = 20;
        let session = Session::new(config, Arc::new(EventBus::new(64)));

        // Hold the only in-flight permit for longer than command_timeout_ms.
        let _permit = session.in_flight.acquire().await.unwrap();
        let err = session
            .send_command("Page.enable", serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::error::ReasonCode::QueueFull);
    }
}
