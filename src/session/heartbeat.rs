//! Periodic liveness probe. Escalates to reconnect (or gives up) once
//! `max_heartbeat_failures` consecutive probes fail.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::core::Session;

pub(super) fn spawn(session: Arc<Session>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(session.config.heartbeat_interval_ms)).await;

            if matches!(
                session.state(),
                super::types::SessionState::Closed
                    | super::types::SessionState::Closing
                    | super::types::SessionState::Failed
            ) {
                break;
            }

            let probe = tokio::time::timeout(
                Duration::from_millis(session.config.heartbeat_timeout_ms),
                session.evaluate_js("true"),
            )
            .await;

            match probe {
                Ok(Ok(_)) => {
                    session.heartbeat_failures.store(0, Ordering::Relaxed);
                }
                _ => {
                    let failures = session.heartbeat_failures.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::warn!(failures, "heartbeat probe failed");
                    if failures >= session.config.max_heartbeat_failures {
                        if session.config.auto_reconnect {
                            if session.reconnect().await.is_err() {
                                tracing::error!("session reconnect exhausted, giving up");
                                break;
                            }
                        } else {
                            session.set_state(super::types::SessionState::Disconnected);
                            break;
                        }
                    }
                }
            }
        }
    })
}
