//! `Session` struct definition, construction and the connect sequence.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{oneshot, Mutex as AsyncMutex, Semaphore};
use tokio::task::JoinHandle;

use crate::concurrency::CommandThrottle;
use crate::config::SessionConfig;
use crate::error::{CdpError, ReasonCode, Result};
use crate::event_bus::EventBus;
use crate::transport::{self, WsSink};

use super::types::{HealthStatus, SessionState};

pub(super) type PendingMap = DashMap<u64, oneshot::Sender<serde_json::Value>>;

/// Connection, command dispatch, heartbeat and reconnect state machine
/// for one DevTools WebSocket connection.
///
/// The heartbeat and reader tasks are spawned with their `JoinHandle`
/// retained for clean shutdown.
pub struct Session {
    pub(super) config: SessionConfig,
    pub(super) state: SyncMutex<SessionState>,
    pub(super) sink: AsyncMutex<Option<WsSink>>,
    pub(super) pending: PendingMap,
    pub(super) next_id: AtomicU64,
    pub(super) in_flight: Semaphore,
    /// Count of callers currently waiting to acquire `in_flight`, bounded by
    /// `config.command_queue_size`; a caller arriving once this is already
    /// at capacity fails with `queue-full` immediately rather than queuing.
    pub(super) queue_depth: AtomicUsize,
    pub(super) events: Arc<EventBus>,
    pub(super) heartbeat_failures: AtomicU32,
    pub(super) current_url: SyncMutex<Option<String>>,
    pub(super) tasks: SyncMutex<Vec<JoinHandle<()>>>,
    pub(super) throttle: SyncMutex<Option<Arc<CommandThrottle>>>,
}

impl Session {
    #[must_use]
    pub fn new(config: SessionConfig, events: Arc<EventBus>) -> Arc<Self> {
        let in_flight = Semaphore::new(config.max_in_flight_commands.max(1));
        Arc::new(Self {
            config,
            state: SyncMutex::new(SessionState::Disconnected),
            sink: AsyncMutex::new(None),
            pending: DashMap::new(),
            next_id: AtomicU64::new(1),
            in_flight,
            queue_depth: AtomicUsize::new(0),
            events,
            heartbeat_failures: AtomicU32::new(0),
            current_url: SyncMutex::new(None),
            tasks: SyncMutex::new(Vec::new()),
            throttle: SyncMutex::new(None),
        })
    }

    #[must_use]
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Installs the command throttle every outbound command acquires
    /// before being written to the transport. Set once by the Client
    /// Facade after both subsystems are constructed; commands sent before
    /// this is called (e.g. during an early manual `connect`) are
    /// unthrottled.
    pub fn set_throttle(&self, throttle: Arc<CommandThrottle>) {
        *self.throttle.lock() = Some(throttle);
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(
            self.state(),
            SessionState::Connected
                | SessionState::Subscribing
                | SessionState::Ready
                | SessionState::Recovering
        )
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    pub(super) fn set_state(&self, state: SessionState) {
        *self.state.lock() = state;
    }

    /// Resolve the DevTools WebSocket URL: direct `ws_url` wins, otherwise
    /// discover it from `remote_port`.
    async fn resolve_ws_url(&self) -> Result<String> {
        if let Some(url) = &self.config.ws_url {
            return Ok(url.clone());
        }
        transport::discover_ws_url(self.config.remote_port, self.config.connect_timeout_ms).await
    }

    /// Connect, enable the configured CDP domains, and start the background
    /// reader loop plus (on first connect only) the heartbeat loop.
    pub async fn connect(self: &Arc<Self>) -> Result<()> {
        self.connect_inner().await?;

        if self.config.auto_reconnect {
            let heartbeat = super::heartbeat::spawn(Arc::clone(self));
            self.tasks.lock().push(heartbeat);
        }
        Ok(())
    }

    async fn connect_inner(self: &Arc<Self>) -> Result<()> {
        self.set_state(SessionState::Connecting);

        let mut attempt = 0u32;
        let ws_stream = loop {
            attempt += 1;
            let ws_url = self.resolve_ws_url().await?;
            match tokio::time::timeout(
                Duration::from_millis(self.config.connect_timeout_ms),
                transport::connect(&ws_url),
            )
            .await
            {
                Ok(Ok(stream)) => break stream,
                Ok(Err(e)) if attempt <= self.config.max_connect_retries => {
                    tracing::warn!(attempt, error = %e, "connect attempt failed, retrying");
                    tokio::time::sleep(Duration::from_millis(self.config.connect_retry_delay_ms))
                        .await;
                }
                Ok(Err(e)) => {
                    self.set_state(SessionState::Disconnected);
                    return Err(e);
                }
                Err(_) => {
                    if attempt <= self.config.max_connect_retries {
                        continue;
                    }
                    self.set_state(SessionState::Disconnected);
                    return Err(CdpError::new(
                        ReasonCode::TimeoutNetwork,
                        "connect timed out",
                    ));
                }
            }
        };

        let (sink, source) = transport::split(ws_stream);
        *self.sink.lock().await = Some(sink);
        self.set_state(SessionState::Connected);

        let reader = super::reader::spawn(Arc::clone(self), source);
        self.tasks.lock().push(reader);

        self.set_state(SessionState::Subscribing);
        for domain in self.config.subscribed_domains.clone() {
            let method = format!("{domain}.enable");
            if let Err(e) = self.send_command(&method, serde_json::json!({})).await {
                tracing::warn!(domain, error = %e, "failed to enable CDP domain");
            }
        }

        self.set_state(SessionState::Ready);

        tracing::info!(remote_port = self.config.remote_port, "session ready");
        Ok(())
    }

    /// Forces a fresh reconnect regardless of current state — the
    /// recovery manager's state-retry and recreate-context tiers drive this
    /// directly, since this crate models one session/target pair rather
    /// than separate browser contexts to recreate.
    pub async fn force_reconnect(self: &Arc<Self>) -> Result<()> {
        self.reconnect().await
    }

    /// Tear down the transport and reconnect from scratch, backing off
    /// `reconnect_delay_ms * reconnect_backoff_multiplier^attempt` (capped
    /// at `max_reconnect_delay_ms`) between attempts.
    pub(super) async fn reconnect(self: &Arc<Self>) -> Result<()> {
        self.set_state(SessionState::Reconnecting);
        if let Some(mut sink) = self.sink.lock().await.take() {
            use futures_util::SinkExt;
            let _ = sink.close().await;
        }
        self.set_state(SessionState::Recovering);

        let mut delay = self.config.reconnect_delay_ms;
        for attempt in 1..=self.config.max_reconnect_attempts.max(1) {
            match self.connect_inner().await {
                Ok(()) => {
                    self.heartbeat_failures.store(0, Ordering::Relaxed);
                    for domain in self.config.subscribed_domains.clone() {
                        tracing::debug!(domain, "re-enabled domain after reconnect");
                    }
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "reconnect attempt failed");
                    self.set_state(SessionState::Recovering);
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    delay = ((delay as f64) * self.config.reconnect_backoff_multiplier) as u64;
                    delay = delay.min(self.config.max_reconnect_delay_ms);
                }
            }
        }

        self.set_state(SessionState::Failed);
        Err(CdpError::new(
            ReasonCode::CdpReconnectFailed,
            "exhausted reconnect attempts",
        ))
    }

    /// Transport-loss / `Inspector.detached` disconnect path: emit a
    /// disconnected marker event, then reconnect if configured to, or settle
    /// into `Disconnected` otherwise.
    pub(super) async fn handle_disconnect(self: &Arc<Self>) {
        self.events.publish(crate::event_bus::CdpEvent::new(
            "Session.disconnected",
            serde_json::json!({}),
        ));
        if self.config.auto_reconnect {
            if let Err(e) = self.reconnect().await {
                tracing::error!(error = %e, "reconnect failed after disconnect");
            }
        } else {
            self.set_state(SessionState::Disconnected);
        }
    }

    #[must_use]
    pub fn health_status(&self) -> HealthStatus {
        match self.state() {
            SessionState::Ready if self.heartbeat_failures.load(Ordering::Relaxed) == 0 => {
                HealthStatus::Healthy
            }
            SessionState::Ready
            | SessionState::Connected
            | SessionState::Subscribing
            | SessionState::Reconnecting
            | SessionState::Recovering => HealthStatus::Degraded,
            SessionState::Disconnected
            | SessionState::Connecting
            | SessionState::Closing
            | SessionState::Closed
            | SessionState::Failed => HealthStatus::Unhealthy,
        }
    }

    /// Close the connection and stop all background tasks. Any in-flight
    /// commands resolve with `cdp-disconnected` rather than hanging.
    pub async fn close(&self) {
        self.set_state(SessionState::Closing);
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        if let Some(mut sink) = self.sink.lock().await.take() {
            use futures_util::SinkExt;
            let _ = sink.close().await;
        }
        self.pending.clear();
        self.set_state(SessionState::Closed);
    }
}
