//! Watchdog: one background scanner task that polls every registered
//! context's health record once a second and kills anything that stops
//! heartbeating, stops producing events, stops making progress, or
//! overruns its job's hard timeout.
//!
//! Killing the host OS process is kept only as the `KillHandler` trait
//! boundary here, since the host browser process is an external
//! collaborator. An example OS-process kill handler lives in
//! [`super::process`].

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::config::WatchdogConfig;

use super::types::{ContextStatus, HealthRecord, HealthSnapshot};

/// Caller-supplied recovery action invoked when a context is judged dead.
/// Returns whether the kill succeeded (e.g. the tab was closed).
pub trait KillHandler: Send + Sync {
    fn kill(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;
}

impl<F, Fut> KillHandler for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send + 'static,
{
    fn kill(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin((self)())
    }
}

/// Tracks per-context health and runs one background scanner task,
/// irrespective of how many contexts are registered.
pub struct Watchdog {
    config: WatchdogConfig,
    records: DashMap<String, HealthRecord>,
    kill_handlers: DashMap<String, Arc<dyn KillHandler>>,
    running: AtomicBool,
}

impl Watchdog {
    #[must_use]
    pub fn new(config: WatchdogConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            records: DashMap::new(),
            kill_handlers: DashMap::new(),
            running: AtomicBool::new(false),
        })
    }

    /// Registers a context and its kill handler. Safe to call again for
    /// the same id to replace the handler (e.g. after a context recreate).
    pub fn register(&self, context_id: impl Into<String>, kill_handler: Arc<dyn KillHandler>) {
        let context_id = context_id.into();
        self.records
            .entry(context_id.clone())
            .or_insert_with(|| HealthRecord::new(context_id.clone()));
        self.kill_handlers.insert(context_id, kill_handler);
    }

    pub fn unregister(&self, context_id: &str) {
        self.records.remove(context_id);
        self.kill_handlers.remove(context_id);
    }

    pub fn touch_heartbeat(&self, context_id: &str) {
        if let Some(mut record) = self.records.get_mut(context_id) {
            record.last_heartbeat = Instant::now();
        }
    }

    pub fn touch_event(&self, context_id: &str) {
        if let Some(mut record) = self.records.get_mut(context_id) {
            record.last_event = Instant::now();
        }
    }

    pub fn touch_progress(&self, context_id: &str) {
        if let Some(mut record) = self.records.get_mut(context_id) {
            record.last_progress = Instant::now();
        }
    }

    #[must_use]
    pub fn is_poisoned(&self, context_id: &str) -> bool {
        self.records.get(context_id).is_some_and(|r| r.is_poisoned())
    }

    #[must_use]
    pub fn snapshot(&self, context_id: &str) -> Option<HealthSnapshot> {
        self.records.get(context_id).map(|r| HealthSnapshot::from(&*r))
    }

    #[must_use]
    pub fn all_snapshots(&self) -> Vec<HealthSnapshot> {
        self.records.iter().map(|r| HealthSnapshot::from(&*r)).collect()
    }

    /// Starts the one background scanner task, if not already running.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        let this = Arc::clone(self);
        tokio::spawn(async move {
            while this.running.load(Ordering::SeqCst) {
                this.scan_once().await;
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    async fn scan_once(&self) {
        let ids: Vec<String> = self.records.iter().map(|r| r.key().clone()).collect();
        for id in ids {
            self.evaluate(&id).await;
        }
    }

    async fn evaluate(&self, context_id: &str) {
        let decision = {
            let Some(record) = self.records.get(context_id) else { return };
            if record.is_poisoned() {
                return;
            }
            if record.status == ContextStatus::Poisoned {
                // cooldown just elapsed: re-enter in a degraded state
                // rather than jumping straight back to healthy.
                drop(record);
                if let Some(mut record) = self.records.get_mut(context_id) {
                    record.status = ContextStatus::Degraded;
                    record.consecutive_failures = 0;
                    record.poisoned_until = None;
                }
                return;
            }
            let now = Instant::now();
            let heartbeat_age = now.duration_since(record.last_heartbeat);
            let event_age = now.duration_since(record.last_event);
            let progress_age = now.duration_since(record.last_progress);
            let wall_clock = now.duration_since(record.started_at);

            if wall_clock >= Duration::from_millis(self.config.job_hard_timeout_ms) {
                Some((ContextStatus::Dead, true))
            } else if progress_age >= Duration::from_millis(self.config.progress_timeout_ms) {
                Some((ContextStatus::Unresponsive, true))
            } else if heartbeat_age >= Duration::from_millis(self.config.heartbeat_timeout_ms) {
                Some((ContextStatus::Unresponsive, true))
            } else if event_age >= Duration::from_millis(self.config.event_timeout_ms) {
                Some((ContextStatus::Degraded, false))
            } else {
                Some((ContextStatus::Healthy, false))
            }
        };

        let Some((status, should_kill)) = decision else { return };

        if let Some(mut record) = self.records.get_mut(context_id) {
            record.status = status;
        }

        if !should_kill {
            return;
        }

        tracing::warn!(context_id, ?status, "watchdog declaring context dead");

        let killed = match self.kill_handlers.get(context_id) {
            Some(handler) => handler.kill().await,
            None => false,
        };

        if let Some(mut record) = self.records.get_mut(context_id) {
            if killed {
                record.consecutive_failures += 1;
            } else {
                record.consecutive_failures += 2;
            }

            if record.consecutive_failures >= self.config.max_failures_before_poison {
                record.status = ContextStatus::Poisoned;
                record.poisoned_until =
                    Some(Instant::now() + Duration::from_millis(self.config.poison_cooldown_ms));
                tracing::error!(context_id, "context poisoned after repeated failures");
            }
        }
    }
}
