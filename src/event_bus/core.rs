//! Core `EventBus` struct definition and constructor.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use super::metrics::EventBusMetrics;
use super::types::CdpEvent;

pub(super) struct Waiter {
    pub(super) predicate: Arc<dyn Fn(&CdpEvent) -> bool + Send + Sync>,
    pub(super) tx: Option<oneshot::Sender<CdpEvent>>,
}

/// Typed pub/sub hub for CDP events.
///
/// Keeps a bounded replay history per method plus a set of waiters
/// registered *before* the event they're waiting for is published — a
/// waiter added while holding the same lock `publish()` uses to scan for
/// matches can never miss the event it's racing against.
pub struct EventBus {
    pub(super) history: Mutex<VecDeque<CdpEvent>>,
    pub(super) history_cap: usize,
    pub(super) waiters: Mutex<HashMap<String, Vec<Waiter>>>,
    pub(super) subscribers: DashMap<String, Vec<mpsc::UnboundedSender<CdpEvent>>>,
    pub(super) metrics: EventBusMetrics,
}

impl EventBus {
    #[must_use]
    pub fn new(history_cap: usize) -> Self {
        Self {
            history: Mutex::new(VecDeque::with_capacity(history_cap.min(4096))),
            history_cap,
            waiters: Mutex::new(HashMap::new()),
            subscribers: DashMap::new(),
            metrics: EventBusMetrics::new(),
        }
    }

    #[must_use]
    pub fn metrics(&self) -> &EventBusMetrics {
        &self.metrics
    }

    #[must_use]
    pub fn buffer_len(&self) -> usize {
        self.history.lock().len()
    }

    #[must_use]
    pub fn remaining_capacity(&self) -> usize {
        self.history_cap.saturating_sub(self.buffer_len())
    }

    #[must_use]
    pub fn pressure(&self) -> f64 {
        self.buffer_len() as f64 / self.history_cap.max(1) as f64
    }

    #[must_use]
    pub fn is_overloaded(&self) -> bool {
        self.pressure() >= 0.8
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}
