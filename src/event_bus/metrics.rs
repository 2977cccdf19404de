//! Event bus counters, reported by the Client Facade's `get_health()`.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct EventBusMetrics {
    published: AtomicU64,
    dropped: AtomicU64,
    waiters_satisfied: AtomicU64,
    waiters_timed_out: AtomicU64,
}

impl EventBusMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_waiter_satisfied(&self) {
        self.waiters_satisfied.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_waiter_timed_out(&self) {
        self.waiters_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> EventBusMetricsSnapshot {
        EventBusMetricsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            waiters_satisfied: self.waiters_satisfied.load(Ordering::Relaxed),
            waiters_timed_out: self.waiters_timed_out.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct EventBusMetricsSnapshot {
    pub published: u64,
    pub dropped: u64,
    pub waiters_satisfied: u64,
    pub waiters_timed_out: u64,
}
