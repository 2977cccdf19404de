//! Publishing: append to history, satisfy waiters, fan out to subscribers.

use super::core::EventBus;
use super::types::CdpEvent;

impl EventBus {
    /// Publish an event: record it, wake any waiter whose predicate matches,
    /// and forward it to subscribers of its method (and wildcard `"*"`
    /// subscribers).
    pub fn publish(&self, event: CdpEvent) {
        self.metrics.record_published();

        {
            let mut history = self.history.lock();
            if history.len() >= self.history_cap {
                history.pop_front();
                self.metrics.record_dropped();
            }
            history.push_back(event.clone());
        }

        {
            let mut waiters = self.waiters.lock();
            if let Some(bucket) = waiters.get_mut(&event.method) {
                let mut remaining = Vec::with_capacity(bucket.len());
                for mut waiter in bucket.drain(..) {
                    if (waiter.predicate.as_ref())(&event) {
                        if let Some(tx) = waiter.tx.take() {
                            let _ = tx.send(event.clone());
                        }
                        self.metrics.record_waiter_satisfied();
                    } else {
                        remaining.push(waiter);
                    }
                }
                *bucket = remaining;
            }
        }

        if let Some(subs) = self.subscribers.get(&event.method) {
            for tx in subs.iter() {
                let _ = tx.send(event.clone());
            }
        }
        if event.method != "*" {
            if let Some(subs) = self.subscribers.get("*") {
                for tx in subs.iter() {
                    let _ = tx.send(event.clone());
                }
            }
        }
    }

    /// Events currently retained in the history buffer for `method`, oldest
    /// first.
    #[must_use]
    pub fn history_for(&self, method: &str) -> Vec<CdpEvent> {
        self.history
            .lock()
            .iter()
            .filter(|e| e.method == method)
            .cloned()
            .collect()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }

    /// Request ids seen in `Network.requestWillBeSent` history with no
    /// later `Network.loadingFinished`/`Network.loadingFailed` for the same
    /// id — derived from history alone, not separately tracked state.
    #[must_use]
    pub fn pending_requests(&self) -> std::collections::HashSet<String> {
        let history = self.history.lock();
        let mut pending = std::collections::HashSet::new();
        for event in history.iter() {
            match event.method.as_str() {
                "Network.requestWillBeSent" => {
                    if let Some(id) = event.field_str("requestId") {
                        pending.insert(id.to_string());
                    }
                }
                "Network.loadingFinished" | "Network.loadingFailed" => {
                    if let Some(id) = event.field_str("requestId") {
                        pending.remove(id);
                    }
                }
                _ => {}
            }
        }
        pending
    }
}
