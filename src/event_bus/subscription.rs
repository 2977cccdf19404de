//! Subscribing to a live stream of events, or waiting for one matching
//! event to arrive.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use super::core::{EventBus, Waiter};
use super::types::CdpEvent;

impl EventBus {
    /// Subscribe to every event for `method` (or every event if `method` is
    /// `"*"`) from this point forward. The returned receiver stays live
    /// until dropped — every matching event after this call is delivered,
    /// not just the next one.
    pub fn on(&self, method: impl Into<String>) -> mpsc::UnboundedReceiver<CdpEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.entry(method.into()).or_default().push(tx);
        rx
    }

    /// Subscribe to `method`, but only ever deliver the first event: the
    /// handler runs once and the subscription then stops delivering
    /// (subsequent events for `method` are not sent on the channel).
    /// Built on [`Self::on`] plus a one-shot forwarder task rather than a
    /// separate subscriber registry, so it shares the exact same fan-out
    /// ordering as an ordinary subscription.
    pub fn subscribe_once(&self, method: impl Into<String>) -> oneshot::Receiver<CdpEvent> {
        let mut rx = self.on(method);
        let (tx, once_rx) = oneshot::channel();
        tokio::spawn(async move {
            if let Some(event) = rx.recv().await {
                let _ = tx.send(event);
            }
        });
        once_rx
    }

    /// Wait up to `timeout` for the next event on `method` satisfying
    /// `predicate`. The waiter is registered *before* the history is
    /// replayed, so an event published between the two steps (`publish()`
    /// appends to history and wakes waiters under separate locks, taken in
    /// that order) is still caught: either by the registration, if
    /// `publish()` reaches the waiters lock after this call has already
    /// registered, or by the history replay, if `publish()` already
    /// appended before this call replays — never by neither.
    pub async fn wait_for(
        &self,
        method: &str,
        predicate: impl Fn(&CdpEvent) -> bool + Send + Sync + 'static,
        timeout: Duration,
    ) -> Option<CdpEvent> {
        let predicate: Arc<dyn Fn(&CdpEvent) -> bool + Send + Sync> = Arc::new(predicate);
        let (tx, rx) = oneshot::channel();
        {
            let mut waiters = self.waiters.lock();
            waiters.entry(method.to_string()).or_default().push(Waiter {
                predicate: Arc::clone(&predicate),
                tx: Some(tx),
            });
        }

        // Check replay history next, using the same predicate instance —
        // the event may already have arrived before this call registered
        // its waiter above.
        if let Some(hit) = self
            .history_for(method)
            .into_iter()
            .rev()
            .find(|e| (predicate.as_ref())(e))
        {
            self.metrics.record_waiter_satisfied();
            return Some(hit);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(event)) => Some(event),
            _ => {
                self.metrics.record_waiter_timed_out();
                None
            }
        }
    }

    /// Wait up to `timeout` for the next event on any of `methods`
    /// satisfying `predicate`. Registers one waiter per method (so
    /// `publish()`'s per-method bucket lookup still applies) sharing a
    /// single oneshot: whichever method's event arrives first resolves the
    /// call and leaves the others as stale, harmless entries that a later
    /// matching event on that method will drain.
    pub async fn wait_any(
        &self,
        methods: &[&str],
        predicate: impl Fn(&CdpEvent) -> bool + Send + Sync + 'static,
        timeout: Duration,
    ) -> Option<CdpEvent> {
        let predicate: Arc<dyn Fn(&CdpEvent) -> bool + Send + Sync> = Arc::new(predicate);
        let (tx, rx) = oneshot::channel();
        let tx = Arc::new(parking_lot::Mutex::new(Some(tx)));

        {
            let mut waiters = self.waiters.lock();
            for method in methods {
                let tx = Arc::clone(&tx);
                let (inner_tx, inner_rx) = oneshot::channel();
                tokio::spawn(async move {
                    if let Ok(event) = inner_rx.await
                        && let Some(tx) = tx.lock().take()
                    {
                        let _ = tx.send(event);
                    }
                });
                waiters.entry((*method).to_string()).or_default().push(Waiter {
                    predicate: Arc::clone(&predicate),
                    tx: Some(inner_tx),
                });
            }
        }

        for method in methods {
            if let Some(hit) = self
                .history_for(method)
                .into_iter()
                .rev()
                .find(|e| (predicate.as_ref())(e))
            {
                self.metrics.record_waiter_satisfied();
                return Some(hit);
            }
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(event)) => Some(event),
            _ => {
                self.metrics.record_waiter_timed_out();
                None
            }
        }
    }
}
