//! Watchdog: heartbeat/event/progress health tracking with a single
//! background scanner, poisoning contexts that fail repeatedly.

mod core;
mod process;
mod types;

pub use core::{KillHandler, Watchdog};
pub use process::ProcessKillHandler;
pub use types::{ContextStatus, HealthRecord, HealthSnapshot};

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::config::WatchdogConfig;

    #[tokio::test]
    async fn unresponsive_context_triggers_kill_handler() {
        let config = WatchdogConfig {
            heartbeat_interval_ms: 50,
            heartbeat_timeout_ms: 50,
            progress_timeout_ms: 60_000,
            event_timeout_ms: 60_000,
            job_hard_timeout_ms: 600_000,
            max_failures_before_poison: 3,
            poison_cooldown_ms: 1_000,
        };
        let watchdog = Watchdog::new(config);

        let kill_count = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&kill_count);
        watchdog.register(
            "ctx-1",
            Arc::new(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    true
                }
            }),
        );

        let handle = watchdog.start();
        tokio::time::sleep(Duration::from_millis(300)).await;
        watchdog.stop();
        handle.abort();

        assert!(kill_count.load(Ordering::SeqCst) > 0);
    }

    #[tokio::test]
    async fn context_poisons_after_threshold_failures() {
        let config = WatchdogConfig {
            heartbeat_interval_ms: 20,
            heartbeat_timeout_ms: 30,
            progress_timeout_ms: 60_000,
            event_timeout_ms: 60_000,
            job_hard_timeout_ms: 600_000,
            max_failures_before_poison: 1,
            poison_cooldown_ms: 5_000,
        };
        let watchdog = Watchdog::new(config);
        watchdog.register("ctx-2", Arc::new(|| async { false }));

        let handle = watchdog.start();
        tokio::time::sleep(Duration::from_millis(150)).await;
        watchdog.stop();
        handle.abort();

        assert!(watchdog.is_poisoned("ctx-2"));
    }

    #[test]
    fn unregistering_drops_the_record() {
        let watchdog = Watchdog::new(WatchdogConfig::default());
        watchdog.register("ctx-3", Arc::new(|| async { true }));
        assert!(watchdog.snapshot("ctx-3").is_some());
        watchdog.unregister("ctx-3");
        assert!(watchdog.snapshot("ctx-3").is_none());
    }
}
