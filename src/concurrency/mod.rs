//! Concurrency Manager: a priority job queue with per-target
//! serialization, a bounded worker pool, and a command throttle.

mod core;
mod throttle;
mod types;

pub use core::ConcurrencyManager;
pub use throttle::CommandThrottle;
pub use types::{Job, JobFuture, JobPriority, JobResult};

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::config::ConcurrencyConfig;

    fn job(id: &str, target: &str, priority: JobPriority, counter: Arc<AtomicU32>) -> Job {
        Job::new(id, target, priority, move || {
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(80)).await;
                Ok(serde_json::json!({ "ok": true }))
            })
        })
    }

    #[tokio::test]
    async fn same_target_jobs_serialize_while_other_targets_proceed() {
        let manager = ConcurrencyManager::new(ConcurrencyConfig {
            worker_pool_size: 4,
            ..ConcurrencyConfig::default()
        });
        let handle = manager.start();

        let running_a = Arc::new(AtomicU32::new(0));
        let running_c = Arc::new(AtomicU32::new(0));

        let rx1 = manager
            .submit(job("job-1", "target-a", JobPriority::Normal, Arc::clone(&running_a)))
            .unwrap();
        let rx2 = manager
            .submit(job("job-2", "target-a", JobPriority::Normal, Arc::clone(&running_a)))
            .unwrap();
        let rx3 = manager
            .submit(job("job-3", "target-c", JobPriority::Normal, Arc::clone(&running_c)))
            .unwrap();

        // give the scheduler a couple of ticks to start whatever it can
        tokio::time::sleep(Duration::from_millis(60)).await;
        // target-a only ever has one job in flight; target-c's independent
        // job should have started concurrently with it.
        assert_eq!(running_a.load(Ordering::SeqCst), 1);
        assert_eq!(running_c.load(Ordering::SeqCst), 1);

        let r1 = rx1.await.unwrap();
        let r3 = rx3.await.unwrap();
        assert!(r1.success);
        assert!(r3.success);
        let r2 = rx2.await.unwrap();
        assert!(r2.success);

        manager.stop();
        handle.abort();
    }

    #[tokio::test]
    async fn higher_priority_jobs_on_a_free_target_run_first() {
        let manager = ConcurrencyManager::new(ConcurrencyConfig {
            worker_pool_size: 1,
            ..ConcurrencyConfig::default()
        });

        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        // Submit a low priority job first, then a critical one for the same
        // target before the scheduler has had a chance to run either.
        let low = Job::new("low", "shared", JobPriority::Low, {
            let order = Arc::clone(&order);
            move || Box::pin(async move { order.lock().push("low"); Ok(serde_json::Value::Null) })
        });
        let critical = Job::new("critical", "shared", JobPriority::Critical, {
            let order = Arc::clone(&order);
            move || Box::pin(async move { order.lock().push("critical"); Ok(serde_json::Value::Null) })
        });

        let rx_low = manager.submit(low).unwrap();
        let rx_critical = manager.submit(critical).unwrap();

        let handle = manager.start();
        rx_critical.await.unwrap();
        rx_low.await.unwrap();
        manager.stop();
        handle.abort();

        assert_eq!(*order.lock(), vec!["critical", "low"]);
    }

    #[tokio::test]
    async fn queue_full_rejects_further_submissions() {
        let manager = ConcurrencyManager::new(ConcurrencyConfig {
            job_queue_size: 1,
            ..ConcurrencyConfig::default()
        });
        let counter = Arc::new(AtomicU32::new(0));
        manager.submit(job("a", "t", JobPriority::Normal, Arc::clone(&counter))).unwrap();
        let rejected = manager.submit(job("b", "t", JobPriority::Normal, counter));
        assert!(rejected.is_err());
    }
}
