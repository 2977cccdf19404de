//! Priority job queue with per-target serialization.
//!
//! A single in-memory queue holds pending jobs ordered by `(priority desc,
//! arrival asc)`. A scheduler task polls it at a fixed interval and, rather
//! than blocking on a literal FIFO head, scans for the highest-priority job
//! whose target id is currently free — this is what lets an unrelated job
//! for a free target run immediately instead of queuing behind a busy
//! target's higher-priority job.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashSet;
use parking_lot::Mutex;
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinHandle;

use crate::config::ConcurrencyConfig;
use crate::error::{CdpError, ReasonCode, Result};

use super::throttle::CommandThrottle;
use super::types::{Job, JobResult};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

struct QueuedJob {
    seq: u64,
    job: Job,
    done: oneshot::Sender<JobResult>,
}

pub struct ConcurrencyManager {
    config: ConcurrencyConfig,
    queue: Mutex<VecDeque<QueuedJob>>,
    busy_targets: DashSet<String>,
    worker_permits: Arc<Semaphore>,
    seq: AtomicU64,
    running: AtomicBool,
    pub throttle: Arc<CommandThrottle>,
}

impl ConcurrencyManager {
    #[must_use]
    pub fn new(config: ConcurrencyConfig) -> Arc<Self> {
        let throttle = Arc::new(CommandThrottle::new(config.throttle_rate_per_sec, config.max_concurrent_commands));
        Arc::new(Self {
            worker_permits: Arc::new(Semaphore::new(config.worker_pool_size.max(1))),
            config,
            queue: Mutex::new(VecDeque::new()),
            busy_targets: DashSet::new(),
            seq: AtomicU64::new(0),
            running: AtomicBool::new(false),
            throttle,
        })
    }

    /// Enqueues a job and returns a future resolving to its result once the
    /// scheduler has run it. Ordering among jobs with equal priority matches
    /// submission order. Rejects with `QueueFull` once `job_queue_size` is
    /// reached rather than growing the queue unbounded.
    pub fn submit(self: &Arc<Self>, job: Job) -> Result<oneshot::Receiver<JobResult>> {
        let (tx, rx) = oneshot::channel();
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let mut queue = self.queue.lock();
        if queue.len() >= self.config.job_queue_size {
            return Err(CdpError::new(ReasonCode::QueueFull, "concurrency job queue is full"));
        }
        let insert_at = queue
            .iter()
            .position(|q| q.job.priority < job.priority)
            .unwrap_or(queue.len());
        queue.insert(insert_at, QueuedJob { seq, job, done: tx });
        Ok(rx)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.queue.lock().len()
    }

    #[must_use]
    pub fn is_target_busy(&self, target_id: &str) -> bool {
        self.busy_targets.contains(target_id)
    }

    /// Starts the scheduler loop. Safe to call once per manager instance.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        let this = Arc::clone(self);
        tokio::spawn(async move {
            while this.running.load(Ordering::SeqCst) {
                this.dispatch_ready().await;
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Pulls every currently-runnable job (highest priority first, skipping
    /// jobs whose target is busy) and spawns each onto a worker permit.
    async fn dispatch_ready(self: &Arc<Self>) {
        loop {
            let Some(queued) = self.take_next_runnable() else { break };
            let Ok(permit) = Arc::clone(&self.worker_permits).try_acquire_owned() else {
                // no free worker slot right now; put it back and stop for this tick
                self.requeue(queued);
                break;
            };
            let this = Arc::clone(self);
            let target_id = queued.job.target_id.clone();
            self.busy_targets.insert(target_id.clone());
            tokio::spawn(async move {
                let _permit = permit;
                let start = Instant::now();
                let QueuedJob { job, done, .. } = queued;
                let result = (job.run)().await;
                let elapsed_ms = start.elapsed().as_millis() as u64;
                this.busy_targets.remove(&target_id);

                let result = match result {
                    Ok(value) => JobResult {
                        job_id: job.id,
                        success: true,
                        value: Some(value),
                        error: None,
                        elapsed_ms,
                    },
                    Err(err) => JobResult {
                        job_id: job.id,
                        success: false,
                        value: None,
                        error: Some(err),
                        elapsed_ms,
                    },
                };
                let _ = done.send(result);
            });
        }
    }

    fn take_next_runnable(&self) -> Option<QueuedJob> {
        let mut queue = self.queue.lock();
        let pos = queue.iter().position(|q| !self.busy_targets.contains(&q.job.target_id))?;
        queue.remove(pos)
    }

    fn requeue(&self, queued: QueuedJob) {
        let mut queue = self.queue.lock();
        let insert_at = queue
            .iter()
            .position(|q| q.seq > queued.seq)
            .unwrap_or(queue.len());
        queue.insert(insert_at, queued);
    }
}
