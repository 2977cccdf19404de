//! Command throttle: a rolling one-second rate cap plus a concurrent-command
//! semaphore, with an adaptive multiplier that shrinks the effective rate
//! under high latency and grows it back under low latency.
//!
//! Uses a `tokio::sync::Semaphore` for the concurrency cap.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Latency above which the adaptive multiplier shrinks the effective rate.
const HIGH_LATENCY_MS: u64 = 500;
/// Latency below which the adaptive multiplier grows the effective rate back.
const LOW_LATENCY_MS: u64 = 100;
const MIN_MULTIPLIER: f64 = 0.25;
const MAX_MULTIPLIER: f64 = 1.0;

pub struct CommandThrottle {
    base_rate_per_sec: f64,
    window: Mutex<VecDeque<Instant>>,
    latencies: Mutex<VecDeque<u64>>,
    concurrency: Semaphore,
    multiplier_bits: AtomicU64,
}

impl CommandThrottle {
    #[must_use]
    pub fn new(rate_per_sec: f64, max_concurrent: usize) -> Self {
        Self {
            base_rate_per_sec: rate_per_sec.max(0.1),
            window: Mutex::new(VecDeque::new()),
            latencies: Mutex::new(VecDeque::new()),
            concurrency: Semaphore::new(max_concurrent.max(1)),
            multiplier_bits: AtomicU64::new(1.0_f64.to_bits()),
        }
    }

    #[must_use]
    pub fn multiplier(&self) -> f64 {
        f64::from_bits(self.multiplier_bits.load(Ordering::Relaxed))
    }

    fn effective_rate(&self) -> f64 {
        self.base_rate_per_sec * self.multiplier()
    }

    /// Acquires a concurrency permit and waits out any rate-window
    /// backpressure before returning. The caller should hold the returned
    /// permit for the duration of the outbound command.
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        loop {
            let wait = {
                let mut window = self.window.lock();
                let now = Instant::now();
                while window.front().is_some_and(|t| now.duration_since(*t) >= Duration::from_secs(1)) {
                    window.pop_front();
                }
                let rate = self.effective_rate().max(1.0) as usize;
                if window.len() < rate.max(1) {
                    window.push_back(now);
                    None
                } else {
                    let oldest = *window.front().unwrap();
                    Some(Duration::from_secs(1).saturating_sub(now.duration_since(oldest)))
                }
            };

            match wait {
                None => break,
                Some(delay) => tokio::time::sleep(delay).await,
            }
        }

        self.concurrency
            .acquire()
            .await
            .expect("throttle semaphore never closed")
    }

    /// Records an observed command latency and recomputes the adaptive
    /// multiplier from the rolling average of the last 20 samples.
    pub fn record_latency(&self, elapsed: Duration) {
        let ms = elapsed.as_millis() as u64;
        let mut latencies = self.latencies.lock();
        latencies.push_back(ms);
        if latencies.len() > 20 {
            latencies.pop_front();
        }
        let avg = latencies.iter().sum::<u64>() / latencies.len() as u64;
        drop(latencies);

        let current = self.multiplier();
        let next = if avg > HIGH_LATENCY_MS {
            (current * 0.8).max(MIN_MULTIPLIER)
        } else if avg < LOW_LATENCY_MS {
            (current * 1.1).min(MAX_MULTIPLIER)
        } else {
            current
        };
        self.multiplier_bits.store(next.to_bits(), Ordering::Relaxed);
    }
}
