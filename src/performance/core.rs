//! Locator cache, command batcher and screenshot budget.
//!
//! The locator cache uses `DashMap` with a per-entry TTL check rather
//! than a strict LRU crate: bulk TTL-and-navigation invalidation is the
//! access pattern that matters here, not recency ordering (see
//! DESIGN.md).

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::sleep;

use crate::config::{PerformanceConfig, ScreenshotPolicy};
use crate::error::{CdpError, ReasonCode, Result};

use super::types::{CachedLocator, PendingEval, ScreenshotBudgetSnapshot, ScreenshotTrigger};

/// Maps a selector string to its last-known resolution. Entries expire
/// after `locator_cache_ttl_ms` and the whole cache is dropped in bulk on
/// main-frame navigation (see [`Self::invalidate_all`]).
pub struct LocatorCache {
    entries: DashMap<String, CachedLocator>,
    ttl: Duration,
    max_size: usize,
}

impl LocatorCache {
    #[must_use]
    pub fn new(config: &PerformanceConfig) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::from_millis(config.locator_cache_ttl_ms),
            max_size: config.locator_cache_max_size,
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<CachedLocator> {
        let entry = self.entries.get(key)?;
        if entry.cached_at.elapsed() >= self.ttl {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.clone())
    }

    pub fn put(&self, key: impl Into<String>, node_id: i64, object_id: Option<String>) {
        if self.entries.len() >= self.max_size {
            self.evict_one_expired_or_oldest();
        }
        self.entries.insert(key.into(), CachedLocator { node_id, object_id, cached_at: Instant::now() });
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drops every entry. Called on any main-frame navigation event per the
    /// data-model invariant that locator cache entries don't survive one.
    pub fn invalidate_all(&self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_one_expired_or_oldest(&self) {
        let now = Instant::now();
        if let Some(expired_key) = self
            .entries
            .iter()
            .find(|e| now.duration_since(e.cached_at) >= self.ttl)
            .map(|e| e.key().clone())
        {
            self.entries.remove(&expired_key);
            return;
        }
        if let Some(oldest_key) = self
            .entries
            .iter()
            .min_by_key(|e| e.cached_at)
            .map(|e| e.key().clone())
        {
            self.entries.remove(&oldest_key);
        }
    }
}

/// Executes a fused JS expression. Implemented by `Session` in production;
/// kept as a trait boundary so the batcher has no direct dependency on it.
pub trait JsEvaluator: Send + Sync {
    fn evaluate(&self, expression: String) -> Pin<Box<dyn Future<Output = Result<serde_json::Value>> + Send>>;
}

impl<F, Fut> JsEvaluator for F
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
{
    fn evaluate(&self, expression: String) -> Pin<Box<dyn Future<Output = Result<serde_json::Value>> + Send>> {
        Box::pin((self)(expression))
    }
}

/// Groups short-lived JS evaluations: they accumulate until `batch_max_size`
/// is reached or `batch_delay_ms` elapses since the first pending entry,
/// then the expressions are fused into one array literal and dispatched as
/// a single command; results are unpacked back to each caller.
pub struct CommandBatcher {
    evaluator: Box<dyn JsEvaluator>,
    max_size: usize,
    delay: Duration,
    pending: AsyncMutex<Vec<PendingEval>>,
}

impl CommandBatcher {
    pub fn new(config: &PerformanceConfig, evaluator: impl JsEvaluator + 'static) -> Self {
        Self {
            evaluator: Box::new(evaluator),
            max_size: config.batch_max_size.max(1),
            delay: Duration::from_millis(config.batch_delay_ms),
            pending: AsyncMutex::new(Vec::new()),
        }
    }

    /// Submits one JS expression for evaluation, returning its individual
    /// result once the batch it lands in has been flushed.
    pub async fn evaluate(&self, expression: impl Into<String>) -> Result<serde_json::Value> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let flush_now = {
            let mut pending = self.pending.lock().await;
            pending.push(PendingEval { expression: expression.into(), respond: tx });
            pending.len() >= self.max_size
        };

        if flush_now {
            self.flush().await;
        } else {
            let delay = self.delay;
            // best-effort debounce flush; a concurrent evaluate() reaching
            // max_size will flush first and this becomes a no-op drain.
            sleep(delay).await;
            self.flush().await;
        }

        rx.await.map_err(|_| CdpError::system("command batcher dropped without responding"))?
    }

    async fn flush(&self) {
        let batch = {
            let mut pending = self.pending.lock().await;
            if pending.is_empty() {
                return;
            }
            std::mem::take(&mut *pending)
        };

        let fused = format!(
            "[{}]",
            batch.iter().map(|p| format!("(() => {{ {} }})()", p.expression)).collect::<Vec<_>>().join(",")
        );

        match self.evaluator.evaluate(fused).await {
            Ok(serde_json::Value::Array(results)) => {
                for (pending, result) in batch.into_iter().zip(results.into_iter()) {
                    let _ = pending.respond.send(Ok(result));
                }
            }
            Ok(other) => {
                for pending in batch {
                    let _ = pending.respond.send(Ok(other.clone()));
                }
            }
            Err(err) => {
                for pending in batch {
                    let _ = pending.respond.send(Err(err.clone()));
                }
            }
        }
    }
}

/// Bundles the three performance components behind one handle, the way
/// [`crate::concurrency::ConcurrencyManager`] bundles the throttle.
pub struct PerformanceOptimizer {
    pub locator_cache: LocatorCache,
    pub batcher: Option<CommandBatcher>,
    pub screenshot_budget: ScreenshotBudget,
}

impl PerformanceOptimizer {
    pub fn new(config: &PerformanceConfig, evaluator: impl JsEvaluator + 'static, enable_batching: bool) -> Self {
        Self {
            locator_cache: LocatorCache::new(config),
            batcher: enable_batching.then(|| CommandBatcher::new(config, evaluator)),
            screenshot_budget: ScreenshotBudget::new(config.screenshot_policy),
        }
    }
}

/// Per-job screenshot ceiling and disabled-trigger gating.
pub struct ScreenshotBudget {
    policy: ScreenshotPolicy,
    taken: AtomicU32,
    skipped: AtomicU32,
}

impl ScreenshotBudget {
    #[must_use]
    pub fn new(policy: ScreenshotPolicy) -> Self {
        Self { policy, taken: AtomicU32::new(0), skipped: AtomicU32::new(0) }
    }

    /// Returns `Ok(())` if a screenshot may be taken now, incrementing the
    /// taken counter; otherwise returns the denial reason and counts it
    /// under "skipped".
    pub fn try_take(&self, trigger: ScreenshotTrigger) -> Result<()> {
        if !self.policy.enabled {
            self.skipped.fetch_add(1, Ordering::SeqCst);
            return Err(CdpError::new(ReasonCode::ValidationFailed, "screenshots disabled by policy"));
        }

        let trigger_enabled = match trigger {
            ScreenshotTrigger::Error => self.policy.on_error,
            ScreenshotTrigger::StateChange => self.policy.on_state_change,
            ScreenshotTrigger::Manual => true,
        };
        if !trigger_enabled {
            self.skipped.fetch_add(1, Ordering::SeqCst);
            return Err(CdpError::new(ReasonCode::ValidationFailed, format!("{trigger:?} screenshots disabled")));
        }

        if self.taken.load(Ordering::SeqCst) >= self.policy.max_per_job {
            self.skipped.fetch_add(1, Ordering::SeqCst);
            return Err(CdpError::new(ReasonCode::ResourceExhausted, "screenshot budget exhausted for this job"));
        }

        self.taken.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    #[must_use]
    pub fn snapshot(&self) -> ScreenshotBudgetSnapshot {
        ScreenshotBudgetSnapshot {
            taken: self.taken.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            limit: self.policy.max_per_job,
        }
    }
}
