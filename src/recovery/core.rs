//! Recovery Manager: classifies a failure into an escalation tier and
//! walks step → state → context → browser recovery until one succeeds
//! or every tier is exhausted.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::config::RecoveryConfig;
use crate::error::ReasonCode;

use super::types::{default_browser_errors, default_context_errors, default_retriable, RecoveryLevel, RecoveryResult, SafeResetPoint};

type AsyncBoolFn = dyn Fn() -> Pin<Box<dyn Future<Output = bool> + Send>> + Send + Sync;

#[derive(Clone)]
struct RecoveryEvent {
    level: RecoveryLevel,
    success: bool,
}

pub struct RecoveryManager {
    config: RecoveryConfig,
    retriable: Vec<ReasonCode>,
    context_errors: Vec<ReasonCode>,
    browser_errors: Vec<ReasonCode>,

    reset_points: Mutex<Vec<SafeResetPoint>>,
    current_reset_point: Mutex<Option<String>>,
    history: Mutex<Vec<RecoveryEvent>>,

    on_recreate_context: Mutex<Option<Arc<AsyncBoolFn>>>,
    on_restart_browser: Mutex<Option<Arc<AsyncBoolFn>>>,
}

impl RecoveryManager {
    #[must_use]
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            config,
            retriable: default_retriable(),
            context_errors: default_context_errors(),
            browser_errors: default_browser_errors(),
            reset_points: Mutex::new(Vec::new()),
            current_reset_point: Mutex::new(None),
            history: Mutex::new(Vec::new()),
            on_recreate_context: Mutex::new(None),
            on_restart_browser: Mutex::new(None),
        }
    }

    pub fn register_reset_point(&self, point: SafeResetPoint) {
        self.reset_points.lock().push(point);
    }

    pub fn set_current_reset_point(&self, name: impl Into<String>) {
        *self.current_reset_point.lock() = Some(name.into());
    }

    pub fn set_recreate_context_callback(&self, f: impl Fn() -> Pin<Box<dyn Future<Output = bool> + Send>> + Send + Sync + 'static) {
        *self.on_recreate_context.lock() = Some(Arc::new(f));
    }

    pub fn set_restart_browser_callback(&self, f: impl Fn() -> Pin<Box<dyn Future<Output = bool> + Send>> + Send + Sync + 'static) {
        *self.on_restart_browser.lock() = Some(Arc::new(f));
    }

    #[must_use]
    pub fn classify_error(&self, code: ReasonCode) -> RecoveryLevel {
        if matches!(code, ReasonCode::ValidationFailed | ReasonCode::GuardRejected) {
            return RecoveryLevel::None;
        }
        if self.browser_errors.contains(&code) {
            return RecoveryLevel::RestartBrowser;
        }
        if self.context_errors.contains(&code) {
            return RecoveryLevel::RecreateContext;
        }
        if self.retriable.contains(&code) {
            return RecoveryLevel::StepRetry;
        }
        if code.disposition() != crate::error::Disposition::Logic {
            return RecoveryLevel::StateRetry;
        }
        RecoveryLevel::None
    }

    /// Attempts recovery from `code`, escalating through every tier up to
    /// and including the one `classify_error` selects. `step_fn`, when
    /// given, is retried directly at the step-retry tier.
    pub async fn attempt_recovery<F, Fut>(&self, code: ReasonCode, current_state: &str, step_fn: Option<F>) -> RecoveryResult
    where
        F: Fn() -> Fut,
        Fut: Future<Output = bool>,
    {
        let start = Instant::now();
        let level = self.classify_error(code);

        if level == RecoveryLevel::None {
            self.record(level, false);
            return RecoveryResult::failure(level, 0, start.elapsed().as_millis() as u64, "error is not recoverable");
        }

        if level == RecoveryLevel::StepRetry {
            if let Some(step_fn) = &step_fn {
                let result = self.attempt_step_retry(step_fn).await;
                if result.success {
                    self.record(RecoveryLevel::StepRetry, true);
                    return result;
                }
            }
        }

        if level <= RecoveryLevel::StateRetry {
            let result = self.attempt_state_retry(current_state).await;
            if result.success {
                self.record(RecoveryLevel::StateRetry, true);
                return result;
            }
        }

        if level <= RecoveryLevel::RecreateContext {
            let result = self.attempt_recreate_context().await;
            if result.success {
                self.record(RecoveryLevel::RecreateContext, true);
                return result;
            }
        }

        if level <= RecoveryLevel::RestartBrowser {
            let result = self.attempt_restart_browser().await;
            if result.success {
                self.record(RecoveryLevel::RestartBrowser, true);
                return result;
            }
        }

        self.record(level, false);
        RecoveryResult::failure(level, 0, start.elapsed().as_millis() as u64, "all recovery tiers exhausted")
    }

    async fn attempt_step_retry<F, Fut>(&self, step_fn: &F) -> RecoveryResult
    where
        F: Fn() -> Fut,
        Fut: Future<Output = bool>,
    {
        let start = Instant::now();
        let mut delay = self.config.step_retry_delay_ms;

        for attempt in 1..=self.config.max_step_retries {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            if step_fn().await {
                return RecoveryResult::success(RecoveryLevel::StepRetry, attempt, start.elapsed().as_millis() as u64, "step_complete");
            }
            delay = (delay as f64 * self.config.step_retry_backoff) as u64;
        }

        RecoveryResult::failure(RecoveryLevel::StepRetry, self.config.max_step_retries, start.elapsed().as_millis() as u64, "step retry exhausted")
    }

    async fn attempt_state_retry(&self, current_state: &str) -> RecoveryResult {
        let start = Instant::now();

        for attempt in 1..=self.config.max_state_retries {
            tokio::time::sleep(std::time::Duration::from_millis(self.config.state_retry_delay_ms)).await;

            if let Some((name, verify, setup)) = self.nearest_reset_point().await {
                if verify().await {
                    return RecoveryResult::success(RecoveryLevel::StateRetry, attempt, start.elapsed().as_millis() as u64, name);
                }
                if let Some(setup) = setup {
                    if setup().await {
                        return RecoveryResult::success(RecoveryLevel::StateRetry, attempt, start.elapsed().as_millis() as u64, name);
                    }
                }
            } else {
                // No registered reset point at all: nothing to verify
                // against, so the retry is purely time-based on `current_state`.
                let _ = current_state;
            }
        }

        RecoveryResult::failure(RecoveryLevel::StateRetry, self.config.max_state_retries, start.elapsed().as_millis() as u64, "state retry exhausted")
    }

    /// Returns the current reset point by name if one is set and
    /// registered, else the first registered point whose `verify` passes.
    async fn nearest_reset_point(&self) -> Option<(String, Arc<AsyncBoolFn>, Option<Arc<AsyncBoolFn>>)> {
        let current_name = self.current_reset_point.lock().clone();
        let candidates: Vec<(String, Arc<AsyncBoolFn>, Option<Arc<AsyncBoolFn>>)> = self
            .reset_points
            .lock()
            .iter()
            .map(|p| (p.name.clone(), Arc::clone(&p.verify), p.setup.clone()))
            .collect();

        if let Some(name) = current_name {
            if let Some(found) = candidates.iter().find(|(n, ..)| *n == name) {
                return Some(found.clone());
            }
        }

        for candidate in &candidates {
            if (candidate.1)().await {
                return Some(candidate.clone());
            }
        }
        None
    }

    async fn attempt_recreate_context(&self) -> RecoveryResult {
        let start = Instant::now();
        let Some(callback) = self.on_recreate_context.lock().clone() else {
            return RecoveryResult::failure(RecoveryLevel::RecreateContext, 0, 0, "no recreate-context callback registered");
        };

        for attempt in 1..=self.config.max_recreate_attempts {
            tokio::time::sleep(std::time::Duration::from_millis(self.config.recreate_delay_ms)).await;
            if callback().await {
                return RecoveryResult::success(RecoveryLevel::RecreateContext, attempt, start.elapsed().as_millis() as u64, "new_context");
            }
        }

        RecoveryResult::failure(RecoveryLevel::RecreateContext, self.config.max_recreate_attempts, start.elapsed().as_millis() as u64, "context recreation exhausted")
    }

    async fn attempt_restart_browser(&self) -> RecoveryResult {
        let start = Instant::now();
        let Some(callback) = self.on_restart_browser.lock().clone() else {
            return RecoveryResult::failure(RecoveryLevel::RestartBrowser, 0, 0, "no restart-browser callback registered");
        };

        for attempt in 1..=self.config.max_restart_attempts {
            tokio::time::sleep(std::time::Duration::from_millis(self.config.restart_delay_ms)).await;
            if callback().await {
                return RecoveryResult::success(RecoveryLevel::RestartBrowser, attempt, start.elapsed().as_millis() as u64, "browser_restarted");
            }
        }

        RecoveryResult::failure(RecoveryLevel::RestartBrowser, self.config.max_restart_attempts, start.elapsed().as_millis() as u64, "browser restart exhausted")
    }

    fn record(&self, level: RecoveryLevel, success: bool) {
        let mut history = self.history.lock();
        history.push(RecoveryEvent { level, success });
        if history.len() > 100 {
            let overflow = history.len() - 100;
            history.drain(0..overflow);
        }
    }

    #[must_use]
    pub fn recovery_stats(&self) -> serde_json::Value {
        let history = self.history.lock();
        let total = history.len();
        let successful = history.iter().filter(|e| e.success).count();
        serde_json::json!({
            "total_attempts": total,
            "successful": successful,
            "success_rate": if total > 0 { successful as f64 / total as f64 } else { 0.0 },
        })
    }
}
