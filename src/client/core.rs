//! Client Facade: binds every subsystem into the single public surface
//! consumers use.
//!
//! Owns a bundle of collaborating subsystems behind one public type and
//! forwards calls into them.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::actions::{ActionExecutor, ActionResult};
use crate::concurrency::{ConcurrencyManager, Job, JobPriority, JobResult};
use crate::config::ClientConfig;
use crate::error::{CdpError, ReasonCode, Result};
use crate::event_bus::EventBus;
use crate::file_io::{DownloadResult, FileIOManager, UploadResult};
use crate::navigation::{NavigationManager, NavigationResult, SpaConfig, WaitUntil};
use crate::observability::ObservabilityEngine;
use crate::performance::PerformanceOptimizer;
use crate::recovery::{RecoveryManager, SafeResetPoint};
use crate::selectors::{Locator, SelectorEngine};
use crate::session::Session;
use crate::targets::{Target, TargetManager};
use crate::waits::{WaitCondition, WaitEngine, WaitResult};
use crate::watchdog::Watchdog;

/// The single entry point a consumer constructs. Owns the session (which
/// owns the event bus, breaking the cycle other subsystems would otherwise
/// have with it) and holds non-owning `Arc` references to every other
/// subsystem, so dropping the session tears down everything that depends
/// on it.
pub struct Client {
    pub session: Arc<Session>,
    pub targets: Arc<TargetManager>,
    pub waits: Arc<WaitEngine>,
    pub selectors: Arc<SelectorEngine>,
    pub actions: Arc<ActionExecutor>,
    pub navigation: Arc<NavigationManager>,
    pub files: Arc<FileIOManager>,
    pub recovery: Arc<RecoveryManager>,
    pub watchdog: Option<Arc<Watchdog>>,
    pub concurrency: Arc<ConcurrencyManager>,
    pub performance: Arc<PerformanceOptimizer>,
    pub observability: Arc<ObservabilityEngine>,
    config: ClientConfig,
    job_counter: AtomicU64,
}

impl Client {
    /// Builds every subsystem from one `ClientConfig` without connecting.
    /// Call [`Self::connect`] before issuing any commands.
    #[must_use]
    pub fn new(config: ClientConfig) -> Arc<Self> {
        let events = Arc::new(EventBus::new(1_000));
        let session = Session::new(config.session.clone(), Arc::clone(&events));
        let targets = TargetManager::new(Arc::clone(&session));
        let waits = Arc::new(WaitEngine::new(Arc::clone(&session), config.waits.clone()));
        let selectors = Arc::new(SelectorEngine::new(Arc::clone(&session)));
        let actions = Arc::new(ActionExecutor::new(Arc::clone(&session), Arc::clone(&selectors), Arc::clone(&waits)));
        let navigation = NavigationManager::new(Arc::clone(&session), Arc::clone(&waits), SpaConfig::default());
        let files = FileIOManager::new(Arc::clone(&session), Arc::clone(&selectors));
        let recovery = Arc::new(RecoveryManager::new(config.recovery.clone()));
        wire_recovery_to_session(&recovery, &session);
        let watchdog = config.enable_watchdog.then(|| Watchdog::new(config.watchdog.clone()));
        let concurrency = ConcurrencyManager::new(config.concurrency.clone());
        session.set_throttle(Arc::clone(&concurrency.throttle));
        let observability = Arc::new(ObservabilityEngine::new(1_000));

        let eval_session = Arc::clone(&session);
        let evaluator = move |expr: String| {
            let session = Arc::clone(&eval_session);
            async move { session.evaluate_js(&expr).await }
        };
        let performance = Arc::new(PerformanceOptimizer::new(&config.performance, evaluator, config.enable_batching));
        spawn_locator_cache_invalidation(Arc::clone(&session), Arc::clone(&performance));

        Arc::new(Self {
            session,
            targets,
            waits,
            selectors,
            actions,
            navigation,
            files,
            recovery,
            watchdog,
            concurrency,
            performance,
            observability,
            config,
            job_counter: AtomicU64::new(0),
        })
    }

    /// Connects the session, initializes target discovery, starts the
    /// watchdog scanner (if enabled) and the concurrency scheduler.
    pub async fn connect(self: &Arc<Self>) -> Result<()> {
        self.session.connect().await?;
        self.targets.initialize().await?;
        if let Some(watchdog) = &self.watchdog {
            watchdog.start();
        }
        self.concurrency.start();
        Ok(())
    }

    pub async fn close(&self) {
        if let Some(watchdog) = &self.watchdog {
            watchdog.stop();
        }
        self.concurrency.stop();
        self.session.close().await;
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn list_targets(&self) -> Vec<Target> {
        self.targets.list()
    }

    pub async fn navigate(&self, url: &str, timeout_ms: Option<u64>, wait_until: WaitUntil) -> NavigationResult {
        let timeout_ms = timeout_ms.unwrap_or(self.config.waits.state_timeout_ms);
        self.navigation.navigate(url, timeout_ms, wait_until).await
    }

    pub async fn wait_for(&self, condition: WaitCondition, timeout_ms: Option<u64>, stability_ms: Option<u64>) -> WaitResult {
        self.waits.wait_for(condition, timeout_ms, stability_ms).await
    }

    pub async fn find(&self, locator: &Locator) -> Result<Option<crate::selectors::ElementHandle>> {
        self.selectors.find(locator).await
    }

    #[must_use]
    pub fn build_locator(&self, hints: &crate::selectors::HintsMap) -> Option<Locator> {
        self.selectors.build_locator(hints)
    }

    pub async fn click(&self, locator: &Locator) -> ActionResult {
        self.actions.click(locator, None, None).await
    }

    pub async fn click_with_postcondition(&self, locator: &Locator, postcondition: &crate::actions::Guard) -> ActionResult {
        self.actions.click(locator, None, Some(postcondition)).await
    }

    pub async fn type_text(&self, locator: &Locator, text: &str) -> ActionResult {
        self.actions.type_text(locator, text).await
    }

    pub async fn upload_file(&self, locator: &Locator, path: &Path, verify_preview: bool) -> Result<UploadResult> {
        self.files.upload_file(locator, path, verify_preview).await
    }

    pub async fn calculate_checksum(&self, path: &Path) -> Result<String> {
        self.files.calculate_checksum(path).await
    }

    pub async fn wait_for_download(&self, expected_filename: Option<&str>, timeout_ms: u64, download_dir: &Path) -> Result<DownloadResult> {
        self.files
            .wait_for_download(
                None::<fn() -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send>>>,
                expected_filename,
                timeout_ms,
                download_dir,
            )
            .await
    }

    /// Registers the callback the recovery manager's restart-browser tier
    /// invokes once every lesser tier has failed. Not wired automatically
    /// by [`Self::new`]: this Facade only owns the DevTools session, never
    /// the browser process itself (that's `browser_launch::launch_browser`,
    /// run by the consumer before a `ws_url`/`remote_port` even exists to
    /// build a `Client` from), so only the consumer holding that process
    /// handle can actually restart it.
    pub fn set_browser_restart_callback(
        &self,
        f: impl Fn() -> std::pin::Pin<Box<dyn std::future::Future<Output = bool> + Send>> + Send + Sync + 'static,
    ) {
        self.recovery.set_restart_browser_callback(f);
    }

    /// Runs `op` as an observed, recoverable step: records a step trace,
    /// and on failure hands the error to the recovery manager for
    /// escalation before giving up. A failure classified at the
    /// step-retry tier re-invokes `op` itself (not just a probe): recovery
    /// only reports success once `op` has actually produced a value, which
    /// becomes this call's return value.
    pub async fn run_recoverable<T, F, Fut>(&self, job_id: &str, step_name: &str, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        self.observability.start_job(job_id);
        let started = chrono::Utc::now();

        loop {
            match op().await {
                Ok(value) => {
                    self.observability.record_step(
                        job_id,
                        step_name,
                        started,
                        true,
                        ReasonCode::Success,
                        serde_json::Value::Null,
                        serde_json::Value::Null,
                        0,
                    );
                    self.observability.end_job(job_id, true, ReasonCode::Success);
                    return Ok(value);
                }
                Err(err) => {
                    let recovered: Arc<parking_lot::Mutex<Option<T>>> = Arc::new(parking_lot::Mutex::new(None));
                    let op_ref = &op;
                    let step_fn = {
                        let recovered = Arc::clone(&recovered);
                        move || {
                            let recovered = Arc::clone(&recovered);
                            async move {
                                match op_ref().await {
                                    Ok(value) => {
                                        *recovered.lock() = Some(value);
                                        true
                                    }
                                    Err(_) => false,
                                }
                            }
                        }
                    };
                    let recovery_result = self.recovery.attempt_recovery(err.code, "unknown", Some(step_fn)).await;
                    self.observability.record_recovery_attempt(job_id, recovery_result.level, recovery_result.success);

                    if recovery_result.success {
                        if let Some(value) = recovered.lock().take() {
                            self.observability.record_step(
                                job_id,
                                step_name,
                                started,
                                true,
                                ReasonCode::Success,
                                serde_json::Value::Null,
                                serde_json::Value::Null,
                                recovery_result.attempts,
                            );
                            self.observability.end_job(job_id, true, ReasonCode::Success);
                            return Ok(value);
                        }
                        // Recovery succeeded at the state/context/browser tier
                        // rather than by retrying the step itself: the
                        // environment is sound again but `op` itself was
                        // never re-run, so loop back and give it a fresh try.
                        continue;
                    }

                    self.observability.record_step(
                        job_id,
                        step_name,
                        started,
                        false,
                        err.code,
                        serde_json::Value::Null,
                        serde_json::Value::Null,
                        recovery_result.attempts,
                    );
                    self.observability.end_job(job_id, false, err.code);
                    return Err(err);
                }
            }
        }
    }

    /// Submits a unit of work to the concurrency manager, serialized per
    /// `target_id` and prioritized per `priority`.
    pub async fn submit_job<F, Fut>(
        self: &Arc<Self>,
        target_id: impl Into<String>,
        priority: JobPriority,
        run: F,
    ) -> Result<JobResult>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<serde_json::Value>> + Send + 'static,
    {
        let job_id = format!("job-{}", self.job_counter.fetch_add(1, Ordering::SeqCst));
        let job = Job::new(job_id, target_id, priority, move || Box::pin(run()));
        let rx = self.concurrency.submit(job)?;
        rx.await.map_err(|_| CdpError::system("concurrency manager dropped the job result"))
    }
}

/// Wires the state-retry and recreate-context tiers to a real reconnect:
/// this crate models one session/target pair rather than separate browser
/// contexts, so "recreate the context" and "get back to a known-good
/// state" both reduce to the same operation here — tearing down and
/// re-establishing the DevTools session. The restart-browser tier is left
/// unwired; see [`Client::set_browser_restart_callback`].
fn wire_recovery_to_session(recovery: &Arc<RecoveryManager>, session: &Arc<Session>) {
    let point = SafeResetPoint::new("session-ready", {
        let session = Arc::clone(session);
        move || {
            let session = Arc::clone(&session);
            Box::pin(async move { session.is_ready() })
        }
    })
    .with_setup({
        let session = Arc::clone(session);
        move || {
            let session = Arc::clone(&session);
            Box::pin(async move { session.force_reconnect().await.is_ok() })
        }
    });
    recovery.register_reset_point(point);

    recovery.set_recreate_context_callback({
        let session = Arc::clone(session);
        move || {
            let session = Arc::clone(&session);
            Box::pin(async move { session.force_reconnect().await.is_ok() })
        }
    });
}

/// Drops every locator cache entry on main-frame navigation, including
/// same-document (hash/History API) navigations — a resolved node or
/// object id from the previous document is never valid afterwards.
fn spawn_locator_cache_invalidation(session: Arc<Session>, performance: Arc<PerformanceOptimizer>) {
    let mut frame_navigated = session.events().on("Page.frameNavigated");
    let mut same_document_navigated = session.events().on("Page.navigatedWithinDocument");
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = frame_navigated.recv() => {
                    let Some(event) = event else { break };
                    let is_main_frame = event.params.get("frame").is_some_and(|f| f.get("parentId").is_none());
                    if is_main_frame {
                        performance.locator_cache.invalidate_all();
                    }
                }
                event = same_document_navigated.recv() => {
                    if event.is_none() {
                        break;
                    }
                    performance.locator_cache.invalidate_all();
                }
            }
        }
    });
}
