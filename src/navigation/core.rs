//! Navigation Manager: full/reload/back-forward/SPA navigation with
//! redirect-loop and unexpected-page detection.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use regex::Regex;

use crate::error::ReasonCode;
use crate::session::Session;
use crate::waits::{WaitCondition, WaitEngine};

use super::types::{NavigationResult, NavigationType, SpaConfig, WaitUntil};

const DETECT_SPA_JS: &str = r"function() {
    if (window.__REACT_DEVTOOLS_GLOBAL_HOOK__ || document.querySelector('[data-reactroot]')) return 'react';
    if (window.__VUE__ || document.querySelector('[data-v-app]')) return 'vue';
    if (window.ng || document.querySelector('[ng-version]')) return 'angular';
    if (window.__NEXT_DATA__ || document.querySelector('#__next')) return 'next';
    if (window.__NUXT__ || document.querySelector('#__nuxt')) return 'nuxt';
    if (document.querySelector('[data-router]') || document.querySelector('[data-route]')) return 'generic';
    return null;
}";

#[derive(Debug, Clone)]
struct HistoryEntry {
    url: String,
    #[allow(dead_code)]
    at: chrono::DateTime<chrono::Utc>,
}

const MAX_REDIRECTS: usize = 10;

pub struct NavigationManager {
    session: Arc<Session>,
    waits: Arc<WaitEngine>,
    spa_config: SpaConfig,
    history: Mutex<Vec<HistoryEntry>>,
    is_spa: AtomicBool,
    spa_known: AtomicBool,
    redirect_count: AtomicU64,
}

impl NavigationManager {
    #[must_use]
    pub fn new(session: Arc<Session>, waits: Arc<WaitEngine>, spa_config: SpaConfig) -> Arc<Self> {
        let manager = Arc::new(Self {
            session,
            waits,
            spa_config,
            history: Mutex::new(Vec::new()),
            is_spa: AtomicBool::new(false),
            spa_known: AtomicBool::new(false),
            redirect_count: AtomicU64::new(0),
        });
        manager.spawn_listener();
        manager
    }

    fn spawn_listener(self: &Arc<Self>) {
        let mut frame_navigated = self.session.events().on("Page.frameNavigated");
        let this = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = frame_navigated.recv().await {
                let Some(frame) = event.params.get("frame") else { continue };
                if frame.get("parentId").is_some() {
                    continue; // only the main frame counts toward redirect tracking
                }
                let url = frame.get("url").and_then(|v| v.as_str()).unwrap_or_default().to_string();

                let mut history = this.history.lock();
                history.push(HistoryEntry { url, at: chrono::Utc::now() });
                if history.len() > 200 {
                    let overflow = history.len() - 200;
                    history.drain(0..overflow);
                }
                drop(history);

                // Counts every qualifying main-frame navigation seen since
                // the call started (reset in `navigate`), not just
                // consecutive-duplicate URLs — a loop that cycles through
                // more than one URL (A -> B -> A -> B -> ...) must still trip.
                this.redirect_count.fetch_add(1, Ordering::Relaxed);
            }
        });
    }

    async fn current_url(&self) -> String {
        self.session.get_current_url().await.unwrap_or_default()
    }

    pub async fn navigate(&self, url: &str, timeout_ms: u64, wait_until: WaitUntil) -> NavigationResult {
        let start = Instant::now();
        let start_url = self.current_url().await;
        self.redirect_count.store(0, Ordering::Relaxed);

        if let Err(e) = self
            .session
            .send_command("Page.navigate", serde_json::json!({"url": url}))
            .await
        {
            return NavigationResult::failure(
                NavigationType::Full,
                &start_url,
                &start_url,
                start.elapsed().as_millis() as u64,
                ReasonCode::NavigationFailed,
                e.to_string(),
            );
        }

        let wait_success = match wait_until {
            WaitUntil::Commit => true,
            WaitUntil::DomContentLoaded => {
                self.waits
                    .wait_for(WaitCondition::js_expression("document.readyState !== 'loading'"), Some(timeout_ms), Some(0))
                    .await
                    .success
            }
            WaitUntil::NetworkIdle => self.waits.wait_for_network_idle(Some(timeout_ms), None).await.success,
            WaitUntil::Load => self.waits.wait_for_navigation(Some(timeout_ms)).await.success,
        };

        let end_url = self.current_url().await;

        if self.redirect_count.load(Ordering::Relaxed) as usize > MAX_REDIRECTS {
            return NavigationResult::failure(
                NavigationType::Full,
                &start_url,
                &end_url,
                start.elapsed().as_millis() as u64,
                ReasonCode::RedirectLoop,
                format!("too many redirects ({})", self.redirect_count.load(Ordering::Relaxed)),
            );
        }

        if !wait_success {
            return NavigationResult::failure(
                NavigationType::Full,
                &start_url,
                &end_url,
                start.elapsed().as_millis() as u64,
                ReasonCode::NavigationTimeout,
                format!("navigation did not complete within {timeout_ms}ms"),
            );
        }

        let is_spa = self.detect_spa().await;
        NavigationResult::success(NavigationType::Full, start_url, end_url, start.elapsed().as_millis() as u64, is_spa)
    }

    /// Triggers `action` (e.g. a click on an in-app link) then waits for a
    /// route change, network idle, and render stability — rather than a
    /// full page load, which an SPA route change never produces.
    pub async fn navigate_spa<F, Fut>(&self, action: F, url_pattern: Option<&str>, timeout_ms: u64) -> NavigationResult
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = crate::error::Result<()>>,
    {
        let start = Instant::now();
        let start_url = self.current_url().await;

        if let Err(e) = action().await {
            return NavigationResult::failure(
                NavigationType::SpaRoute,
                &start_url,
                &start_url,
                start.elapsed().as_millis() as u64,
                ReasonCode::NavigationFailed,
                e.to_string(),
            );
        }

        if let Some(pattern) = url_pattern {
            if !self.wait_for_url_pattern(pattern, timeout_ms).await {
                let end_url = self.current_url().await;
                return NavigationResult::failure(
                    NavigationType::SpaRoute,
                    &start_url,
                    &end_url,
                    start.elapsed().as_millis() as u64,
                    ReasonCode::SpaNotReady,
                    format!("URL did not match pattern: {pattern}"),
                );
            }
        }

        tokio::time::sleep(std::time::Duration::from_millis(self.spa_config.route_settle_ms)).await;

        let elapsed_so_far = start.elapsed().as_millis() as u64;
        if elapsed_so_far < timeout_ms {
            let remaining = (timeout_ms - elapsed_so_far).min(self.spa_config.data_fetch_timeout_ms);
            self.waits.wait_for_network_idle(Some(remaining), None).await;
        }

        let elapsed_so_far = start.elapsed().as_millis() as u64;
        if elapsed_so_far < timeout_ms {
            self.wait_for_spa_ready(timeout_ms - elapsed_so_far).await;
        }

        let end_url = self.current_url().await;
        NavigationResult::success(NavigationType::SpaRoute, start_url, end_url, start.elapsed().as_millis() as u64, true)
    }

    async fn wait_for_url_pattern(&self, pattern: &str, timeout_ms: u64) -> bool {
        let regex = Regex::new(pattern).ok();
        let deadline = Instant::now() + std::time::Duration::from_millis(timeout_ms);
        loop {
            let url = self.current_url().await;
            if url.contains(pattern) || regex.as_ref().is_some_and(|r| r.is_match(&url)) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }

    async fn wait_for_spa_ready(&self, timeout_ms: u64) -> bool {
        let deadline = Instant::now() + std::time::Duration::from_millis(timeout_ms);
        loop {
            let mut has_loading = false;
            for selector in &self.spa_config.loading_indicators {
                let js = format!(
                    "(function() {{ const el = document.querySelector({selector:?}); if (!el) return false; const s = getComputedStyle(el); return s.display !== 'none' && s.visibility !== 'hidden'; }})()"
                );
                if matches!(self.session.evaluate_js(&js).await, Ok(serde_json::Value::Bool(true))) {
                    has_loading = true;
                    break;
                }
            }
            if !has_loading {
                tokio::time::sleep(std::time::Duration::from_millis(self.spa_config.render_stable_ms)).await;
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }

    pub async fn detect_spa(&self) -> bool {
        if self.spa_known.load(Ordering::Relaxed) {
            return self.is_spa.load(Ordering::Relaxed);
        }
        let framework = self.session.call_function_on(None, DETECT_SPA_JS, &[]).await;
        let detected = matches!(framework, Ok(v) if !v.is_null());
        self.is_spa.store(detected, Ordering::Relaxed);
        self.spa_known.store(true, Ordering::Relaxed);
        detected
    }

    /// Returns a description of the current page if it doesn't match any
    /// `expected_patterns` and looks like a login/error/interstitial page.
    pub async fn detect_unexpected_page(&self, expected_patterns: &[&str]) -> Option<String> {
        let url = self.current_url().await;
        let matches_expected = expected_patterns.iter().any(|p| {
            url.contains(p) || Regex::new(p).is_ok_and(|r| r.is_match(&url))
        });
        if matches_expected {
            return None;
        }

        const UNEXPECTED: &[(&str, &str)] = &[
            ("/login", "Login page"),
            ("/signin", "Sign-in page"),
            ("/auth", "Authentication page"),
            ("/error", "Error page"),
            ("/404", "Not found page"),
            ("/500", "Server error page"),
            ("/maintenance", "Maintenance page"),
            ("/blocked", "Blocked page"),
            ("/captcha", "Captcha page"),
            ("/checkpoint", "Checkpoint page"),
        ];
        let lower = url.to_lowercase();
        for (pattern, description) in UNEXPECTED {
            if lower.contains(pattern) {
                return Some((*description).to_string());
            }
        }
        Some(format!("Unexpected URL: {url}"))
    }

    pub async fn go_back(&self, timeout_ms: u64) -> NavigationResult {
        let start = Instant::now();
        let start_url = self.current_url().await;
        let _ = self.session.evaluate_js("window.history.back()").await;
        let wait_result = self.waits.wait_for_navigation(Some(timeout_ms)).await;
        let end_url = self.current_url().await;
        if wait_result.success {
            NavigationResult::success(NavigationType::BackForward, start_url, end_url, start.elapsed().as_millis() as u64, false)
        } else {
            NavigationResult::failure(
                NavigationType::BackForward,
                start_url,
                end_url,
                start.elapsed().as_millis() as u64,
                ReasonCode::NavigationTimeout,
                "back navigation did not complete",
            )
        }
    }

    pub async fn reload(&self, timeout_ms: u64, bypass_cache: bool) -> NavigationResult {
        let start = Instant::now();
        let start_url = self.current_url().await;
        if let Err(e) = self
            .session
            .send_command("Page.reload", serde_json::json!({"ignoreCache": bypass_cache}))
            .await
        {
            return NavigationResult::failure(
                NavigationType::Reload,
                &start_url,
                &start_url,
                start.elapsed().as_millis() as u64,
                ReasonCode::NavigationFailed,
                e.to_string(),
            );
        }
        let wait_result = self.waits.wait_for_navigation(Some(timeout_ms)).await;
        if wait_result.success {
            NavigationResult::success(NavigationType::Reload, start_url.clone(), start_url, start.elapsed().as_millis() as u64, false)
        } else {
            NavigationResult::failure(
                NavigationType::Reload,
                start_url.clone(),
                start_url,
                start.elapsed().as_millis() as u64,
                ReasonCode::NavigationTimeout,
                "reload did not complete",
            )
        }
    }

    #[must_use]
    pub fn navigation_history(&self) -> Vec<String> {
        self.history.lock().iter().map(|e| e.url.clone()).collect()
    }
}
