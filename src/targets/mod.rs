//! Target Manager: inventory of attached browser targets (pages,
//! workers, popups), kept current via `Target.*` events.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{CdpError, ReasonCode, Result};
use crate::session::Session;

const TARGET_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// CDP target kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Page,
    BackgroundPage,
    ServiceWorker,
    SharedWorker,
    Browser,
    Other,
}

impl TargetType {
    #[must_use]
    pub fn from_wire(s: &str) -> Self {
        match s {
            "page" => Self::Page,
            "background_page" => Self::BackgroundPage,
            "service_worker" => Self::ServiceWorker,
            "shared_worker" => Self::SharedWorker,
            "browser" => Self::Browser,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub target_id: String,
    pub target_type: TargetType,
    pub title: String,
    pub url: String,
    pub attached: bool,
    /// Set iff `attached` is true — the id of the session this manager
    /// attached for this target.
    pub session_id: Option<String>,
    pub opener_id: Option<String>,
}

/// Tracks the live target inventory and auto-attaches to new pages/popups.
pub struct TargetManager {
    session: Arc<Session>,
    targets: DashMap<String, Target>,
    main_target_id: Mutex<Option<String>>,
}

impl TargetManager {
    #[must_use]
    pub fn new(session: Arc<Session>) -> Arc<Self> {
        Arc::new(Self {
            session,
            targets: DashMap::new(),
            main_target_id: Mutex::new(None),
        })
    }

    /// Enable auto-attach, fetch the current target list, and start the
    /// background listener that keeps it current.
    pub async fn initialize(self: &Arc<Self>) -> Result<()> {
        self.session
            .send_command(
                "Target.setDiscoverTargets",
                serde_json::json!({"discover": true}),
            )
            .await?;
        self.session
            .send_command(
                "Target.setAutoAttach",
                serde_json::json!({
                    "autoAttach": true,
                    "waitForDebuggerOnStart": false,
                    "flatten": true,
                }),
            )
            .await?;

        let response = self
            .session
            .send_command("Target.getTargets", serde_json::json!({}))
            .await?;
        if let Some(infos) = response.get("targetInfos").and_then(|v| v.as_array()) {
            for info in infos {
                self.upsert_from_info(info);
            }
        }

        if self.main_target_id.lock().is_none() {
            if let Some(page) = self.primary_page() {
                *self.main_target_id.lock() = Some(page.target_id);
            }
        }

        self.spawn_listener();
        Ok(())
    }

    /// Inserts or updates a target record from a `targetInfo` payload.
    /// `attached`/`session_id` survive an update unless this manager never
    /// attached the target itself — info-changed events report the
    /// browser's attached flag, which this manager's own attach state takes
    /// precedence over (a target is attached iff an attached-session id is
    /// set).
    fn upsert_from_info(&self, info: &serde_json::Value) {
        let Some(target_id) = info.get("targetId").and_then(|v| v.as_str()) else {
            return;
        };
        let existing = self.targets.get(target_id).map(|e| (e.attached, e.session_id.clone()));
        let (attached, session_id) = existing.unwrap_or((
            info.get("attached").and_then(serde_json::Value::as_bool).unwrap_or(false),
            None,
        ));
        let target = Target {
            target_id: target_id.to_string(),
            target_type: TargetType::from_wire(
                info.get("type").and_then(|v| v.as_str()).unwrap_or("other"),
            ),
            title: info.get("title").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            url: info.get("url").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            attached,
            session_id,
            opener_id: info
                .get("openerId")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        };
        self.targets.insert(target.target_id.clone(), target);
    }

    fn spawn_listener(self: &Arc<Self>) {
        let created = self.session.events().on("Target.targetCreated");
        let changed = self.session.events().on("Target.targetInfoChanged");
        let destroyed = self.session.events().on("Target.targetDestroyed");
        let crashed = self.session.events().on("Target.targetCrashed");
        let detached = self.session.events().on("Target.detachedFromTarget");

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut created = created;
            let mut changed = changed;
            let mut destroyed = destroyed;
            let mut crashed = crashed;
            let mut detached = detached;
            loop {
                tokio::select! {
                    Some(event) = created.recv() => {
                        if let Some(info) = event.params.get("targetInfo") {
                            this.upsert_from_info(info);
                            let is_page = info.get("type").and_then(|v| v.as_str()) == Some("page");
                            let already_attached = info.get("attached").and_then(serde_json::Value::as_bool).unwrap_or(false);
                            if is_page && !already_attached {
                                if let Some(target_id) = info.get("targetId").and_then(|v| v.as_str()) {
                                    let target_id = target_id.to_string();
                                    let this = Arc::clone(&this);
                                    tokio::spawn(async move { this.attach(&target_id).await; });
                                }
                            }
                        }
                    }
                    Some(event) = changed.recv() => {
                        if let Some(info) = event.params.get("targetInfo") {
                            this.upsert_from_info(info);
                        }
                    }
                    Some(event) = destroyed.recv() => {
                        if let Some(id) = event.field_str("targetId") {
                            this.targets.remove(id);
                            this.promote_main_target_if_destroyed(id);
                        }
                    }
                    Some(event) = crashed.recv() => {
                        if let Some(id) = event.field_str("targetId") {
                            tracing::warn!(target_id = id, "target crashed");
                            if let Some(mut entry) = this.targets.get_mut(id) {
                                entry.attached = false;
                                entry.session_id = None;
                            }
                        }
                    }
                    Some(event) = detached.recv() => {
                        if let Some(id) = event.field_str("targetId") {
                            if let Some(mut entry) = this.targets.get_mut(id) {
                                entry.attached = false;
                                entry.session_id = None;
                            }
                        }
                    }
                    else => break,
                }
            }
        });
    }

    /// Issues `Target.attachToTarget` for a newly created page target and
    /// stores the resulting session id.
    async fn attach(self: &Arc<Self>, target_id: &str) {
        match self
            .session
            .send_command("Target.attachToTarget", serde_json::json!({"targetId": target_id, "flatten": true}))
            .await
        {
            Ok(result) => {
                let session_id = result.get("sessionId").and_then(|v| v.as_str()).map(str::to_string);
                if let Some(mut entry) = self.targets.get_mut(target_id) {
                    entry.attached = session_id.is_some();
                    entry.session_id = session_id;
                }
            }
            Err(err) => {
                tracing::warn!(target_id, error = %err, "failed to attach to target");
            }
        }
    }

    #[must_use]
    pub fn list(&self) -> Vec<Target> {
        self.targets.iter().map(|e| e.value().clone()).collect()
    }

    #[must_use]
    pub fn get(&self, target_id: &str) -> Option<Target> {
        self.targets.get(target_id).map(|e| e.value().clone())
    }

    /// The first attached page target, if any — the typical main-page
    /// target a freshly connected client wants to drive.
    #[must_use]
    pub fn primary_page(&self) -> Option<Target> {
        self.targets
            .iter()
            .find(|e| e.target_type == TargetType::Page && e.attached)
            .map(|e| e.value().clone())
    }

    #[must_use]
    pub fn status(&self) -> serde_json::Value {
        serde_json::json!({
            "target_count": self.targets.len(),
            "page_count": self.targets.iter().filter(|e| e.target_type == TargetType::Page).count(),
        })
    }

    /// Targets whose URL contains `substring`.
    #[must_use]
    pub fn find_by_url(&self, substring: &str) -> Vec<Target> {
        self.targets.iter().filter(|e| e.url.contains(substring)).map(|e| e.value().clone()).collect()
    }

    #[must_use]
    pub fn find_by_kind(&self, kind: TargetType) -> Vec<Target> {
        self.targets.iter().filter(|e| e.target_type == kind).map(|e| e.value().clone()).collect()
    }

    /// The designated main target, promoted to a surviving attached page if
    /// the original one was destroyed.
    #[must_use]
    pub fn main_target(&self) -> Option<Target> {
        let id = self.main_target_id.lock().clone()?;
        self.get(&id)
    }

    fn promote_main_target_if_destroyed(&self, destroyed_id: &str) {
        let mut main_id = self.main_target_id.lock();
        if main_id.as_deref() != Some(destroyed_id) {
            return;
        }
        *main_id = self
            .targets
            .iter()
            .find(|e| e.target_type == TargetType::Page && e.attached)
            .map(|e| e.key().clone());
    }

    /// Creates a new browser target (tab) for `url` and returns it.
    pub async fn create_target(&self, url: &str) -> Result<Target> {
        let response = self
            .session
            .send_command("Target.createTarget", serde_json::json!({"url": url}))
            .await?;
        let target_id = response
            .get("targetId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CdpError::new(ReasonCode::CdpProtocolError, "Target.createTarget returned no targetId"))?
            .to_string();

        // The targetCreated event usually races this response; seed a
        // minimal record so callers can look it up immediately either way.
        self.targets.entry(target_id.clone()).or_insert_with(|| Target {
            target_id: target_id.clone(),
            target_type: TargetType::Page,
            title: String::new(),
            url: url.to_string(),
            attached: false,
            session_id: None,
            opener_id: None,
        });

        self.get(&target_id).ok_or_else(|| CdpError::new(ReasonCode::CdpProtocolError, "created target vanished"))
    }

    /// Closes a target by id.
    pub async fn close_target(&self, target_id: &str) -> Result<()> {
        self.session
            .send_command("Target.closeTarget", serde_json::json!({"targetId": target_id}))
            .await?;
        self.targets.remove(target_id);
        Ok(())
    }

    /// Polls the inventory until `predicate` matches a target or the
    /// timeout elapses.
    pub async fn wait_for_target(
        &self,
        predicate: impl Fn(&Target) -> bool,
        timeout_ms: u64,
    ) -> Result<Target> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if let Some(found) = self.targets.iter().find(|e| predicate(e.value())).map(|e| e.value().clone()) {
                return Ok(found);
            }
            if Instant::now() >= deadline {
                return Err(CdpError::new(ReasonCode::TimeoutStep, "no matching target appeared before the timeout"));
            }
            tokio::time::sleep(TARGET_POLL_INTERVAL).await;
        }
    }

    /// Waits for a new attached page target with an `opener_id`, the usual
    /// shape of a `window.open()`-style popup.
    pub async fn wait_for_popup(&self, timeout_ms: u64) -> Result<Target> {
        let known: std::collections::HashSet<String> = self.targets.iter().map(|e| e.key().clone()).collect();
        self.wait_for_target(
            |t| t.target_type == TargetType::Page && t.opener_id.is_some() && !known.contains(&t.target_id),
            timeout_ms,
        )
        .await
    }
}
