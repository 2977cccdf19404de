//! Action contract types — idempotent-guard / precondition / execute /
//! postcondition.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ReasonCode;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Click,
    DoubleClick,
    RightClick,
    Type,
    Clear,
    Select,
    Check,
    Uncheck,
    Hover,
    ScrollTo,
    DragDrop,
    Upload,
    Focus,
    Blur,
}

type AsyncCheck = dyn Fn(Arc<Session>) -> Pin<Box<dyn Future<Output = bool> + Send>> + Send + Sync;

/// A boolean JS-backed condition evaluated before or after an action runs.
#[derive(Clone)]
pub struct Guard {
    pub description: String,
    pub failure_reason: ReasonCode,
    pub timeout_ms: u64,
    check: Arc<AsyncCheck>,
}

impl Guard {
    pub fn new(
        description: impl Into<String>,
        failure_reason: ReasonCode,
        timeout_ms: u64,
        check: impl Fn(Arc<Session>) -> Pin<Box<dyn Future<Output = bool> + Send>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            description: description.into(),
            failure_reason,
            timeout_ms,
            check: Arc::new(check),
        }
    }

    /// Evaluates the guard, polling at a fixed interval until it passes or
    /// `timeout_ms` elapses.
    pub async fn wait_until(&self, session: &Arc<Session>) -> bool {
        let start = std::time::Instant::now();
        let deadline = Duration::from_millis(self.timeout_ms);
        loop {
            if (self.check)(Arc::clone(session)).await {
                return true;
            }
            if start.elapsed() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// A guard wrapping a fallible check: any error from the check function is
/// treated as "not satisfied" rather than propagated.
pub type IdempotentGuard = Guard;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub action: ActionType,
    pub success: bool,
    pub reason: ReasonCode,
    pub elapsed_ms: u64,
    pub message: Option<String>,
    pub skipped_idempotent: bool,
}

impl ActionResult {
    #[must_use]
    pub fn success(action: ActionType, elapsed_ms: u64) -> Self {
        Self {
            action,
            success: true,
            reason: ReasonCode::Success,
            elapsed_ms,
            message: None,
            skipped_idempotent: false,
        }
    }

    #[must_use]
    pub fn skipped(action: ActionType, elapsed_ms: u64) -> Self {
        Self {
            action,
            success: true,
            reason: ReasonCode::SkippedIdempotent,
            elapsed_ms,
            message: None,
            skipped_idempotent: true,
        }
    }

    #[must_use]
    pub fn failure(action: ActionType, reason: ReasonCode, elapsed_ms: u64, message: impl Into<String>) -> Self {
        Self {
            action,
            success: false,
            reason,
            elapsed_ms,
            message: Some(message.into()),
            skipped_idempotent: false,
        }
    }
}
