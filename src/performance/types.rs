//! Types for the locator cache, command batcher and screenshot budget.

use serde::{Deserialize, Serialize};

/// A cached resolution for a selector string within one frame context.
#[derive(Debug, Clone)]
pub struct CachedLocator {
    pub node_id: i64,
    pub object_id: Option<String>,
    pub cached_at: std::time::Instant,
}

/// Trigger kind for a screenshot request, matched against
/// [`crate::config::ScreenshotPolicy`]'s enable flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScreenshotTrigger {
    Error,
    StateChange,
    Manual,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScreenshotBudgetSnapshot {
    pub taken: u32,
    pub skipped: u32,
    pub limit: u32,
}

/// One pending JS evaluation inside a batch, with the channel used to
/// deliver its individual result once the fused call returns.
pub struct PendingEval {
    pub expression: String,
    pub respond: tokio::sync::oneshot::Sender<crate::error::Result<serde_json::Value>>,
}
