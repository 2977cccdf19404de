//! Recovery level and result types, plus the escalation-tier configuration.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ReasonCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryLevel {
    None,
    StepRetry,
    StateRetry,
    RecreateContext,
    RestartBrowser,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryResult {
    pub success: bool,
    pub level: RecoveryLevel,
    pub attempts: u32,
    pub elapsed_ms: u64,
    pub message: Option<String>,
    pub recovered_to: Option<String>,
}

impl RecoveryResult {
    #[must_use]
    pub fn success(level: RecoveryLevel, attempts: u32, elapsed_ms: u64, recovered_to: impl Into<String>) -> Self {
        Self {
            success: true,
            level,
            attempts,
            elapsed_ms,
            message: None,
            recovered_to: Some(recovered_to.into()),
        }
    }

    #[must_use]
    pub fn failure(level: RecoveryLevel, attempts: u32, elapsed_ms: u64, message: impl Into<String>) -> Self {
        Self {
            success: false,
            level,
            attempts,
            elapsed_ms,
            message: Some(message.into()),
            recovered_to: None,
        }
    }
}

/// A known-safe point the state-retry tier can verify or set up.
pub struct SafeResetPoint {
    pub name: String,
    pub verify: Arc<dyn Fn() -> Pin<Box<dyn Future<Output = bool> + Send>> + Send + Sync>,
    pub setup: Option<Arc<dyn Fn() -> Pin<Box<dyn Future<Output = bool> + Send>> + Send + Sync>>,
}

impl SafeResetPoint {
    pub fn new(
        name: impl Into<String>,
        verify: impl Fn() -> Pin<Box<dyn Future<Output = bool> + Send>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            verify: Arc::new(verify),
            setup: None,
        }
    }

    #[must_use]
    pub fn with_setup(mut self, setup: impl Fn() -> Pin<Box<dyn Future<Output = bool> + Send>> + Send + Sync + 'static) -> Self {
        self.setup = Some(Arc::new(setup));
        self
    }
}

pub(super) fn default_retriable() -> Vec<ReasonCode> {
    vec![
        ReasonCode::TimeoutStep,
        ReasonCode::TimeoutNetwork,
        ReasonCode::ElementNotFound,
        ReasonCode::ElementNotClickable,
        ReasonCode::ElementCovered,
        ReasonCode::NetworkError,
        ReasonCode::CdpCommandFailed,
    ]
}

pub(super) fn default_context_errors() -> Vec<ReasonCode> {
    vec![
        ReasonCode::TargetCrashed,
        ReasonCode::TargetClosed,
        ReasonCode::CdpDisconnected,
        ReasonCode::ElementDetached,
    ]
}

pub(super) fn default_browser_errors() -> Vec<ReasonCode> {
    vec![
        ReasonCode::BrowserCrashed,
        ReasonCode::BrowserHung,
        ReasonCode::BrowserNotResponding,
        ReasonCode::CdpReconnectFailed,
    ]
}
