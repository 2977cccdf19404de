//! Navigation result and SPA-detection configuration types.

use serde::{Deserialize, Serialize};

use crate::error::ReasonCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationType {
    Full,
    SameDocument,
    Reload,
    BackForward,
    SpaRoute,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    pub success: bool,
    pub navigation_type: NavigationType,
    pub start_url: String,
    pub end_url: String,
    pub elapsed_ms: u64,
    pub reason: Option<ReasonCode>,
    pub message: Option<String>,
    pub is_spa: bool,
}

impl NavigationResult {
    #[must_use]
    pub fn success(navigation_type: NavigationType, start_url: impl Into<String>, end_url: impl Into<String>, elapsed_ms: u64, is_spa: bool) -> Self {
        Self {
            success: true,
            navigation_type,
            start_url: start_url.into(),
            end_url: end_url.into(),
            elapsed_ms,
            reason: None,
            message: None,
            is_spa,
        }
    }

    #[must_use]
    pub fn failure(
        navigation_type: NavigationType,
        start_url: impl Into<String>,
        end_url: impl Into<String>,
        elapsed_ms: u64,
        reason: ReasonCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            navigation_type,
            start_url: start_url.into(),
            end_url: end_url.into(),
            elapsed_ms,
            reason: Some(reason),
            message: Some(message.into()),
            is_spa: false,
        }
    }
}

/// Controls SPA route-change detection and the settle/idle/stability waits
/// `navigate_spa` runs after the triggering action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaConfig {
    pub loading_indicators: Vec<String>,
    pub route_settle_ms: u64,
    pub data_fetch_timeout_ms: u64,
    pub render_stable_ms: u64,
}

impl Default for SpaConfig {
    fn default() -> Self {
        Self {
            loading_indicators: vec![
                "[data-loading]".into(),
                ".loading".into(),
                ".spinner".into(),
                "[aria-busy=\"true\"]".into(),
                ".skeleton".into(),
                "[data-skeleton]".into(),
            ],
            route_settle_ms: 300,
            data_fetch_timeout_ms: 10_000,
            render_stable_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitUntil {
    Commit,
    DomContentLoaded,
    NetworkIdle,
    Load,
}
