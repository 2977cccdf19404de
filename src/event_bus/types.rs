//! Wire-level event representation shared by every subscriber.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single CDP event frame: `{method, params}` plus the session it arrived
/// on and the local receive time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdpEvent {
    pub method: String,
    pub params: serde_json::Value,
    pub session_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl CdpEvent {
    #[must_use]
    pub fn new(method: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            method: method.into(),
            params,
            session_id: None,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// `params.<field>` as a string, if present.
    #[must_use]
    pub fn field_str(&self, field: &str) -> Option<&str> {
        self.params.get(field).and_then(|v| v.as_str())
    }
}
