//! Session state machine and health reporting types.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`super::Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Subscribing,
    Ready,
    Reconnecting,
    Recovering,
    Closing,
    Closed,
    Failed,
}

/// Coarse health classification surfaced by `Session::health_status()` and
/// aggregated into the Client Facade's `get_health()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}
