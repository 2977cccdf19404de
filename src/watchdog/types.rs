//! Per-context health record and status types.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Coarse health classification for one watched context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextStatus {
    Healthy,
    Degraded,
    Unresponsive,
    Dead,
    Poisoned,
}

/// Liveness bookkeeping for one context (a job/target pairing), updated by
/// callers as heartbeats/events/progress arrive and read by the scanner.
#[derive(Debug, Clone)]
pub struct HealthRecord {
    pub context_id: String,
    pub started_at: Instant,
    pub last_heartbeat: Instant,
    pub last_event: Instant,
    pub last_progress: Instant,
    pub status: ContextStatus,
    pub consecutive_failures: u32,
    pub poisoned_until: Option<Instant>,
}

impl HealthRecord {
    #[must_use]
    pub fn new(context_id: impl Into<String>) -> Self {
        let now = Instant::now();
        Self {
            context_id: context_id.into(),
            started_at: now,
            last_heartbeat: now,
            last_event: now,
            last_progress: now,
            status: ContextStatus::Healthy,
            consecutive_failures: 0,
            poisoned_until: None,
        }
    }

    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        matches!(self.status, ContextStatus::Poisoned)
            && self.poisoned_until.is_some_and(|until| Instant::now() < until)
    }
}

/// Snapshot of a health record suitable for logging/export, with absolute
/// ages instead of `Instant`s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub context_id: String,
    pub status: ContextStatus,
    pub heartbeat_age_ms: u64,
    pub event_age_ms: u64,
    pub progress_age_ms: u64,
    pub wall_clock_ms: u64,
    pub consecutive_failures: u32,
}

impl From<&HealthRecord> for HealthSnapshot {
    fn from(record: &HealthRecord) -> Self {
        let now = Instant::now();
        Self {
            context_id: record.context_id.clone(),
            status: record.status,
            heartbeat_age_ms: now.duration_since(record.last_heartbeat).as_millis() as u64,
            event_age_ms: now.duration_since(record.last_event).as_millis() as u64,
            progress_age_ms: now.duration_since(record.last_progress).as_millis() as u64,
            wall_clock_ms: now.duration_since(record.started_at).as_millis() as u64,
            consecutive_failures: record.consecutive_failures,
        }
    }
}
