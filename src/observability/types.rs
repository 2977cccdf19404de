//! Trace types accumulated by the [`super::ObservabilityEngine`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ReasonCode;
use crate::recovery::RecoveryLevel;

/// One executed step (a wait, an action, a navigation) within a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTrace {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub success: bool,
    pub reason: ReasonCode,
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    pub retry_count: u32,
}

/// A session/context lifecycle transition observed during a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub at: DateTime<Utc>,
    pub from: String,
    pub to: String,
}

/// One escalation attempt recorded by the recovery manager during a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryAttemptRecord {
    pub at: DateTime<Utc>,
    pub level: RecoveryLevel,
    pub success: bool,
}

/// Accumulates everything observed while running one job: step traces,
/// state transitions and recovery attempts, with a terminal outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTrace {
    pub job_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub steps: Vec<StepTrace>,
    pub transitions: Vec<StateTransition>,
    pub recovery_attempts: Vec<RecoveryAttemptRecord>,
    pub success: Option<bool>,
    pub reason: Option<ReasonCode>,
}

impl JobTrace {
    #[must_use]
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            started_at: Utc::now(),
            ended_at: None,
            steps: Vec::new(),
            transitions: Vec::new(),
            recovery_attempts: Vec::new(),
            success: None,
            reason: None,
        }
    }
}
