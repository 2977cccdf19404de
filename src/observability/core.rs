//! Bounded in-memory job trace store.
//!
//! An `ObservabilityEngine` is constructed once by the Client Facade and
//! handed to every subsystem as an `Arc`, rather than reached through a
//! `once_cell`/`lazy_static` global.

use std::collections::VecDeque;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::ReasonCode;
use crate::recovery::RecoveryLevel;

use super::types::{JobTrace, RecoveryAttemptRecord, StateTransition, StepTrace};

pub struct ObservabilityEngine {
    max_retained_jobs: usize,
    active: DashMap<String, JobTrace>,
    completed: Mutex<VecDeque<JobTrace>>,
}

impl ObservabilityEngine {
    #[must_use]
    pub fn new(max_retained_jobs: usize) -> Self {
        Self {
            max_retained_jobs: max_retained_jobs.max(1),
            active: DashMap::new(),
            completed: Mutex::new(VecDeque::new()),
        }
    }

    pub fn start_job(&self, job_id: impl Into<String>) {
        let job_id = job_id.into();
        self.active.entry(job_id.clone()).or_insert_with(|| JobTrace::new(job_id));
    }

    pub fn record_step(
        &self,
        job_id: &str,
        name: impl Into<String>,
        started_at: chrono::DateTime<Utc>,
        success: bool,
        reason: ReasonCode,
        input: serde_json::Value,
        output: serde_json::Value,
        retry_count: u32,
    ) {
        if let Some(mut trace) = self.active.get_mut(job_id) {
            trace.steps.push(StepTrace {
                name: name.into(),
                started_at,
                ended_at: Utc::now(),
                success,
                reason,
                input,
                output,
                retry_count,
            });
        }
    }

    pub fn record_transition(&self, job_id: &str, from: impl Into<String>, to: impl Into<String>) {
        if let Some(mut trace) = self.active.get_mut(job_id) {
            trace.transitions.push(StateTransition { at: Utc::now(), from: from.into(), to: to.into() });
        }
    }

    pub fn record_recovery_attempt(&self, job_id: &str, level: RecoveryLevel, success: bool) {
        if let Some(mut trace) = self.active.get_mut(job_id) {
            trace.recovery_attempts.push(RecoveryAttemptRecord { at: Utc::now(), level, success });
        }
    }

    /// Closes out a job's trace and moves it into the bounded completed
    /// ring, evicting the oldest entry once `max_retained_jobs` is exceeded.
    pub fn end_job(&self, job_id: &str, success: bool, reason: ReasonCode) {
        let Some((_, mut trace)) = self.active.remove(job_id) else { return };
        trace.ended_at = Some(Utc::now());
        trace.success = Some(success);
        trace.reason = Some(reason);

        let mut completed = self.completed.lock();
        completed.push_back(trace);
        while completed.len() > self.max_retained_jobs {
            completed.pop_front();
        }
    }

    #[must_use]
    pub fn job_trace(&self, job_id: &str) -> Option<JobTrace> {
        if let Some(trace) = self.active.get(job_id) {
            return Some(trace.clone());
        }
        self.completed.lock().iter().find(|t| t.job_id == job_id).cloned()
    }

    #[must_use]
    pub fn recent_traces(&self) -> Vec<JobTrace> {
        self.completed.lock().iter().cloned().collect()
    }

    /// Serializes every retained job trace (completed, plus any still
    /// active) to a single JSON document.
    #[must_use]
    pub fn export_json(&self) -> serde_json::Value {
        let mut jobs: Vec<JobTrace> = self.completed.lock().iter().cloned().collect();
        jobs.extend(self.active.iter().map(|e| e.value().clone()));
        serde_json::json!({ "jobs": jobs })
    }
}
