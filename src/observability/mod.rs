//! Observability: structured failure reasons live in [`crate::error`];
//! this module is the step/job trace store.

mod core;
mod types;

pub use core::ObservabilityEngine;
pub use types::{JobTrace, RecoveryAttemptRecord, StateTransition, StepTrace};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReasonCode;
    use crate::recovery::RecoveryLevel;

    #[test]
    fn job_trace_accumulates_steps_and_closes_out() {
        let engine = ObservabilityEngine::new(10);
        engine.start_job("job-1");
        let started = chrono::Utc::now();
        engine.record_step("job-1", "click", started, true, ReasonCode::Success, serde_json::json!({}), serde_json::json!({}), 0);
        engine.record_transition("job-1", "ready", "navigating");
        engine.record_recovery_attempt("job-1", RecoveryLevel::StepRetry, true);
        engine.end_job("job-1", true, ReasonCode::Success);

        let trace = engine.job_trace("job-1").expect("trace retained");
        assert_eq!(trace.steps.len(), 1);
        assert_eq!(trace.transitions.len(), 1);
        assert_eq!(trace.recovery_attempts.len(), 1);
        assert_eq!(trace.success, Some(true));
    }

    #[test]
    fn retained_jobs_are_bounded() {
        let engine = ObservabilityEngine::new(2);
        for i in 0..5 {
            let id = format!("job-{i}");
            engine.start_job(&id);
            engine.end_job(&id, true, ReasonCode::Success);
        }
        assert_eq!(engine.recent_traces().len(), 2);
        assert!(engine.job_trace("job-0").is_none());
        assert!(engine.job_trace("job-4").is_some());
    }

    #[test]
    fn export_json_includes_active_and_completed() {
        let engine = ObservabilityEngine::new(10);
        engine.start_job("active-job");
        engine.start_job("done-job");
        engine.end_job("done-job", true, ReasonCode::Success);

        let exported = engine.export_json();
        let jobs = exported["jobs"].as_array().unwrap();
        assert_eq!(jobs.len(), 2);
    }
}
