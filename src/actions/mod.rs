//! Action Contract: idempotent-guard → precondition → execute →
//! postcondition sequencing for user-facing element actions.

mod core;
mod types;

pub use core::ActionExecutor;
pub use types::{ActionResult, ActionType, Guard, IdempotentGuard};

/// One step of an atomic sequence: an action closure plus a human label.
/// The sequence runner in [`execute_atomic_sequence`] stops at the first
/// failing step, short-circuiting on the first non-success `ActionResult`.
pub struct AtomicStep<'a> {
    pub label: &'a str,
    pub run: Box<dyn FnOnce() -> std::pin::Pin<Box<dyn std::future::Future<Output = ActionResult> + Send + 'a>> + Send + 'a>,
}

/// Runs `steps` in order, stopping at (and returning) the first failure.
/// Returns every result produced, successes included.
pub async fn execute_atomic_sequence(steps: Vec<AtomicStep<'_>>) -> Vec<ActionResult> {
    let mut results = Vec::with_capacity(steps.len());
    for step in steps {
        let result = (step.run)().await;
        let failed = !result.success;
        results.push(result);
        if failed {
            break;
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReasonCode;

    #[tokio::test]
    async fn sequence_stops_at_first_failure() {
        let steps = vec![
            AtomicStep {
                label: "ok",
                run: Box::new(|| Box::pin(async { ActionResult::success(ActionType::Click, 1) })),
            },
            AtomicStep {
                label: "fails",
                run: Box::new(|| {
                    Box::pin(async { ActionResult::failure(ActionType::Type, ReasonCode::ElementNotFound, 1, "missing") })
                }),
            },
            AtomicStep {
                label: "never runs",
                run: Box::new(|| Box::pin(async { ActionResult::success(ActionType::Hover, 1) })),
            },
        ];

        let results = execute_atomic_sequence(steps).await;
        assert_eq!(results.len(), 2);
        assert!(results[0].success);
        assert!(!results[1].success);
    }
}
