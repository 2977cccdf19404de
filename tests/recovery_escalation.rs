//! The Recovery Manager must walk step retry, then state retry, then
//! context recreation in order, stopping at the first tier that
//! succeeds, and must give up once every tier it's allowed to reach is
//! exhausted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use cdp_remote::config::RecoveryConfig;
use cdp_remote::error::ReasonCode;
use cdp_remote::recovery::{RecoveryLevel, RecoveryManager, SafeResetPoint};

fn fast_config() -> RecoveryConfig {
    RecoveryConfig {
        max_step_retries: 3,
        step_retry_delay_ms: 5,
        step_retry_backoff: 1.0,
        max_state_retries: 2,
        state_retry_delay_ms: 5,
        max_recreate_attempts: 2,
        recreate_delay_ms: 5,
        max_restart_attempts: 1,
        restart_delay_ms: 5,
    }
}

#[tokio::test]
async fn step_retry_succeeds_before_escalating_further() {
    let manager = RecoveryManager::new(fast_config());
    let attempts = Arc::new(AtomicU32::new(0));
    let counted = Arc::clone(&attempts);

    let step_fn = move || {
        let counted = Arc::clone(&counted);
        async move { counted.fetch_add(1, Ordering::SeqCst) >= 2 }
    };

    let result = manager.attempt_recovery(ReasonCode::ElementNotFound, "idle", Some(step_fn)).await;

    assert!(result.success);
    assert_eq!(result.level, RecoveryLevel::StepRetry);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn state_retry_recovers_via_a_registered_reset_point_once_step_retry_is_exhausted() {
    let manager = RecoveryManager::new(fast_config());
    let verify_calls = Arc::new(AtomicU32::new(0));
    let counted = Arc::clone(&verify_calls);

    manager.register_reset_point(SafeResetPoint::new("dashboard", move || {
        let counted = Arc::clone(&counted);
        Box::pin(async move { counted.fetch_add(1, Ordering::SeqCst) >= 1 })
    }));

    let no_step_retry: Option<fn() -> std::future::Ready<bool>> = None;
    let result = manager.attempt_recovery(ReasonCode::ElementNotFound, "idle", no_step_retry).await;

    assert!(result.success);
    assert_eq!(result.level, RecoveryLevel::StateRetry);
    assert_eq!(result.recovered_to.as_deref(), Some("dashboard"));
}

#[tokio::test]
async fn context_errors_skip_straight_to_recreate_context() {
    let manager = RecoveryManager::new(fast_config());
    manager.set_recreate_context_callback(|| Box::pin(async { true }));

    let no_step_retry: Option<fn() -> std::future::Ready<bool>> = None;
    let result = manager.attempt_recovery(ReasonCode::TargetCrashed, "idle", no_step_retry).await;

    assert!(result.success);
    assert_eq!(result.level, RecoveryLevel::RecreateContext);
}

#[tokio::test]
async fn exhausting_every_reachable_tier_reports_failure() {
    let manager = RecoveryManager::new(fast_config());
    // No reset points, no recreate/restart callbacks registered: every
    // tier up to RecreateContext is reachable for a context error but
    // none of them can succeed.
    let no_step_retry: Option<fn() -> std::future::Ready<bool>> = None;
    let result = manager.attempt_recovery(ReasonCode::TargetCrashed, "idle", no_step_retry).await;

    assert!(!result.success);
    assert_eq!(result.level, RecoveryLevel::RecreateContext);
}

#[tokio::test]
async fn validation_failures_are_classified_non_recoverable_and_never_retried() {
    let manager = RecoveryManager::new(fast_config());
    let no_step_retry: Option<fn() -> std::future::Ready<bool>> = None;
    let result = manager.attempt_recovery(ReasonCode::ValidationFailed, "idle", no_step_retry).await;

    assert!(!result.success);
    assert_eq!(result.level, RecoveryLevel::None);
    assert_eq!(result.attempts, 0);
}
