//! `Client::run_recoverable` must actually retry the failing step through
//! the recovery manager's step-retry tier, not just consult it for a
//! yes/no and give up — a step that fails three times with a retriable
//! reason code and then succeeds must still return that success.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use cdp_remote::config::{ClientConfig, RecoveryConfig};
use cdp_remote::error::{CdpError, ReasonCode};
use cdp_remote::Client;

fn fast_recovery_config() -> RecoveryConfig {
    RecoveryConfig {
        max_step_retries: 5,
        step_retry_delay_ms: 5,
        step_retry_backoff: 1.0,
        max_state_retries: 1,
        state_retry_delay_ms: 5,
        max_recreate_attempts: 1,
        recreate_delay_ms: 5,
        max_restart_attempts: 1,
        restart_delay_ms: 5,
    }
}

#[tokio::test]
async fn run_recoverable_retries_a_failing_step_and_returns_its_eventual_success() {
    let mut config = ClientConfig::default();
    config.recovery = fast_recovery_config();
    let client = Client::new(config);

    let attempts = Arc::new(AtomicU32::new(0));
    let counted = Arc::clone(&attempts);

    let result: Result<&'static str, CdpError> = client
        .run_recoverable("job-1", "flaky-step", || {
            let counted = Arc::clone(&counted);
            async move {
                if counted.fetch_add(1, Ordering::SeqCst) < 3 {
                    Err(CdpError::new(ReasonCode::CdpCommandFailed, "transient failure"))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), "done");
    assert_eq!(attempts.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn run_recoverable_gives_up_once_step_retry_is_exhausted() {
    let mut config = ClientConfig::default();
    config.recovery = RecoveryConfig {
        max_step_retries: 2,
        ..fast_recovery_config()
    };
    // Escalation past step-retry reaches state-retry and recreate-context,
    // both of which end up driving a real session reconnect attempt; keep
    // connect/reconnect bounded so a failing step doesn't also pay for a
    // real (and here, doomed) network handshake.
    config.session.connect_timeout_ms = 50;
    config.session.max_connect_retries = 0;
    config.session.connect_retry_delay_ms = 0;
    config.session.max_reconnect_attempts = 1;
    config.session.reconnect_delay_ms = 0;
    config.session.max_reconnect_delay_ms = 0;
    let client = Client::new(config);

    let attempts = Arc::new(AtomicU32::new(0));
    let counted = Arc::clone(&attempts);

    let result: Result<(), CdpError> = client
        .run_recoverable("job-2", "always-fails", || {
            let counted = Arc::clone(&counted);
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Err(CdpError::new(ReasonCode::CdpCommandFailed, "permanent failure"))
            }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(result.unwrap_err().code, ReasonCode::CdpCommandFailed);
}
