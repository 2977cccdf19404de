//! Recovery Manager: tiered self-recovery escalation.

mod core;
mod types;

pub use core::RecoveryManager;
pub use types::{RecoveryLevel, RecoveryResult, SafeResetPoint};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecoveryConfig;
    use crate::error::ReasonCode;

    #[test]
    fn browser_errors_classify_as_restart() {
        let manager = RecoveryManager::new(RecoveryConfig::default());
        assert_eq!(manager.classify_error(ReasonCode::BrowserCrashed), RecoveryLevel::RestartBrowser);
    }

    #[test]
    fn context_errors_classify_as_recreate() {
        let manager = RecoveryManager::new(RecoveryConfig::default());
        assert_eq!(manager.classify_error(ReasonCode::TargetCrashed), RecoveryLevel::RecreateContext);
    }

    #[test]
    fn logic_errors_are_non_recoverable() {
        let manager = RecoveryManager::new(RecoveryConfig::default());
        assert_eq!(manager.classify_error(ReasonCode::ValidationFailed), RecoveryLevel::None);
        assert_eq!(manager.classify_error(ReasonCode::GuardRejected), RecoveryLevel::None);
    }

    #[tokio::test]
    async fn recovery_without_callbacks_fails_gracefully() {
        let manager = RecoveryManager::new(RecoveryConfig::default());
        let step_fn: Option<fn() -> std::future::Ready<bool>> = None;
        let result = manager.attempt_recovery(ReasonCode::TargetCrashed, "idle", step_fn).await;
        assert!(!result.success);
    }
}
