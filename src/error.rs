//! Machine-readable reason codes and the error type every public operation returns.
//!
//! Every public fallible operation in this crate returns `Result<T, CdpError>`.
//! `CdpError` always carries a [`ReasonCode`] from the closed enumeration below,
//! so callers (and the recovery manager) can classify a failure without string
//! matching.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A closed, stable enumeration of every decision this crate can report:
/// success, timeout, element/navigation/network/protocol/browser failure,
/// logic rejection, recovery action, concurrency rejection, file I/O
/// failure, or a generic system error.
///
/// Stable means exactly that: the variant names are part of the public
/// contract and are serialized verbatim as their `SCREAMING_SNAKE_CASE`
/// tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    // Success
    Success,
    ConditionMet,
    AlreadyDone,
    SkippedIdempotent,

    // Timeout
    TimeoutStep,
    TimeoutState,
    TimeoutJob,
    TimeoutNetwork,
    TimeoutRender,

    // Element
    ElementNotFound,
    ElementNotVisible,
    ElementNotClickable,
    ElementStale,
    ElementDetached,
    ElementCovered,

    // Navigation
    NavigationFailed,
    NavigationTimeout,
    RedirectLoop,
    UnexpectedPage,
    SpaNotReady,

    // Network
    NetworkError,
    NetworkTimeout,
    RequestFailed,
    ResponseError,

    // CDP / transport
    CdpDisconnected,
    CdpReconnecting,
    CdpReconnectFailed,
    CdpCommandFailed,
    CdpProtocolError,

    // Browser
    BrowserCrashed,
    BrowserHung,
    BrowserNotResponding,
    TargetClosed,
    TargetCrashed,

    // Logic
    PreconditionFailed,
    PostconditionFailed,
    GuardRejected,
    ValidationFailed,

    // Recovery
    RetryStep,
    RetryState,
    RecreateContext,
    RestartBrowser,
    RecoveryExhausted,

    // Concurrency
    QueueFull,
    Throttled,
    WorkerBusy,

    // File I/O
    UploadFailed,
    DownloadFailed,
    FileNotReady,

    // System
    SystemError,
    MemoryPressure,
    ResourceExhausted,
}

impl ReasonCode {
    /// True for the handful of codes that represent a successful or
    /// intentionally-skipped outcome rather than a failure.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(
            self,
            Self::Success | Self::ConditionMet | Self::AlreadyDone | Self::SkippedIdempotent
        )
    }

    /// Validation/logic errors are never retried, quota errors are
    /// surfaced without retry, everything else participates in some tier
    /// of recovery.
    #[must_use]
    pub fn disposition(self) -> Disposition {
        match self {
            Self::ValidationFailed | Self::GuardRejected | Self::PreconditionFailed => {
                Disposition::Logic
            }
            Self::QueueFull | Self::Throttled | Self::WorkerBusy => Disposition::Quota,
            Self::TimeoutStep
            | Self::TimeoutNetwork
            | Self::ElementNotFound
            | Self::ElementNotClickable
            | Self::ElementCovered
            | Self::NetworkError
            | Self::CdpCommandFailed => Disposition::TransientStep,
            Self::TargetCrashed
            | Self::TargetClosed
            | Self::CdpDisconnected
            | Self::ElementDetached => Disposition::Contextual,
            Self::BrowserCrashed
            | Self::BrowserHung
            | Self::BrowserNotResponding
            | Self::CdpReconnectFailed => Disposition::Catastrophic,
            _ if self.is_success() => Disposition::Success,
            _ => Disposition::Logic,
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // serde's SCREAMING_SNAKE_CASE rename gives us the exact wire form;
        // reuse it instead of maintaining a second mapping.
        let json = serde_json::to_string(self).unwrap_or_default();
        write!(f, "{}", json.trim_matches('"'))
    }
}

/// Classification of a [`ReasonCode`] used by the recovery manager to
/// decide whether, and how, to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Success,
    Logic,
    TransientStep,
    Contextual,
    Catastrophic,
    Quota,
}

/// The error type returned by every public fallible operation.
///
/// Carries the [`ReasonCode`] used for programmatic classification plus a
/// human-readable message and free-form context for traces/logs.
#[derive(Debug, thiserror::Error, Clone, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct CdpError {
    pub code: ReasonCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub context: serde_json::Map<String, serde_json::Value>,
    /// Whether the recovery manager should consider this retryable at all;
    /// distinct from `code.disposition()` because a caller can mark a
    /// specific occurrence as unrecoverable (e.g. `from_panic`).
    pub recoverable: bool,
}

impl CdpError {
    #[must_use]
    pub fn new(code: ReasonCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: serde_json::Map::new(),
            recoverable: !matches!(code.disposition(), Disposition::Logic),
        }
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn unrecoverable(mut self) -> Self {
        self.recoverable = false;
        self
    }

    /// Convenience constructor for wrapping an arbitrary lower-level error
    /// (I/O, serde, websocket) as `ReasonCode::SystemError`.
    pub fn system(message: impl Into<String>) -> Self {
        Self::new(ReasonCode::SystemError, message)
    }
}

impl From<std::io::Error> for CdpError {
    fn from(e: std::io::Error) -> Self {
        Self::system(e.to_string())
    }
}

impl From<serde_json::Error> for CdpError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ReasonCode::CdpProtocolError, e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for CdpError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::new(ReasonCode::CdpDisconnected, e.to_string())
    }
}

impl From<url::ParseError> for CdpError {
    fn from(e: url::ParseError) -> Self {
        Self::new(ReasonCode::ValidationFailed, e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CdpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_code_round_trips_through_json() {
        for code in [
            ReasonCode::Success,
            ReasonCode::ElementNotClickable,
            ReasonCode::RecoveryExhausted,
            ReasonCode::TargetCrashed,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            let back: ReasonCode = serde_json::from_str(&json).unwrap();
            assert_eq!(code, back);
        }
    }

    #[test]
    fn display_matches_wire_tag() {
        assert_eq!(ReasonCode::ElementNotFound.to_string(), "ELEMENT_NOT_FOUND");
    }

    #[test]
    fn validation_errors_are_not_recoverable_by_default() {
        let err = CdpError::new(ReasonCode::ValidationFailed, "bad selector");
        assert!(!err.recoverable);
    }

    #[test]
    fn step_level_errors_are_recoverable_by_default() {
        let err = CdpError::new(ReasonCode::CdpCommandFailed, "frame dropped");
        assert!(err.recoverable);
    }

    #[test]
    fn disposition_matches_recovery_tiers() {
        assert_eq!(ReasonCode::TimeoutStep.disposition(), Disposition::TransientStep);
        assert_eq!(ReasonCode::TargetCrashed.disposition(), Disposition::Contextual);
        assert_eq!(ReasonCode::BrowserCrashed.disposition(), Disposition::Catastrophic);
        assert_eq!(ReasonCode::QueueFull.disposition(), Disposition::Quota);
        assert_eq!(ReasonCode::ValidationFailed.disposition(), Disposition::Logic);
    }
}
