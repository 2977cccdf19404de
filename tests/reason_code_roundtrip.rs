//! Every `ReasonCode` variant is a wire-stable tag: serializing then
//! deserializing must always hand back the same variant, and the
//! `Display` impl must always agree with the serialized tag.

use cdp_remote::error::ReasonCode;
use proptest::prelude::*;

const ALL_CODES: &[ReasonCode] = &[
    ReasonCode::Success,
    ReasonCode::ConditionMet,
    ReasonCode::AlreadyDone,
    ReasonCode::SkippedIdempotent,
    ReasonCode::TimeoutStep,
    ReasonCode::TimeoutState,
    ReasonCode::TimeoutJob,
    ReasonCode::TimeoutNetwork,
    ReasonCode::TimeoutRender,
    ReasonCode::ElementNotFound,
    ReasonCode::ElementNotVisible,
    ReasonCode::ElementNotClickable,
    ReasonCode::ElementStale,
    ReasonCode::ElementDetached,
    ReasonCode::ElementCovered,
    ReasonCode::NavigationFailed,
    ReasonCode::NavigationTimeout,
    ReasonCode::RedirectLoop,
    ReasonCode::UnexpectedPage,
    ReasonCode::SpaNotReady,
    ReasonCode::NetworkError,
    ReasonCode::NetworkTimeout,
    ReasonCode::RequestFailed,
    ReasonCode::ResponseError,
    ReasonCode::CdpDisconnected,
    ReasonCode::CdpReconnecting,
    ReasonCode::CdpReconnectFailed,
    ReasonCode::CdpCommandFailed,
    ReasonCode::CdpProtocolError,
    ReasonCode::BrowserCrashed,
    ReasonCode::BrowserHung,
    ReasonCode::BrowserNotResponding,
    ReasonCode::TargetClosed,
    ReasonCode::TargetCrashed,
    ReasonCode::PreconditionFailed,
    ReasonCode::PostconditionFailed,
    ReasonCode::GuardRejected,
    ReasonCode::ValidationFailed,
    ReasonCode::RetryStep,
    ReasonCode::RetryState,
    ReasonCode::RecreateContext,
    ReasonCode::RestartBrowser,
    ReasonCode::RecoveryExhausted,
    ReasonCode::QueueFull,
    ReasonCode::Throttled,
    ReasonCode::WorkerBusy,
    ReasonCode::UploadFailed,
    ReasonCode::DownloadFailed,
    ReasonCode::FileNotReady,
    ReasonCode::SystemError,
    ReasonCode::MemoryPressure,
    ReasonCode::ResourceExhausted,
];

fn any_reason_code() -> impl Strategy<Value = ReasonCode> {
    (0..ALL_CODES.len()).prop_map(|i| ALL_CODES[i])
}

proptest! {
    #[test]
    fn round_trips_through_json(code in any_reason_code()) {
        let json = serde_json::to_string(&code).unwrap();
        let back: ReasonCode = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(code, back);
    }

    #[test]
    fn display_agrees_with_the_serialized_tag(code in any_reason_code()) {
        let json = serde_json::to_string(&code).unwrap();
        let tag = json.trim_matches('"').to_string();
        prop_assert_eq!(code.to_string(), tag);
    }

    #[test]
    fn unknown_tags_never_deserialize(code in any_reason_code()) {
        let json = serde_json::to_string(&code).unwrap();
        let mangled = format!("{}_NOT_A_REAL_CODE", json.trim_matches('"'));
        let result: Result<ReasonCode, _> = serde_json::from_str(&format!("{mangled:?}"));
        prop_assert!(result.is_err());
    }
}

#[test]
fn every_known_variant_is_covered_by_the_exhaustive_list() {
    // A compile-time guard against a new variant being added to the enum
    // without adding it here: match on every case with no wildcard arm so
    // the build breaks the day that drifts.
    fn assert_exhaustive(code: ReasonCode) {
        match code {
            ReasonCode::Success
            | ReasonCode::ConditionMet
            | ReasonCode::AlreadyDone
            | ReasonCode::SkippedIdempotent
            | ReasonCode::TimeoutStep
            | ReasonCode::TimeoutState
            | ReasonCode::TimeoutJob
            | ReasonCode::TimeoutNetwork
            | ReasonCode::TimeoutRender
            | ReasonCode::ElementNotFound
            | ReasonCode::ElementNotVisible
            | ReasonCode::ElementNotClickable
            | ReasonCode::ElementStale
            | ReasonCode::ElementDetached
            | ReasonCode::ElementCovered
            | ReasonCode::NavigationFailed
            | ReasonCode::NavigationTimeout
            | ReasonCode::RedirectLoop
            | ReasonCode::UnexpectedPage
            | ReasonCode::SpaNotReady
            | ReasonCode::NetworkError
            | ReasonCode::NetworkTimeout
            | ReasonCode::RequestFailed
            | ReasonCode::ResponseError
            | ReasonCode::CdpDisconnected
            | ReasonCode::CdpReconnecting
            | ReasonCode::CdpReconnectFailed
            | ReasonCode::CdpCommandFailed
            | ReasonCode::CdpProtocolError
            | ReasonCode::BrowserCrashed
            | ReasonCode::BrowserHung
            | ReasonCode::BrowserNotResponding
            | ReasonCode::TargetClosed
            | ReasonCode::TargetCrashed
            | ReasonCode::PreconditionFailed
            | ReasonCode::PostconditionFailed
            | ReasonCode::GuardRejected
            | ReasonCode::ValidationFailed
            | ReasonCode::RetryStep
            | ReasonCode::RetryState
            | ReasonCode::RecreateContext
            | ReasonCode::RestartBrowser
            | ReasonCode::RecoveryExhausted
            | ReasonCode::QueueFull
            | ReasonCode::Throttled
            | ReasonCode::WorkerBusy
            | ReasonCode::UploadFailed
            | ReasonCode::DownloadFailed
            | ReasonCode::FileNotReady
            | ReasonCode::SystemError
            | ReasonCode::MemoryPressure
            | ReasonCode::ResourceExhausted => {}
        }
    }
    for code in ALL_CODES {
        assert_exhaustive(*code);
    }
}
