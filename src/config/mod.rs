//! Configuration for a [`crate::client::Client`].
//!
//! One [`ClientConfig`] aggregates the per-component configs, built
//! through a typestate builder that requires an endpoint (`remote_port`
//! or `ws_url`) before `.build()` becomes available.

pub mod builder;
pub mod types;

pub use builder::{ClientConfigBuilder, Ready, Unset};
pub use types::{
    ClientConfig, ConcurrencyConfig, PerformanceConfig, RecoveryConfig, ScreenshotPolicy,
    SessionConfig, WaitConfig, WatchdogConfig,
};
