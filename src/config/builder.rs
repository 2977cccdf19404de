//! Type-safe builder for [`ClientConfig`] using the typestate pattern.
//!
//! The builder only exposes `.build()` once an endpoint (`remote_port`
//! or `ws_url`) has been supplied, so a caller cannot construct a client
//! with nowhere to connect.

use std::marker::PhantomData;

use super::types::{
    ClientConfig, ConcurrencyConfig, PerformanceConfig, RecoveryConfig, ScreenshotPolicy,
    SessionConfig, WaitConfig, WatchdogConfig,
};

/// Typestate marker: no endpoint configured yet.
pub struct Unset;
/// Typestate marker: `remote_port` or `ws_url` has been set.
pub struct Ready;

pub struct ClientConfigBuilder<State = Unset> {
    session: SessionConfig,
    waits: WaitConfig,
    recovery: RecoveryConfig,
    watchdog: WatchdogConfig,
    performance: PerformanceConfig,
    concurrency: ConcurrencyConfig,
    enable_recovery: bool,
    enable_watchdog: bool,
    enable_caching: bool,
    enable_batching: bool,
    _phantom: PhantomData<State>,
}

impl Default for ClientConfigBuilder<Unset> {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            waits: WaitConfig::default(),
            recovery: RecoveryConfig::default(),
            watchdog: WatchdogConfig::default(),
            performance: PerformanceConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            enable_recovery: true,
            enable_watchdog: true,
            enable_caching: true,
            enable_batching: true,
            _phantom: PhantomData,
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn builder() -> ClientConfigBuilder<Unset> {
        ClientConfigBuilder::default()
    }
}

impl ClientConfigBuilder<Unset> {
    fn into_ready(self) -> ClientConfigBuilder<Ready> {
        ClientConfigBuilder {
            session: self.session,
            waits: self.waits,
            recovery: self.recovery,
            watchdog: self.watchdog,
            performance: self.performance,
            concurrency: self.concurrency,
            enable_recovery: self.enable_recovery,
            enable_watchdog: self.enable_watchdog,
            enable_caching: self.enable_caching,
            enable_batching: self.enable_batching,
            _phantom: PhantomData,
        }
    }

    #[must_use]
    pub fn remote_port(mut self, port: u16) -> ClientConfigBuilder<Ready> {
        self.session.remote_port = port;
        self.into_ready()
    }

    #[must_use]
    pub fn ws_url(mut self, url: impl Into<String>) -> ClientConfigBuilder<Ready> {
        self.session.ws_url = Some(url.into());
        self.into_ready()
    }
}

// Options settable at any state, before or after the endpoint is chosen.
impl<State> ClientConfigBuilder<State> {
    #[must_use]
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.session.connect_timeout_ms = ms;
        self
    }

    #[must_use]
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.session.auto_reconnect = enabled;
        self
    }

    #[must_use]
    pub fn max_in_flight_commands(mut self, n: usize) -> Self {
        self.session.max_in_flight_commands = n;
        self
    }

    #[must_use]
    pub fn subscribed_domains(mut self, domains: Vec<String>) -> Self {
        self.session.subscribed_domains = domains;
        self
    }

    #[must_use]
    pub fn step_timeout_ms(mut self, ms: u64) -> Self {
        self.waits.step_timeout_ms = ms;
        self
    }

    #[must_use]
    pub fn state_timeout_ms(mut self, ms: u64) -> Self {
        self.waits.state_timeout_ms = ms;
        self
    }

    #[must_use]
    pub fn job_timeout_ms(mut self, ms: u64) -> Self {
        self.waits.job_timeout_ms = ms;
        self
    }

    #[must_use]
    pub fn stability_window_ms(mut self, ms: u64) -> Self {
        self.waits.stability_window_ms = ms;
        self
    }

    #[must_use]
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.waits.poll_interval_ms = ms;
        self
    }

    #[must_use]
    pub fn enable_recovery(mut self, enabled: bool) -> Self {
        self.enable_recovery = enabled;
        self
    }

    #[must_use]
    pub fn max_step_retries(mut self, n: u32) -> Self {
        self.recovery.max_step_retries = n;
        self
    }

    #[must_use]
    pub fn max_state_retries(mut self, n: u32) -> Self {
        self.recovery.max_state_retries = n;
        self
    }

    #[must_use]
    pub fn enable_watchdog(mut self, enabled: bool) -> Self {
        self.enable_watchdog = enabled;
        self
    }

    #[must_use]
    pub fn heartbeat_interval_ms(mut self, ms: u64) -> Self {
        self.session.heartbeat_interval_ms = ms;
        self.watchdog.heartbeat_interval_ms = ms;
        self
    }

    #[must_use]
    pub fn enable_caching(mut self, enabled: bool) -> Self {
        self.enable_caching = enabled;
        self
    }

    #[must_use]
    pub fn enable_batching(mut self, enabled: bool) -> Self {
        self.enable_batching = enabled;
        self
    }

    #[must_use]
    pub fn max_screenshots_per_job(mut self, n: u32) -> Self {
        self.performance.screenshot_policy.max_per_job = n;
        self
    }

    #[must_use]
    pub fn screenshot_policy(mut self, policy: ScreenshotPolicy) -> Self {
        self.performance.screenshot_policy = policy;
        self
    }

    #[must_use]
    pub fn worker_pool_size(mut self, n: usize) -> Self {
        self.concurrency.worker_pool_size = n;
        self
    }

    #[must_use]
    pub fn throttle_rate_per_sec(mut self, rate: f64) -> Self {
        self.concurrency.throttle_rate_per_sec = rate;
        self
    }
}

impl ClientConfigBuilder<Ready> {
    #[must_use]
    pub fn build(self) -> ClientConfig {
        ClientConfig {
            session: self.session,
            waits: self.waits,
            recovery: self.recovery,
            watchdog: self.watchdog,
            performance: self.performance,
            concurrency: self.concurrency,
            enable_recovery: self.enable_recovery,
            enable_watchdog: self.enable_watchdog,
            enable_caching: self.enable_caching,
            enable_batching: self.enable_batching,
        }
    }
}
