//! Per-subsystem configuration types aggregated into [`ClientConfig`].

use serde::{Deserialize, Serialize};

/// Connection, heartbeat and reconnect policy for the [`crate::session::Session`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Chrome `--remote-debugging-port`. Used for `GET /json` discovery when
    /// `ws_url` is not set directly.
    pub remote_port: u16,
    /// Direct DevTools WebSocket URL. Preferred over `remote_port` when set.
    pub ws_url: Option<String>,
    pub connect_timeout_ms: u64,
    pub max_connect_retries: u32,
    pub connect_retry_delay_ms: u64,
    pub auto_reconnect: bool,
    pub max_reconnect_attempts: u32,
    pub reconnect_delay_ms: u64,
    pub reconnect_backoff_multiplier: f64,
    pub max_reconnect_delay_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub heartbeat_timeout_ms: u64,
    pub max_heartbeat_failures: u32,
    pub max_in_flight_commands: usize,
    pub command_timeout_ms: u64,
    pub command_queue_size: usize,
    pub subscribed_domains: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            remote_port: 9222,
            ws_url: None,
            connect_timeout_ms: 30_000,
            max_connect_retries: 3,
            connect_retry_delay_ms: 500,
            auto_reconnect: true,
            max_reconnect_attempts: 5,
            reconnect_delay_ms: 500,
            reconnect_backoff_multiplier: 2.0,
            max_reconnect_delay_ms: 10_000,
            heartbeat_interval_ms: 5_000,
            heartbeat_timeout_ms: 3_000,
            max_heartbeat_failures: 3,
            max_in_flight_commands: 32,
            command_timeout_ms: 10_000,
            command_queue_size: 256,
            subscribed_domains: vec![
                "Page".into(),
                "Runtime".into(),
                "Network".into(),
                "DOM".into(),
                "Target".into(),
            ],
        }
    }
}

/// Step/state/job timeout ladder and stability-window polling knobs for the
/// [`crate::waits::WaitEngine`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WaitConfig {
    pub step_timeout_ms: u64,
    pub state_timeout_ms: u64,
    pub job_timeout_ms: u64,
    pub stability_window_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            step_timeout_ms: 10_000,
            state_timeout_ms: 30_000,
            job_timeout_ms: 300_000,
            stability_window_ms: 500,
            poll_interval_ms: 100,
        }
    }
}

/// Per-tier retry budgets for the [`crate::recovery::RecoveryManager`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RecoveryConfig {
    pub max_step_retries: u32,
    pub step_retry_delay_ms: u64,
    pub step_retry_backoff: f64,
    pub max_state_retries: u32,
    pub state_retry_delay_ms: u64,
    pub max_recreate_attempts: u32,
    pub recreate_delay_ms: u64,
    pub max_restart_attempts: u32,
    pub restart_delay_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_step_retries: 3,
            step_retry_delay_ms: 200,
            step_retry_backoff: 2.0,
            max_state_retries: 2,
            state_retry_delay_ms: 1_000,
            max_recreate_attempts: 2,
            recreate_delay_ms: 1_000,
            max_restart_attempts: 1,
            restart_delay_ms: 2_000,
        }
    }
}

/// Health-check and hard-timeout policy for the [`crate::watchdog::Watchdog`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WatchdogConfig {
    pub heartbeat_interval_ms: u64,
    pub heartbeat_timeout_ms: u64,
    pub progress_timeout_ms: u64,
    pub event_timeout_ms: u64,
    pub job_hard_timeout_ms: u64,
    pub max_failures_before_poison: u32,
    pub poison_cooldown_ms: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 5_000,
            heartbeat_timeout_ms: 10_000,
            progress_timeout_ms: 60_000,
            event_timeout_ms: 30_000,
            job_hard_timeout_ms: 600_000,
            max_failures_before_poison: 5,
            poison_cooldown_ms: 30_000,
        }
    }
}

/// Screenshot budget policy, part of [`PerformanceConfig`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScreenshotPolicy {
    pub enabled: bool,
    pub on_error: bool,
    pub on_state_change: bool,
    pub max_per_job: u32,
    pub quality: u8,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for ScreenshotPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            on_error: true,
            on_state_change: false,
            max_per_job: 10,
            quality: 80,
            max_width: 1920,
            max_height: 1080,
        }
    }
}

/// Locator cache and command batching knobs for the
/// [`crate::performance::PerformanceOptimizer`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PerformanceConfig {
    pub locator_cache_ttl_ms: u64,
    pub locator_cache_max_size: usize,
    pub batch_max_size: usize,
    pub batch_delay_ms: u64,
    pub screenshot_policy: ScreenshotPolicy,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            locator_cache_ttl_ms: 5_000,
            locator_cache_max_size: 100,
            batch_max_size: 10,
            batch_delay_ms: 50,
            screenshot_policy: ScreenshotPolicy::default(),
        }
    }
}

/// Worker pool sizing and command throttling for the
/// [`crate::concurrency::ConcurrencyManager`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    pub worker_pool_size: usize,
    pub throttle_rate_per_sec: f64,
    pub max_concurrent_commands: usize,
    pub job_queue_size: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: num_cpus::get().max(2),
            throttle_rate_per_sec: 20.0,
            max_concurrent_commands: 16,
            job_queue_size: 1_000,
        }
    }
}

/// Top-level configuration for a [`crate::client::Client`], aggregating
/// every per-subsystem config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub session: SessionConfig,
    pub waits: WaitConfig,
    pub recovery: RecoveryConfig,
    pub watchdog: WatchdogConfig,
    pub performance: PerformanceConfig,
    pub concurrency: ConcurrencyConfig,
    pub enable_recovery: bool,
    pub enable_watchdog: bool,
    pub enable_caching: bool,
    pub enable_batching: bool,
}

impl Default for ClientConfig {
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
        }
    }
}
