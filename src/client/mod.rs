//! Client Facade: the public surface consumers use, binding every
//! subsystem together.

mod core;

pub use core::Client;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    #[tokio::test]
    async fn client_builds_every_subsystem_from_one_config() {
        let config = ClientConfig::builder().remote_port(9222).build();
        let client = Client::new(config);
        assert!(client.list_targets().is_empty());
        assert_eq!(client.performance.screenshot_budget.snapshot().taken, 0);
    }

    #[tokio::test]
    async fn watchdog_is_absent_when_disabled_in_config() {
        let config = ClientConfig::builder().remote_port(9222).enable_watchdog(false).build();
        let client = Client::new(config);
        assert!(client.watchdog.is_none());
    }
}
