//! Performance: locator cache, command batcher, screenshot budget.

mod core;
mod types;

pub use core::{CommandBatcher, JsEvaluator, LocatorCache, PerformanceOptimizer, ScreenshotBudget};
pub use types::{CachedLocator, PendingEval, ScreenshotBudgetSnapshot, ScreenshotTrigger};

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::{PerformanceConfig, ScreenshotPolicy};

    #[test]
    fn locator_cache_expires_after_ttl() {
        let cache = LocatorCache::new(&PerformanceConfig { locator_cache_ttl_ms: 10, ..PerformanceConfig::default() });
        cache.put("#submit", 7, None);
        assert!(cache.get("#submit").is_some());
        std::thread::sleep(Duration::from_millis(25));
        assert!(cache.get("#submit").is_none());
    }

    #[test]
    fn invalidate_all_drops_every_entry() {
        let cache = LocatorCache::new(&PerformanceConfig::default());
        cache.put("a", 1, None);
        cache.put("b", 2, None);
        assert_eq!(cache.len(), 2);
        cache.invalidate_all();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn batcher_fuses_evaluations_and_unpacks_results() {
        let config = PerformanceConfig { batch_max_size: 2, batch_delay_ms: 1_000, ..PerformanceConfig::default() };
        let batcher = CommandBatcher::new(&config, |_fused: String| async move {
            Ok(serde_json::json!([1, 2]))
        });

        let (a, b) = tokio::join!(batcher.evaluate("1+0"), batcher.evaluate("1+1"));
        assert_eq!(a.unwrap(), serde_json::json!(1));
        assert_eq!(b.unwrap(), serde_json::json!(2));
    }

    #[test]
    fn screenshot_budget_denies_disabled_trigger() {
        let policy = ScreenshotPolicy { on_error: false, ..ScreenshotPolicy::default() };
        let budget = ScreenshotBudget::new(policy);
        assert!(budget.try_take(ScreenshotTrigger::Error).is_err());
        assert_eq!(budget.snapshot().skipped, 1);
    }

    #[test]
    fn screenshot_budget_denies_past_ceiling() {
        let policy = ScreenshotPolicy { max_per_job: 1, ..ScreenshotPolicy::default() };
        let budget = ScreenshotBudget::new(policy);
        assert!(budget.try_take(ScreenshotTrigger::Manual).is_ok());
        assert!(budget.try_take(ScreenshotTrigger::Manual).is_err());
        assert_eq!(budget.snapshot().taken, 1);
        assert_eq!(budget.snapshot().skipped, 1);
    }
}
