//! Idle eviction and memory accounting
//!
//! Nothing here runs on a timer. Sweeps happen when a caller asks for one,
//! or when a stats query finds estimated usage above the threshold.

use tokio::time::{Duration, Instant};
use tracing::{debug, info};

use tooldex_protocol::UsageStats;

use crate::config::SubscriptionConfig;
use crate::state::{HubState, SharedState};

pub struct MaintenanceSweeper {
    state: SharedState,
    default_max_age: Duration,
    memory_threshold: usize,
}

impl MaintenanceSweeper {
    pub fn new(state: SharedState, config: &SubscriptionConfig) -> Self {
        Self {
            state,
            default_max_age: config.idle_timeout(),
            memory_threshold: config.memory_threshold_bytes,
        }
    }

    pub fn default_max_age(&self) -> Duration {
        self.default_max_age
    }

    /// Remove subscriptions untouched for longer than `max_age`
    pub fn sweep_idle(&self, max_age: Duration) -> usize {
        let mut state = self.state.write();
        sweep_locked(&mut state, max_age)
    }

    /// Current usage without sweeping
    pub fn estimate_usage(&self) -> UsageStats {
        usage_locked(&self.state.read())
    }

    /// Usage figures, sweeping idle subscriptions first when over the threshold
    ///
    /// When a sweep happens the figures reflect the post-sweep state.
    pub fn stats(&self) -> UsageStats {
        let mut state = self.state.write();
        let usage = usage_locked(&state);
        if usage.estimated_bytes <= self.memory_threshold {
            return usage;
        }

        info!(
            estimated_bytes = usage.estimated_bytes,
            threshold = self.memory_threshold,
            "memory threshold exceeded, sweeping idle subscriptions"
        );
        let swept = sweep_locked(&mut state, self.default_max_age);
        UsageStats {
            swept,
            ..usage_locked(&state)
        }
    }
}

fn sweep_locked(state: &mut HubState, max_age: Duration) -> usize {
    let idle = state.store.idle_tokens(Instant::now(), max_age);
    let removed = idle
        .iter()
        .filter(|token| state.remove_subscription(token))
        .count();

    if removed > 0 {
        info!(removed, max_age_secs = max_age.as_secs(), "swept idle subscriptions");
    } else {
        debug!(max_age_secs = max_age.as_secs(), "idle sweep found nothing");
    }
    removed
}

fn usage_locked(state: &HubState) -> UsageStats {
    UsageStats {
        pane_count: state.registry.len(),
        subscription_count: state.store.len(),
        total_buffered_lines: state.store.total_buffered_lines(),
        estimated_bytes: state.store.estimated_bytes(),
        swept: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::PaneTarget;
    use crate::subscription::Subscription;
    use tooldex_protocol::CaptureMode;

    fn shared_state() -> SharedState {
        let mut state = HubState::new(4);
        state
            .registry
            .attach("build", PaneTarget::bare("%1"), false)
            .unwrap();
        state.into_shared()
    }

    fn subscribe(state: &SharedState, token: &str, seed: &[&str]) {
        let mut sub = Subscription::new(token, "build", CaptureMode::Plain, 0, 100, 10);
        let lines: Vec<String> = seed.iter().map(|s| s.to_string()).collect();
        sub.seed(&lines);
        state.write().bind_subscription(sub).unwrap();
    }

    fn sweeper(state: &SharedState, threshold: usize) -> MaintenanceSweeper {
        let config = SubscriptionConfig {
            idle_timeout_secs: 60,
            memory_threshold_bytes: threshold,
            ..SubscriptionConfig::default()
        };
        MaintenanceSweeper::new(state.clone(), &config)
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_idle_keeps_recent() {
        let state = shared_state();
        subscribe(&state, "stale", &[]);
        tokio::time::advance(Duration::from_secs(120)).await;
        subscribe(&state, "fresh", &[]);

        let sweeper = sweeper(&state, usize::MAX);
        assert_eq!(sweeper.sweep_idle(Duration::from_secs(60)), 1);

        let state = state.read();
        assert!(!state.store.contains("stale"));
        assert!(state.store.contains("fresh"));
        let pane = state.registry.get("build").unwrap();
        assert!(pane.subscriptions().contains("fresh"));
        assert!(!pane.subscriptions().contains("stale"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_defers_eviction() {
        let state = shared_state();
        subscribe(&state, "tok", &[]);
        tokio::time::advance(Duration::from_secs(90)).await;
        state.read().store.get("tok").unwrap().lock().touch();

        assert_eq!(sweeper(&state, usize::MAX).sweep_idle(Duration::from_secs(60)), 0);
    }

    #[tokio::test]
    async fn test_estimate_usage() {
        let state = shared_state();
        subscribe(&state, "a", &["one", "two"]);
        subscribe(&state, "b", &["three"]);

        let usage = sweeper(&state, usize::MAX).estimate_usage();
        assert_eq!(usage.pane_count, 1);
        assert_eq!(usage.subscription_count, 2);
        assert_eq!(usage.total_buffered_lines, 3);
        assert!(usage.estimated_bytes > 0);
        assert_eq!(usage.swept, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_below_threshold_does_not_sweep() {
        let state = shared_state();
        subscribe(&state, "stale", &["x"]);
        tokio::time::advance(Duration::from_secs(600)).await;

        let stats = sweeper(&state, usize::MAX).stats();
        assert_eq!(stats.swept, 0);
        assert_eq!(stats.subscription_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_over_threshold_reports_post_sweep() {
        let state = shared_state();
        subscribe(&state, "stale", &["lots", "of", "output"]);
        tokio::time::advance(Duration::from_secs(600)).await;
        subscribe(&state, "fresh", &["kept"]);

        let stats = sweeper(&state, 1).stats();
        assert_eq!(stats.swept, 1);
        assert_eq!(stats.subscription_count, 1);
        assert_eq!(stats.total_buffered_lines, 1);
    }
}
