use serde::{Deserialize, Serialize};

use super::pane::CaptureMode;

/// Returned when a subscription is created
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionOpened {
    /// Opaque token identifying the subscription
    pub token: String,
    /// Name of the pane the subscription is bound to (never the alias)
    pub pane: String,
    pub mode: CaptureMode,
    /// Total line count at subscribe time; the diff baseline
    pub lines_recorded: u64,
    /// Backfill content, oldest first
    pub initial_lines: Vec<String>,
    pub initial_truncated: bool,
}

/// Incremental batch returned by a fetch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaneUpdate {
    pub token: String,
    pub pane: String,
    /// New lines, oldest first (empty on timeout)
    pub new_lines: Vec<String>,
    /// Baseline after this fetch
    pub lines_recorded: u64,
    /// Ring buffer occupancy of the subscription, 0.0..=100.0
    pub usage_percent: f64,
    /// Growth outpaced the batch ceiling or the capture was clipped
    pub truncated: bool,
    /// Nothing changed before the timeout budget ran out
    pub timed_out: bool,
}

impl PaneUpdate {
    /// Whether the batch carries no lines
    pub fn is_empty(&self) -> bool {
        self.new_lines.is_empty()
    }
}

/// Memory usage estimate across the registry and subscription store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct UsageStats {
    pub pane_count: usize,
    pub subscription_count: usize,
    pub total_buffered_lines: usize,
    pub estimated_bytes: usize,
    /// Subscriptions evicted by an opportunistic sweep during this query
    #[serde(default)]
    pub swept: usize,
}

/// Result of an idle sweep
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    pub max_age_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pane_update_is_empty() {
        let update = PaneUpdate {
            token: "t".into(),
            pane: "build".into(),
            new_lines: vec![],
            lines_recorded: 10,
            usage_percent: 0.0,
            truncated: false,
            timed_out: true,
        };
        assert!(update.is_empty());
    }

    #[test]
    fn test_usage_stats_swept_defaults_to_zero() {
        let json = serde_json::json!({
            "pane_count": 1,
            "subscription_count": 2,
            "total_buffered_lines": 30,
            "estimated_bytes": 4096
        });
        let stats: UsageStats = serde_json::from_value(json).unwrap();
        assert_eq!(stats.swept, 0);
        assert_eq!(stats.subscription_count, 2);
    }

    #[test]
    fn test_subscription_opened_serde() {
        let opened = SubscriptionOpened {
            token: "abc".into(),
            pane: "origin".into(),
            mode: CaptureMode::Markup,
            lines_recorded: 42,
            initial_lines: vec!["$ ls".into()],
            initial_truncated: false,
        };
        let json = serde_json::to_value(&opened).unwrap();
        assert_eq!(json["mode"], "markup");
        assert_eq!(json["lines_recorded"], 42);
    }
}
