//! Configuration schema structs

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tmux: TmuxConfig,
    pub registry: RegistryConfig,
    pub subscriptions: SubscriptionConfig,
}

/// How to reach the tmux server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TmuxConfig {
    /// tmux binary name or path
    pub binary: String,
    /// Named server socket (`tmux -L`)
    pub socket_name: Option<String>,
    /// Explicit socket path (`tmux -S`), wins over `socket_name`
    pub socket_path: Option<String>,
    /// Upper bound on any single tmux invocation
    pub command_timeout_ms: u64,
}

impl Default for TmuxConfig {
    fn default() -> Self {
        Self {
            binary: "tmux".to_string(),
            socket_name: None,
            socket_path: None,
            command_timeout_ms: 5000,
        }
    }
}

/// Pane registry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Maximum number of attached panes
    pub max_panes: usize,
    /// Locator of the pane tooldex was launched from; auto-attached as primary
    pub origin_pane: Option<String>,
    /// Name the origin pane is registered under when auto-attached
    pub origin_name: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_panes: 16,
            origin_pane: None,
            origin_name: "origin".to_string(),
        }
    }
}

impl RegistryConfig {
    /// Origin pane locator: config first, then `TOOLDEX_PRIMARY_PANE`, then `TMUX_PANE`
    pub fn origin_locator(&self) -> Option<String> {
        self.origin_pane
            .clone()
            .or_else(|| std::env::var("TOOLDEX_PRIMARY_PANE").ok())
            .or_else(|| std::env::var("TMUX_PANE").ok())
            .filter(|locator| !locator.trim().is_empty())
    }
}

/// Subscription and polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Ring buffer capacity per subscription (lines)
    pub buffer_lines: usize,
    /// Trailing window captured for redraw detection (lines)
    pub snapshot_lines: usize,
    /// Ceiling on backfill and one-shot reads (lines)
    pub max_backfill_lines: usize,
    /// Sleep between polling attempts inside a fetch
    pub poll_interval_ms: u64,
    /// Fetch timeout budget when the caller gives none
    pub default_timeout_ms: u64,
    /// Batch ceiling when the caller gives none
    pub default_max_lines: usize,
    /// Subscriptions untouched this long are swept
    pub idle_timeout_secs: u64,
    /// Estimated usage above which a stats query sweeps idle subscriptions
    pub memory_threshold_bytes: usize,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_lines: 2000,
            snapshot_lines: 100,
            max_backfill_lines: 5000,
            poll_interval_ms: 200,
            default_timeout_ms: 1000,
            default_max_lines: 200,
            idle_timeout_secs: 30 * 60,
            memory_threshold_bytes: 64 * 1024 * 1024,
        }
    }
}

impl SubscriptionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.tmux.binary, "tmux");
        assert_eq!(config.registry.max_panes, 16);
        assert_eq!(config.subscriptions.snapshot_lines, 100);
        assert_eq!(config.subscriptions.max_backfill_lines, 5000);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
            [subscriptions]
            poll_interval_ms = 50
        "#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.subscriptions.poll_interval_ms, 50);
        // Other fields should have defaults
        assert_eq!(config.subscriptions.buffer_lines, 2000);
        assert_eq!(config.tmux.command_timeout_ms, 5000);
    }

    #[test]
    fn test_tmux_socket_config() {
        let toml_str = r#"
            [tmux]
            binary = "/usr/local/bin/tmux"
            socket_name = "agents"
        "#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.tmux.binary, "/usr/local/bin/tmux");
        assert_eq!(config.tmux.socket_name.as_deref(), Some("agents"));
        assert!(config.tmux.socket_path.is_none());
    }

    #[test]
    fn test_origin_locator_prefers_config() {
        let config = RegistryConfig {
            origin_pane: Some("%4".into()),
            ..RegistryConfig::default()
        };
        assert_eq!(config.origin_locator().as_deref(), Some("%4"));
    }

    #[test]
    fn test_durations() {
        let config = SubscriptionConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(200));
        assert_eq!(config.default_timeout(), Duration::from_secs(1));
        assert_eq!(config.idle_timeout(), Duration::from_secs(1800));
    }
}
