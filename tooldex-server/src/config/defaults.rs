//! Default configuration values
//!
//! These are embedded in the binary and used when no config file exists.

/// Default configuration as TOML (for reference/documentation)
pub const DEFAULT_CONFIG_TOML: &str = r##"
# tooldex configuration

[tmux]
binary = "tmux"
# socket_name = "agents"
# socket_path = "/tmp/tmux-1000/default"
command_timeout_ms = 5000

[registry]
max_panes = 16
# origin_pane = "%0"     # defaults to $TOOLDEX_PRIMARY_PANE, then $TMUX_PANE
origin_name = "origin"

[subscriptions]
buffer_lines = 2000
snapshot_lines = 100
max_backfill_lines = 5000
poll_interval_ms = 200
default_timeout_ms = 1000
default_max_lines = 200
idle_timeout_secs = 1800
memory_threshold_bytes = 67108864
"##;
