//! tmux-backed terminal gateway
//!
//! Shells out to the `tmux` binary for every request. Each command is bounded
//! by the configured timeout and killed if it overruns.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, trace};

use tooldex_protocol::{CaptureMode, PaneLocation};

use super::{Capture, GatewayError, PaneTarget, TerminalGateway};
use crate::config::TmuxConfig;

/// Format asked of `display-message` when resolving a locator
const TARGET_FORMAT: &str = "#{pane_id}\t#{session_name}:#{window_index}\t#{pane_index}";

/// Format asked of `display-message` when counting lines
const LINE_COUNT_FORMAT: &str = "#{pane_history} #{pane_height}";

/// Gateway that drives a tmux server through its CLI
#[derive(Debug, Clone)]
pub struct TmuxGateway {
    binary: String,
    socket_name: Option<String>,
    socket_path: Option<String>,
    command_timeout: Duration,
}

impl TmuxGateway {
    pub fn new(config: &TmuxConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            socket_name: config.socket_name.clone(),
            socket_path: config.socket_path.clone(),
            command_timeout: Duration::from_millis(config.command_timeout_ms),
        }
    }

    /// Socket selection flags, `-S` winning over `-L`
    fn socket_args(&self) -> Vec<&str> {
        if let Some(path) = &self.socket_path {
            vec!["-S", path.as_str()]
        } else if let Some(name) = &self.socket_name {
            vec!["-L", name.as_str()]
        } else {
            Vec::new()
        }
    }

    /// Run a tmux command and return its stdout
    async fn run(&self, args: &[&str]) -> Result<String, GatewayError> {
        let command_name = args.first().copied().unwrap_or_default().to_string();

        let mut cmd = Command::new(&self.binary);
        cmd.args(self.socket_args())
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        trace!(binary = %self.binary, ?args, "running tmux command");

        let output = match tokio::time::timeout(self.command_timeout, cmd.output()).await {
            Err(_) => {
                return Err(GatewayError::Timeout {
                    command: command_name,
                    ms: self.command_timeout.as_millis() as u64,
                })
            }
            Ok(Err(source)) => {
                return Err(GatewayError::Spawn {
                    binary: self.binary.clone(),
                    source,
                })
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            debug!(command = %command_name, status = ?output.status.code(), %stderr, "tmux command failed");
            return Err(classify_failure(&command_name, output.status.code(), &stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl TerminalGateway for TmuxGateway {
    async fn resolve_target(&self, locator: &str) -> Result<PaneTarget, GatewayError> {
        let output = self
            .run(&["display-message", "-p", "-t", locator, TARGET_FORMAT])
            .await?;
        parse_target(&output)
    }

    async fn capture_tail(
        &self,
        pane_id: &str,
        max_lines: usize,
        mode: CaptureMode,
    ) -> Result<Capture, GatewayError> {
        if max_lines == 0 {
            return Err(GatewayError::InvalidRequest("max_lines must be positive".into()));
        }

        // One extra line reveals whether anything lies beyond the tail
        let start = format!("-{}", max_lines + 1);
        let mut args = vec!["capture-pane", "-p", "-t", pane_id, "-S", start.as_str()];
        if mode.is_markup() {
            args.push("-e");
        }

        let output = self.run(&args).await?;
        Ok(tail_lines(&output, max_lines))
    }

    async fn total_line_count(&self, pane_id: &str) -> Result<u64, GatewayError> {
        let output = self
            .run(&["display-message", "-p", "-t", pane_id, LINE_COUNT_FORMAT])
            .await?;
        Ok(parse_line_count(&output))
    }

    async fn send_input(
        &self,
        pane_id: &str,
        text: &str,
        submit: bool,
    ) -> Result<(), GatewayError> {
        if !text.is_empty() {
            self.run(&["send-keys", "-t", pane_id, "-l", text]).await?;
        }
        if submit {
            self.run(&["send-keys", "-t", pane_id, "Enter"]).await?;
        }
        Ok(())
    }
}

/// Map a failed tmux invocation onto a gateway error
fn classify_failure(command: &str, code: Option<i32>, stderr: &str) -> GatewayError {
    let lowered = stderr.to_ascii_lowercase();
    let missing_target = ["can't find pane", "can't find window", "can't find session"]
        .iter()
        .any(|needle| lowered.contains(needle));

    if missing_target {
        return GatewayError::PaneVanished(stderr.to_string());
    }

    GatewayError::Unavailable(format!(
        "tmux {} failed (exit code {}): {}",
        command,
        code.map(|c| c.to_string()).unwrap_or_else(|| "signal".into()),
        stderr
    ))
}

/// Parse `#{pane_history} #{pane_height}`; missing or garbled fields count as zero
fn parse_line_count(output: &str) -> u64 {
    let mut parts = output.split_whitespace();
    let history = parts.next().and_then(|p| p.parse::<u64>().ok());
    let height = parts.next().and_then(|p| p.parse::<u64>().ok());

    match (history, height) {
        (Some(history), Some(height)) => history + height,
        (Some(history), None) => history,
        _ => 0,
    }
}

fn parse_target(output: &str) -> Result<PaneTarget, GatewayError> {
    let line = output.trim_end_matches(&['\r', '\n'][..]);
    let mut fields = line.split('\t');

    let pane_id = fields
        .next()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| GatewayError::Unavailable(format!("unexpected target output: {:?}", line)))?;
    let group = fields.next().unwrap_or_default();
    let index = fields
        .next()
        .and_then(|i| i.trim().parse::<u32>().ok())
        .unwrap_or(0);

    Ok(PaneTarget::new(pane_id, PaneLocation::new(group, index)))
}

/// Keep the last `max_lines` lines of a capture
fn tail_lines(output: &str, max_lines: usize) -> Capture {
    Capture::from_tail(output.lines().map(str::to_string).collect(), max_lines)
}
