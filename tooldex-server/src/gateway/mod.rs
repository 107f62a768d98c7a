//! Terminal gateway
//!
//! The narrow capability the core consumes from the terminal multiplexer:
//! capture the tail of a pane, report its total line count, send input, and
//! resolve a caller's locator into a pane identity. The multiplexer offers no
//! change notifications; everything above this trait is built from polling.

mod tmux;

#[cfg(test)]
pub mod fake;

pub use tmux::TmuxGateway;

use async_trait::async_trait;
use tooldex_protocol::{CaptureMode, PaneLocation};
use tooldex_utils::TooldexError;

/// Identity of a pane as issued by the multiplexer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneTarget {
    /// Opaque pane identifier (tmux: `%N`)
    pub pane_id: String,
    pub location: PaneLocation,
}

impl PaneTarget {
    pub fn new(pane_id: impl Into<String>, location: PaneLocation) -> Self {
        Self {
            pane_id: pane_id.into(),
            location,
        }
    }

    /// A target known only by its raw identifier
    pub fn bare(pane_id: impl Into<String>) -> Self {
        Self::new(pane_id, PaneLocation::default())
    }
}

/// Lines captured from the tail of a pane, oldest first
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Capture {
    pub lines: Vec<String>,
    /// More content existed beyond the requested tail and was cut off
    pub clipped: bool,
}

impl Capture {
    /// Keep the last `max_lines` of `lines`
    ///
    /// Callers ask the multiplexer for one line more than they want; an
    /// extra line coming back is what marks the capture clipped.
    pub fn from_tail(mut lines: Vec<String>, max_lines: usize) -> Self {
        let clipped = lines.len() > max_lines;
        if clipped {
            lines.drain(..lines.len() - max_lines);
        }
        Self { lines, clipped }
    }
}

/// Gateway failures
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The pane (or its session) no longer exists
    #[error("pane {0} no longer exists")]
    PaneVanished(String),

    /// The multiplexer could not answer (no server, bad socket, odd output)
    #[error("{0}")]
    Unavailable(String),

    /// A multiplexer command did not finish in time
    #[error("{command} timed out after {ms}ms")]
    Timeout { command: String, ms: u64 },

    /// The multiplexer binary could not be started
    #[error("failed to run {binary}: {source}")]
    Spawn {
        binary: String,
        source: std::io::Error,
    },

    /// The request itself was malformed
    #[error("invalid gateway request: {0}")]
    InvalidRequest(String),
}

impl GatewayError {
    pub fn is_pane_vanished(&self) -> bool {
        matches!(self, Self::PaneVanished(_))
    }
}

impl From<GatewayError> for TooldexError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidRequest(msg) => TooldexError::InvalidArgument(msg),
            other => TooldexError::GatewayUnavailable(other.to_string()),
        }
    }
}

/// Capability interface onto the terminal multiplexer
#[async_trait]
pub trait TerminalGateway: Send + Sync {
    /// Resolve a locator (`%3`, `work:1.0`, ...) into a pane identity
    async fn resolve_target(&self, locator: &str) -> Result<PaneTarget, GatewayError>;

    /// Capture at most `max_lines` of the most recent lines; `max_lines` must be positive
    async fn capture_tail(
        &self,
        pane_id: &str,
        max_lines: usize,
        mode: CaptureMode,
    ) -> Result<Capture, GatewayError>;

    /// Total addressable lines (scrollback + visible)
    async fn total_line_count(&self, pane_id: &str) -> Result<u64, GatewayError>;

    /// Send literal text, optionally followed by Enter
    async fn send_input(&self, pane_id: &str, text: &str, submit: bool)
        -> Result<(), GatewayError>;
}
