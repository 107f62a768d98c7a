//! Update engine
//!
//! Turns "dump the last N lines" and "report total line count" into an
//! incremental tail. Each fetch is a bounded polling loop:
//!
//! 1. read the pane's total line count
//! 2. if it grew, capture the new lines (growth path)
//! 3. otherwise capture a fixed trailing window and compare it with the
//!    rolling snapshot (redraw path)
//! 4. if neither produced anything, sleep and retry until the budget runs out
//!
//! Growth always wins when both a count change and a redraw happen within
//! one interval. Shared state is never locked across a gateway call or sleep.

use std::sync::Arc;

use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, trace, warn};

use tooldex_protocol::PaneUpdate;
use tooldex_utils::{Result, TooldexError};

use super::SubscriptionCell;
use crate::config::SubscriptionConfig;
use crate::gateway::{GatewayError, TerminalGateway};
use crate::state::{Binding, SharedState};

/// Parameters of a single fetch
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest {
    /// Soft deadline, checked between polling attempts
    pub timeout: Duration,
    /// Ceiling on lines returned by the growth path
    pub max_lines: usize,
}

/// What one polling attempt produced
#[derive(Debug, PartialEq)]
enum Attempt {
    Delivered { lines: Vec<String>, truncated: bool },
    Quiet,
}

/// Runs the fetch algorithm against shared state
pub struct UpdateEngine {
    gateway: Arc<dyn TerminalGateway>,
    state: SharedState,
    poll_interval: Duration,
    snapshot_lines: usize,
}

impl UpdateEngine {
    pub fn new(gateway: Arc<dyn TerminalGateway>, state: SharedState, config: &SubscriptionConfig) -> Self {
        Self {
            gateway,
            state,
            poll_interval: config.poll_interval(),
            snapshot_lines: config.snapshot_lines.max(1),
        }
    }

    /// Fetch the next batch for `token`
    pub async fn fetch(&self, token: &str, request: FetchRequest) -> Result<PaneUpdate> {
        if request.max_lines == 0 {
            return Err(TooldexError::invalid_argument("max_lines must be positive"));
        }

        let deadline = Instant::now() + request.timeout;
        let first = self.state.read().binding(token)?;
        let _fetching = first.cell.fetch_guard().await;
        first.cell.lock().touch();

        let mut attempt_no = 0u32;
        loop {
            attempt_no += 1;
            // Re-resolved every attempt: the token may be gone, or the pane re-attached
            let binding = self.state.read().binding(token)?;

            match self.attempt(&binding, request.max_lines).await {
                Ok(Attempt::Delivered { lines, truncated }) => {
                    debug!(token, pane = %binding.pane, lines = lines.len(), truncated, attempt_no, "fetch delivered");
                    return Ok(finish(token, &binding, lines, truncated, false));
                }
                Ok(Attempt::Quiet) => {
                    trace!(token, attempt_no, "no update this attempt");
                }
                Err(e) if e.is_pane_vanished() => {
                    warn!(token, pane = %binding.pane, error = %e, "pane vanished during fetch");
                    return Err(TooldexError::PaneNotFound(binding.pane));
                }
                Err(e) => {
                    warn!(token, pane = %binding.pane, error = %e, "gateway failure during fetch, retrying");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(token, attempt_no, "fetch timed out");
                return Ok(finish(token, &binding, Vec::new(), false, true));
            }
            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    /// One pass of the count/growth/redraw check
    async fn attempt(&self, binding: &Binding, max_lines: usize) -> std::result::Result<Attempt, GatewayError> {
        let cell: &SubscriptionCell = &binding.cell;
        let (recorded, mode) = {
            let sub = cell.lock();
            (sub.lines_recorded(), sub.mode())
        };

        let total = self.gateway.total_line_count(&binding.pane_id).await?;

        if total > recorded {
            let growth = total - recorded;
            let wanted = (max_lines as u64).min(growth) as usize;
            let capture = self
                .gateway
                .capture_tail(&binding.pane_id, wanted, mode)
                .await?;
            let truncated = capture.clipped || growth > max_lines as u64;

            cell.lock().record_growth(&capture.lines, total, growth);
            return Ok(Attempt::Delivered {
                lines: capture.lines,
                truncated,
            });
        }

        let capture = self
            .gateway
            .capture_tail(&binding.pane_id, self.snapshot_lines, mode)
            .await?;

        let mut sub = cell.lock();
        if !sub.snapshot_ready() {
            sub.adopt_snapshot(&capture.lines, total);
            return Ok(Attempt::Quiet);
        }

        if sub.snapshot_differs(&capture.lines) {
            sub.record_redraw(&capture.lines, total);
            debug!(token = %sub.token(), lines = capture.lines.len(), "redraw detected");
            // Redraw batches are never flagged truncated, clipped or not
            return Ok(Attempt::Delivered {
                lines: capture.lines,
                truncated: false,
            });
        }

        sub.refresh_snapshot(&capture.lines, total);
        Ok(Attempt::Quiet)
    }
}

fn finish(token: &str, binding: &Binding, lines: Vec<String>, truncated: bool, timed_out: bool) -> PaneUpdate {
    let mut sub = binding.cell.lock();
    sub.touch();
    PaneUpdate {
        token: token.to_string(),
        pane: binding.pane.clone(),
        new_lines: lines,
        lines_recorded: sub.lines_recorded(),
        usage_percent: sub.buffer().usage_percent(),
        truncated,
        timed_out,
    }
}
