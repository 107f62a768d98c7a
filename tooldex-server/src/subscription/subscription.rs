//! Subscription state
//!
//! A subscription is a caller's reading position into one pane. It keeps the
//! diff baseline (`lines_recorded`), a ring of recently delivered lines, and a
//! short rolling snapshot of the pane's tail used only to notice redraws.

use parking_lot::{Mutex, MutexGuard};
use tokio::time::{Duration, Instant};

use tooldex_protocol::CaptureMode;

use super::LineBuffer;

/// Incremental reader bound to a single pane
#[derive(Debug)]
pub struct Subscription {
    token: String,
    pane: String,
    mode: CaptureMode,
    /// Last known total line count of the pane
    lines_recorded: u64,
    buffer: LineBuffer,
    /// Trailing window for redraw detection, oldest first
    snapshot: Vec<String>,
    snapshot_limit: usize,
    snapshot_ready: bool,
    last_accessed: Instant,
}

impl Subscription {
    pub fn new(
        token: impl Into<String>,
        pane: impl Into<String>,
        mode: CaptureMode,
        lines_recorded: u64,
        buffer_lines: usize,
        snapshot_limit: usize,
    ) -> Self {
        let now = Instant::now();
        Self {
            token: token.into(),
            pane: pane.into(),
            mode,
            lines_recorded,
            buffer: LineBuffer::new(buffer_lines),
            snapshot: Vec::new(),
            snapshot_limit: snapshot_limit.max(1),
            snapshot_ready: false,
            last_accessed: now,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Name of the bound pane
    pub fn pane(&self) -> &str {
        &self.pane
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn lines_recorded(&self) -> u64 {
        self.lines_recorded
    }

    pub fn buffer(&self) -> &LineBuffer {
        &self.buffer
    }

    pub fn snapshot(&self) -> &[String] {
        &self.snapshot
    }

    pub fn snapshot_ready(&self) -> bool {
        self.snapshot_ready
    }

    pub fn last_accessed(&self) -> Instant {
        self.last_accessed
    }

    pub fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }

    /// Untouched for longer than `max_age` as of `now`
    pub fn is_idle(&self, now: Instant, max_age: Duration) -> bool {
        now.saturating_duration_since(self.last_accessed) > max_age
    }

    /// Seed from a backfill capture
    ///
    /// An empty backfill leaves the snapshot unestablished so the first
    /// redraw check adopts a baseline silently.
    pub fn seed(&mut self, lines: &[String]) {
        if lines.is_empty() {
            return;
        }
        self.buffer.extend(lines.iter().cloned());
        self.set_snapshot(lines);
    }

    /// Growth path: `lines` were captured after the pane grew by `growth` lines
    pub fn record_growth(&mut self, lines: &[String], current_total: u64, growth: u64) {
        self.buffer.extend(lines.iter().cloned());
        self.lines_recorded = current_total;

        if growth > lines.len() as u64 || !self.snapshot_ready {
            // Gap between the old snapshot and this batch
            self.set_snapshot(lines);
        } else {
            self.snapshot.extend(lines.iter().cloned());
            self.trim_snapshot();
        }
        self.snapshot_ready = true;
    }

    /// Whether a redraw-window capture disagrees with the stored snapshot
    ///
    /// Comparison is tail-aligned: only the capture's last `snapshot.len()`
    /// lines are compared, and a capture shorter than the snapshot always
    /// counts as a change.
    pub fn snapshot_differs(&self, capture: &[String]) -> bool {
        if capture.len() < self.snapshot.len() {
            return true;
        }
        let tail = &capture[capture.len() - self.snapshot.len()..];
        tail != self.snapshot.as_slice()
    }

    /// First redraw check with no baseline: adopt silently
    pub fn adopt_snapshot(&mut self, capture: &[String], current_total: u64) {
        self.set_snapshot(capture);
        self.lines_recorded = current_total;
    }

    /// Redraw path: the whole window counts as new content
    pub fn record_redraw(&mut self, capture: &[String], current_total: u64) {
        self.buffer.extend(capture.iter().cloned());
        self.set_snapshot(capture);
        self.lines_recorded = current_total;
    }

    /// Redraw check found nothing new: resync window and baseline
    pub fn refresh_snapshot(&mut self, capture: &[String], current_total: u64) {
        self.set_snapshot(capture);
        self.lines_recorded = current_total;
    }

    /// Up to `lines` most recent buffered lines, oldest first
    pub fn replay(&self, lines: usize) -> Vec<String> {
        self.buffer.last_n(lines).map(str::to_string).collect()
    }

    fn set_snapshot(&mut self, lines: &[String]) {
        let start = lines.len().saturating_sub(self.snapshot_limit);
        self.snapshot = lines[start..].to_vec();
        self.snapshot_ready = true;
    }

    fn trim_snapshot(&mut self) {
        if self.snapshot.len() > self.snapshot_limit {
            let excess = self.snapshot.len() - self.snapshot_limit;
            self.snapshot.drain(..excess);
        }
    }
}

/// Shared handle to a subscription
///
/// `fetch_lock` serializes fetches on one token; `state` is only ever locked
/// synchronously and never across an await.
#[derive(Debug)]
pub struct SubscriptionCell {
    fetch_lock: tokio::sync::Mutex<()>,
    state: Mutex<Subscription>,
}

impl SubscriptionCell {
    pub fn new(subscription: Subscription) -> Self {
        Self {
            fetch_lock: tokio::sync::Mutex::new(()),
            state: Mutex::new(subscription),
        }
    }

    /// Wait for exclusive fetch rights on this token
    pub async fn fetch_guard(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.fetch_lock.lock().await
    }

    pub fn lock(&self) -> MutexGuard<'_, Subscription> {
        self.state.lock()
    }
}
