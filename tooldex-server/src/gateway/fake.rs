//! Scripted in-memory gateway for tests
//!
//! Line counts and pane contents are queued per call; once a queue drains,
//! the last value keeps being returned so a quiet pane stays quiet. Captures
//! are cut from the queued content with the same tail rule tmux output gets.

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use tooldex_protocol::{CaptureMode, PaneLocation};

use super::{Capture, GatewayError, PaneTarget, TerminalGateway};

/// A recorded gateway call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Resolve(String),
    LineCount(String),
    Capture {
        pane_id: String,
        max_lines: usize,
        mode: CaptureMode,
    },
    Input {
        pane_id: String,
        text: String,
        submit: bool,
    },
}

#[derive(Debug, Default)]
struct FakeState {
    targets: HashMap<String, PaneTarget>,
    counts: VecDeque<u64>,
    last_count: u64,
    contents: VecDeque<Vec<String>>,
    last_content: Vec<String>,
    count_failures: VecDeque<GatewayError>,
    vanished: HashSet<String>,
    calls: Vec<GatewayCall>,
}

/// Gateway double driven by queued responses
#[derive(Debug, Default)]
pub struct FakeGateway {
    state: Mutex<FakeState>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a locator; the pane id doubles as a locator too
    pub fn with_pane(self, locator: &str, pane_id: &str) -> Self {
        {
            let mut state = self.state.lock();
            let target = PaneTarget::new(pane_id, PaneLocation::new("dev:0", 0));
            state.targets.insert(locator.to_string(), target.clone());
            state.targets.insert(pane_id.to_string(), target);
        }
        self
    }

    pub fn push_counts(&self, counts: impl IntoIterator<Item = u64>) {
        self.state.lock().counts.extend(counts);
    }

    /// Queue the pane's content as seen by the next capture
    pub fn push_content(&self, lines: Vec<String>) {
        self.state.lock().contents.push_back(lines);
    }

    pub fn push_lines(&self, lines: &[&str]) {
        self.push_content(lines.iter().map(|l| l.to_string()).collect());
    }

    /// Fail the next line-count request with the given error
    pub fn fail_next_count(&self, err: GatewayError) {
        self.state.lock().count_failures.push_back(err);
    }

    /// Every further request for this pane reports it gone
    pub fn vanish(&self, pane_id: &str) {
        self.state.lock().vanished.insert(pane_id.to_string());
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state.lock().calls.clone()
    }

    pub fn capture_calls(&self) -> Vec<GatewayCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, GatewayCall::Capture { .. }))
            .collect()
    }

    fn check_vanished(state: &FakeState, pane_id: &str) -> Result<(), GatewayError> {
        if state.vanished.contains(pane_id) {
            Err(GatewayError::PaneVanished(pane_id.to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TerminalGateway for FakeGateway {
    async fn resolve_target(&self, locator: &str) -> Result<PaneTarget, GatewayError> {
        let mut state = self.state.lock();
        state.calls.push(GatewayCall::Resolve(locator.to_string()));
        state
            .targets
            .get(locator)
            .cloned()
            .ok_or_else(|| GatewayError::PaneVanished(locator.to_string()))
    }

    async fn capture_tail(
        &self,
        pane_id: &str,
        max_lines: usize,
        mode: CaptureMode,
    ) -> Result<Capture, GatewayError> {
        let mut state = self.state.lock();
        state.calls.push(GatewayCall::Capture {
            pane_id: pane_id.to_string(),
            max_lines,
            mode,
        });
        Self::check_vanished(&state, pane_id)?;
        if max_lines == 0 {
            return Err(GatewayError::InvalidRequest("max_lines must be positive".into()));
        }

        if let Some(next) = state.contents.pop_front() {
            state.last_content = next;
        }
        Ok(Capture::from_tail(state.last_content.clone(), max_lines))
    }

    async fn total_line_count(&self, pane_id: &str) -> Result<u64, GatewayError> {
        let mut state = self.state.lock();
        state.calls.push(GatewayCall::LineCount(pane_id.to_string()));
        Self::check_vanished(&state, pane_id)?;
        if let Some(err) = state.count_failures.pop_front() {
            return Err(err);
        }

        if let Some(next) = state.counts.pop_front() {
            state.last_count = next;
        }
        Ok(state.last_count)
    }

    async fn send_input(
        &self,
        pane_id: &str,
        text: &str,
        submit: bool,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock();
        state.calls.push(GatewayCall::Input {
            pane_id: pane_id.to_string(),
            text: text.to_string(),
            submit,
        });
        Self::check_vanished(&state, pane_id)
    }
}
