//! MCP tool handlers
//!
//! Thin adapters from parsed tool arguments onto [`PaneHub`] operations.
//! Each returns the JSON text placed in the tool result.

use std::time::Duration;

use serde::Serialize;

use tooldex_protocol::CaptureMode;
use tooldex_utils::{Result, TooldexError};

use crate::hub::PaneHub;

/// Tool handler context
pub struct ToolContext<'a> {
    pub hub: &'a PaneHub,
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| TooldexError::internal(e.to_string()))
}

impl<'a> ToolContext<'a> {
    pub fn new(hub: &'a PaneHub) -> Self {
        Self { hub }
    }

    pub async fn attach_pane(&self, name: &str, target: &str, primary: bool) -> Result<String> {
        let info = self.hub.attach(name, target, primary).await?;
        to_json(&info)
    }

    pub fn detach_pane(&self, name: &str) -> Result<String> {
        to_json(&self.hub.detach(name))
    }

    pub fn list_panes(&self) -> Result<String> {
        to_json(&self.hub.list_panes())
    }

    pub async fn read_pane(&self, pane: &str, lines: usize, mode: CaptureMode) -> Result<String> {
        let capture = self.hub.read_pane(pane, lines, mode).await?;
        to_json(&capture)
    }

    pub async fn send_input(&self, pane: &str, text: &str, submit: bool) -> Result<String> {
        let dispatch = self.hub.send_input(pane, text, submit).await?;
        to_json(&dispatch)
    }

    pub async fn subscribe(&self, pane: &str, mode: CaptureMode, initial_lines: usize) -> Result<String> {
        let opened = self.hub.subscribe(pane, mode, initial_lines).await?;
        to_json(&opened)
    }

    pub async fn fetch_updates(
        &self,
        token: &str,
        timeout: Option<Duration>,
        max_lines: Option<usize>,
    ) -> Result<String> {
        let update = self.hub.fetch(token, timeout, max_lines).await?;
        to_json(&update)
    }

    pub fn unsubscribe(&self, token: &str) -> Result<String> {
        let removed = self.hub.unsubscribe(token);
        to_json(&serde_json::json!({ "token": token, "removed": removed }))
    }

    pub fn replay(&self, token: &str, lines: usize) -> Result<String> {
        let replayed = self.hub.replay(token, lines)?;
        to_json(&serde_json::json!({
            "token": token,
            "lines_returned": replayed.len(),
            "lines": replayed,
        }))
    }

    pub fn stats(&self) -> Result<String> {
        to_json(&self.hub.stats())
    }

    pub fn sweep_idle(&self, max_age: Option<Duration>) -> Result<String> {
        to_json(&self.hub.sweep_idle(max_age))
    }
}
