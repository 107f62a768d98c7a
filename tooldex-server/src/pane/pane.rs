//! Attached pane

use std::collections::HashSet;
use std::time::SystemTime;

use tooldex_protocol::{PaneInfo, PaneLocation};

use crate::gateway::PaneTarget;

/// A named handle onto a multiplexer pane
#[derive(Debug, Clone)]
pub struct Pane {
    name: String,
    pane_id: String,
    location: PaneLocation,
    primary: bool,
    attached_at: SystemTime,
    /// Registry-wide attach order, breaks ties between equal timestamps
    attach_seq: u64,
    last_accessed: SystemTime,
    /// Tokens of subscriptions bound to this pane
    subscriptions: HashSet<String>,
}

impl Pane {
    pub fn new(name: impl Into<String>, target: PaneTarget, primary: bool, attach_seq: u64) -> Self {
        let now = SystemTime::now();
        Self {
            name: name.into(),
            pane_id: target.pane_id,
            location: target.location,
            primary,
            attached_at: now,
            attach_seq,
            last_accessed: now,
            subscriptions: HashSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pane_id(&self) -> &str {
        &self.pane_id
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn set_primary(&mut self, primary: bool) {
        self.primary = primary;
    }

    pub fn attach_seq(&self) -> u64 {
        self.attach_seq
    }

    pub fn last_accessed(&self) -> SystemTime {
        self.last_accessed
    }

    /// Record an access
    pub fn touch(&mut self) {
        self.last_accessed = SystemTime::now();
    }

    /// Point an existing name at a new identity (re-attach)
    ///
    /// Subscriptions stay bound; the attach time and order are refreshed.
    pub fn retarget(&mut self, target: PaneTarget, attach_seq: u64) {
        self.pane_id = target.pane_id;
        self.location = target.location;
        self.attached_at = SystemTime::now();
        self.attach_seq = attach_seq;
        self.touch();
    }

    pub fn subscriptions(&self) -> &HashSet<String> {
        &self.subscriptions
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn add_subscription(&mut self, token: impl Into<String>) {
        self.subscriptions.insert(token.into());
    }

    /// Returns whether the token was bound here
    pub fn remove_subscription(&mut self, token: &str) -> bool {
        self.subscriptions.remove(token)
    }

    /// Unbind and return every subscription token
    pub fn take_subscriptions(&mut self) -> HashSet<String> {
        std::mem::take(&mut self.subscriptions)
    }

    pub fn to_info(&self) -> PaneInfo {
        PaneInfo {
            name: self.name.clone(),
            pane_id: self.pane_id.clone(),
            location: self.location.clone(),
            primary: self.primary,
            attached_at: unix_millis(self.attached_at),
            last_accessed: unix_millis(self.last_accessed),
            subscriptions: self.subscriptions.len(),
        }
    }
}

fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
