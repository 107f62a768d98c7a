use serde::{Deserialize, Serialize};
use std::fmt;

// ==================== Capture Mode ====================

/// How pane content is captured from the multiplexer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// Text only, escape sequences stripped by the multiplexer
    #[default]
    Plain,
    /// Text with color/attribute escape sequences preserved
    Markup,
}

impl CaptureMode {
    /// Build a mode from an "include colors" style flag
    pub fn from_markup_flag(markup: bool) -> Self {
        if markup {
            Self::Markup
        } else {
            Self::Plain
        }
    }

    /// Whether formatting markup is preserved
    pub fn is_markup(self) -> bool {
        matches!(self, Self::Markup)
    }
}

// ==================== Pane Location ====================

/// Where a pane lives inside the multiplexer (display/lookup only)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PaneLocation {
    /// Logical grouping, e.g. `session:window`
    pub group: String,
    /// Pane index within the group
    pub index: u32,
}

impl PaneLocation {
    pub fn new(group: impl Into<String>, index: u32) -> Self {
        Self {
            group: group.into(),
            index,
        }
    }
}

impl fmt::Display for PaneLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.index)
    }
}

// ==================== Pane Info ====================

/// Attached pane information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaneInfo {
    /// Caller-chosen name
    pub name: String,
    /// Opaque identifier issued by the multiplexer (e.g. `%3`)
    pub pane_id: String,
    pub location: PaneLocation,
    /// Whether this pane answers to the primary alias
    pub primary: bool,
    /// Attach time (Unix millis)
    pub attached_at: u64,
    /// Last resolve/attach time (Unix millis)
    pub last_accessed: u64,
    /// Number of live subscriptions bound to this pane
    pub subscriptions: usize,
}

/// Result of detaching a pane
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DetachOutcome {
    pub name: String,
    /// The removed pane, or `None` if the name was not attached
    pub pane: Option<PaneInfo>,
    /// Subscriptions removed along with the pane
    pub removed_subscriptions: usize,
}

impl DetachOutcome {
    /// Whether anything was actually detached
    pub fn detached(&self) -> bool {
        self.pane.is_some()
    }
}

/// One-shot capture of a pane's most recent lines
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaneCapture {
    pub pane: String,
    pub lines_requested: usize,
    pub lines_returned: usize,
    pub truncated: bool,
    pub mode: CaptureMode,
    pub content: Vec<String>,
}

/// Result of dispatching input to a pane
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputDispatch {
    pub pane: String,
    pub pane_id: String,
    pub text: String,
    pub submitted: bool,
    pub triggered_enter: bool,
    pub note: String,
}
