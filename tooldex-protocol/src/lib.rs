//! tooldex-protocol: Data types exchanged with the controlling agent
//!
//! This crate defines the structures returned by the pane registry and the
//! subscription engine. They are serialized as JSON inside MCP tool results.

pub mod types;

// Re-export main types at crate root
pub use types::{
    CaptureMode, DetachOutcome, InputDispatch, PaneCapture, PaneInfo, PaneLocation, PaneUpdate,
    SubscriptionOpened, SweepReport, UsageStats,
};

/// Reserved pane name that resolves to whichever pane holds the primary flag
pub const PRIMARY_ALIAS: &str = "primary";
