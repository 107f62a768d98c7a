//! Error types for tooldex
//!
//! Provides a unified error type used across all tooldex crates.

use std::path::PathBuf;

/// Main error type for tooldex operations
#[derive(Debug, thiserror::Error)]
pub enum TooldexError {
    // === IO Errors ===

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Configuration Errors ===

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    // === Registry Errors ===

    #[error("Pane not found: {0}")]
    PaneNotFound(String),

    #[error("No primary pane is attached")]
    NoPrimary,

    #[error("Pane registry is full ({limit} panes attached)")]
    CapacityExceeded { limit: usize },

    #[error("Invalid pane name: {0:?}")]
    InvalidName(String),

    // === Subscription Errors ===

    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // === Gateway Errors ===

    #[error("Terminal gateway unavailable: {0}")]
    GatewayUnavailable(String),

    // === Internal Errors ===

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TooldexError {
    /// Create a gateway error
    pub fn gateway(msg: impl Into<String>) -> Self {
        Self::GatewayUnavailable(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid-argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this error may clear up without the caller changing its request
    ///
    /// Gateway hiccups pass on their own; a missing primary or a full registry
    /// clear once another caller attaches or detaches a pane.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::GatewayUnavailable(_) | Self::NoPrimary | Self::CapacityExceeded { .. }
        )
    }
}

/// Result type alias using TooldexError
pub type Result<T> = std::result::Result<T, TooldexError>;
