//! Attached panes and the registry that names them

#![allow(clippy::module_inception)]

mod pane;
mod registry;

pub use pane::Pane;
pub use registry::{is_valid_name, OriginPane, PaneRegistry};
