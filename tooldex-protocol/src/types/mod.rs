pub mod pane;
pub mod subscription;

pub use pane::*;
pub use subscription::*;
