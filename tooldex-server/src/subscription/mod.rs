//! Subscriptions: buffered incremental readers over a pane

#![allow(clippy::module_inception)]

mod buffer;
mod engine;
mod store;
mod subscription;

pub use buffer::LineBuffer;
pub use engine::{FetchRequest, UpdateEngine};
pub use store::SubscriptionStore;
pub use subscription::{Subscription, SubscriptionCell};
