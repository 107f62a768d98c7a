//! Shared registry and subscription state
//!
//! Both indices live behind one lock so that a pane's removal and the
//! cascade over its subscriptions land as a single step.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use tooldex_protocol::DetachOutcome;
use tooldex_utils::{Result, TooldexError};

use crate::pane::PaneRegistry;
use crate::subscription::{Subscription, SubscriptionCell, SubscriptionStore};

/// State shared between the hub and the update engine
pub type SharedState = Arc<RwLock<HubState>>;

/// A subscription together with the pane it currently reads from
#[derive(Debug, Clone)]
pub struct Binding {
    pub cell: Arc<SubscriptionCell>,
    pub pane: String,
    pub pane_id: String,
}

#[derive(Debug)]
pub struct HubState {
    pub registry: PaneRegistry,
    pub store: SubscriptionStore,
}

impl HubState {
    pub fn new(max_panes: usize) -> Self {
        Self {
            registry: PaneRegistry::new(max_panes),
            store: SubscriptionStore::new(),
        }
    }

    pub fn into_shared(self) -> SharedState {
        Arc::new(RwLock::new(self))
    }

    /// Insert a subscription and record it in its pane's set
    pub fn bind_subscription(&mut self, subscription: Subscription) -> Result<Arc<SubscriptionCell>> {
        let pane_name = subscription.pane().to_string();
        let token = subscription.token().to_string();

        let pane = self
            .registry
            .get_mut(&pane_name)
            .ok_or_else(|| TooldexError::PaneNotFound(pane_name.clone()))?;
        pane.add_subscription(token);

        Ok(self.store.insert(subscription))
    }

    /// Remove a subscription from both indices
    pub fn remove_subscription(&mut self, token: &str) -> bool {
        let Some(cell) = self.store.remove(token) else {
            return false;
        };

        let pane_name = cell.lock().pane().to_string();
        if let Some(pane) = self.registry.get_mut(&pane_name) {
            pane.remove_subscription(token);
        }
        debug!(token, pane = %pane_name, "subscription removed");
        true
    }

    /// Detach a pane and every subscription bound to it
    pub fn detach(&mut self, name: &str) -> DetachOutcome {
        let Some(mut pane) = self.registry.detach(name) else {
            return DetachOutcome {
                name: name.to_string(),
                ..DetachOutcome::default()
            };
        };

        let info = pane.to_info();
        let removed = pane
            .take_subscriptions()
            .into_iter()
            .filter(|token| self.store.remove(token).is_some())
            .count();

        info!(pane = %info.name, removed, "detach cascaded to subscriptions");
        DetachOutcome {
            name: info.name.clone(),
            pane: Some(info),
            removed_subscriptions: removed,
        }
    }

    /// Look up a token and the pane it is bound to
    pub fn binding(&self, token: &str) -> Result<Binding> {
        let cell = self
            .store
            .get(token)
            .ok_or_else(|| TooldexError::SubscriptionNotFound(token.to_string()))?;

        let pane = cell.lock().pane().to_string();
        let pane_id = self
            .registry
            .get(&pane)
            .map(|p| p.pane_id().to_string())
            .ok_or_else(|| TooldexError::PaneNotFound(pane.clone()))?;

        Ok(Binding { cell, pane, pane_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::PaneTarget;
    use tooldex_protocol::CaptureMode;

    fn state_with_panes(names: &[&str]) -> HubState {
        let mut state = HubState::new(8);
        for (i, name) in names.iter().enumerate() {
            state
                .registry
                .attach(name, PaneTarget::bare(format!("%{}", i)), false)
                .unwrap();
        }
        state
    }

    fn subscribe(state: &mut HubState, token: &str, pane: &str) {
        let sub = Subscription::new(token, pane, CaptureMode::Plain, 0, 10, 5);
        state.bind_subscription(sub).unwrap();
    }

    #[test]
    fn test_bind_requires_attached_pane() {
        let mut state = state_with_panes(&[]);
        let sub = Subscription::new("t", "ghost", CaptureMode::Plain, 0, 10, 5);
        assert!(matches!(
            state.bind_subscription(sub),
            Err(TooldexError::PaneNotFound(_))
        ));
        assert!(state.store.is_empty());
    }

    #[test]
    fn test_detach_removes_exactly_bound_subscriptions() {
        let mut state = state_with_panes(&["a", "b"]);
        subscribe(&mut state, "a1", "a");
        subscribe(&mut state, "a2", "a");
        subscribe(&mut state, "b1", "b");

        let outcome = state.detach("a");
        assert!(outcome.detached());
        assert_eq!(outcome.removed_subscriptions, 2);
        assert!(!state.store.contains("a1"));
        assert!(!state.store.contains("a2"));
        assert!(state.store.contains("b1"));
        assert_eq!(state.registry.get("b").unwrap().subscription_count(), 1);
    }

    #[test]
    fn test_detach_unknown_is_empty() {
        let mut state = state_with_panes(&["a"]);
        let outcome = state.detach("ghost");
        assert!(!outcome.detached());
        assert_eq!(outcome.name, "ghost");
        assert_eq!(outcome.removed_subscriptions, 0);
    }

    #[test]
    fn test_remove_subscription_updates_both_indices() {
        let mut state = state_with_panes(&["a"]);
        subscribe(&mut state, "t", "a");

        assert!(state.remove_subscription("t"));
        assert!(!state.remove_subscription("t"));
        assert_eq!(state.registry.get("a").unwrap().subscription_count(), 0);
    }

    #[test]
    fn test_binding_errors() {
        let mut state = state_with_panes(&["a"]);
        assert!(matches!(
            state.binding("missing"),
            Err(TooldexError::SubscriptionNotFound(_))
        ));

        subscribe(&mut state, "t", "a");
        let binding = state.binding("t").unwrap();
        assert_eq!(binding.pane, "a");
        assert_eq!(binding.pane_id, "%0");
    }
}
