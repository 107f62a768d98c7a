//! Token → subscription map

use std::collections::HashMap;
use std::sync::Arc;

use tokio::time::{Duration, Instant};
use uuid::Uuid;

use super::{Subscription, SubscriptionCell};

/// All live subscriptions, keyed by token
#[derive(Debug, Default)]
pub struct SubscriptionStore {
    subscriptions: HashMap<String, Arc<SubscriptionCell>>,
}

impl SubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh opaque token, never colliding with a live one
    pub fn generate_token(&self) -> String {
        loop {
            let token = Uuid::new_v4().simple().to_string();
            if !self.subscriptions.contains_key(&token) {
                return token;
            }
        }
    }

    pub fn insert(&mut self, subscription: Subscription) -> Arc<SubscriptionCell> {
        let token = subscription.token().to_string();
        let cell = Arc::new(SubscriptionCell::new(subscription));
        self.subscriptions.insert(token, Arc::clone(&cell));
        cell
    }

    pub fn get(&self, token: &str) -> Option<Arc<SubscriptionCell>> {
        self.subscriptions.get(token).cloned()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.subscriptions.contains_key(token)
    }

    pub fn remove(&mut self, token: &str) -> Option<Arc<SubscriptionCell>> {
        self.subscriptions.remove(token)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Tokens untouched for longer than `max_age` as of `now`
    pub fn idle_tokens(&self, now: Instant, max_age: Duration) -> Vec<String> {
        self.subscriptions
            .iter()
            .filter(|(_, cell)| cell.lock().is_idle(now, max_age))
            .map(|(token, _)| token.clone())
            .collect()
    }

    /// Lines held across every ring buffer
    pub fn total_buffered_lines(&self) -> usize {
        self.subscriptions
            .values()
            .map(|cell| cell.lock().buffer().len())
            .sum()
    }

    /// Estimated bytes held by ring buffers and redraw snapshots
    pub fn estimated_bytes(&self) -> usize {
        self.subscriptions
            .values()
            .map(|cell| {
                let sub = cell.lock();
                let snapshot: usize = sub
                    .snapshot()
                    .iter()
                    .map(|line| line.len() + std::mem::size_of::<String>())
                    .sum();
                sub.buffer().estimate_memory() + snapshot
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tooldex_protocol::CaptureMode;

    fn subscription(token: &str) -> Subscription {
        Subscription::new(token, "build", CaptureMode::Plain, 0, 10, 5)
    }

    #[test]
    fn test_generate_token_is_hex() {
        let store = SubscriptionStore::new();
        let token = store.generate_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, store.generate_token());
    }

    #[test]
    fn test_insert_get_remove() {
        let mut store = SubscriptionStore::new();
        store.insert(subscription("a"));

        assert!(store.contains("a"));
        assert_eq!(store.get("a").unwrap().lock().pane(), "build");
        assert!(store.remove("a").is_some());
        assert!(store.remove("a").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_buffered_line_totals() {
        let mut store = SubscriptionStore::new();
        let a = store.insert(subscription("a"));
        let b = store.insert(subscription("b"));
        a.lock().seed(&["1".to_string(), "2".to_string()]);
        b.lock().seed(&["3".to_string()]);

        assert_eq!(store.total_buffered_lines(), 3);
        assert!(store.estimated_bytes() > 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_tokens() {
        let mut store = SubscriptionStore::new();
        store.insert(subscription("stale"));
        tokio::time::advance(Duration::from_secs(60)).await;
        store.insert(subscription("fresh"));

        let idle = store.idle_tokens(Instant::now(), Duration::from_secs(30));
        assert_eq!(idle, vec!["stale".to_string()]);
    }
}
