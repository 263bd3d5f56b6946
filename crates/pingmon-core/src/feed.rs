use std::collections::HashSet;
use std::sync::Mutex;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::event::TargetEvent;

/// Fan-out bus for target state changes plus the single-use token store used
/// to authenticate dashboard sessions.
///
/// Publishing never waits on subscribers: a session that cannot keep up lags
/// on its own broadcast receiver and is disconnected there, not here.
pub struct SubscriberFeed {
    events: broadcast::Sender<TargetEvent>,
    tokens: Mutex<HashSet<String>>,
}

impl SubscriberFeed {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self {
            events,
            tokens: Mutex::new(HashSet::new()),
        }
    }

    pub fn publish(&self, event: TargetEvent) {
        // Err means no live subscribers, which is fine.
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TargetEvent> {
        self.events.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// Mint an opaque token a client may redeem exactly once.
    pub fn issue_token(&self) -> String {
        let token = Uuid::new_v4().to_string();
        self.tokens.lock().unwrap().insert(token.clone());
        token
    }

    /// Consume a token. Returns false on reuse or mismatch.
    pub fn redeem_token(&self, token: &str) -> bool {
        self.tokens.lock().unwrap().remove(token)
    }
}
