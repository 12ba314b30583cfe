//! Per-user "expense changed" fan-out
//!
//! Delivery is at-most-once and fire-and-forget. Nothing is queued for users
//! without a live subscriber; clients re-fetch on every event.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// Per-user channel capacity; slower receivers see `Lagged`
pub const CHANNEL_CAPACITY: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExpenseEvent {
    Created { id: i64 },
    Deleted { id: i64 },
}

/// Publish/subscribe registry keyed by user id
#[derive(Clone, Default)]
pub struct Notifier {
    channels: Arc<RwLock<HashMap<i64, broadcast::Sender<ExpenseEvent>>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event published for `user_id` from now on
    ///
    /// Channels whose subscribers have all gone away are dropped here too,
    /// so users who disconnect without ever publishing do not linger.
    pub fn subscribe(&self, user_id: i64) -> broadcast::Receiver<ExpenseEvent> {
        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        channels.retain(|_, sender| sender.receiver_count() > 0);
        channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Send an event to the user's live subscribers, if any
    ///
    /// Returns the number of receivers reached. A channel with no receivers
    /// left is dropped.
    pub fn publish(&self, user_id: i64, event: ExpenseEvent) -> usize {
        let sender = {
            let channels = self
                .channels
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match channels.get(&user_id) {
                Some(sender) => sender.clone(),
                None => return 0,
            }
        };

        match sender.send(event) {
            Ok(reached) => {
                debug!(user_id, reached, "Published expense event");
                reached
            }
            Err(_) => {
                let mut channels = self
                    .channels
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                if channels
                    .get(&user_id)
                    .is_some_and(|s| s.receiver_count() == 0)
                {
                    channels.remove(&user_id);
                }
                0
            }
        }
    }

    /// Number of users with an open channel
    pub fn channel_count(&self) -> usize {
        self.channels
            .read()
            .map(|c| c.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_own_events_only() {
        let notifier = Notifier::new();
        let mut alice = notifier.subscribe(1);
        let mut bob = notifier.subscribe(2);

        assert_eq!(notifier.publish(1, ExpenseEvent::Created { id: 10 }), 1);

        assert_eq!(alice.recv().await.unwrap(), ExpenseEvent::Created { id: 10 });
        assert!(matches!(
            bob.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let notifier = Notifier::new();
        assert_eq!(notifier.publish(7, ExpenseEvent::Deleted { id: 1 }), 0);
        assert_eq!(notifier.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_subscribers_are_pruned() {
        let notifier = Notifier::new();
        let rx = notifier.subscribe(3);
        assert_eq!(notifier.channel_count(), 1);
        drop(rx);

        assert_eq!(notifier.publish(3, ExpenseEvent::Created { id: 1 }), 0);
        assert_eq!(notifier.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_idle_channels_pruned_on_subscribe() {
        let notifier = Notifier::new();
        for user_id in 1..=3 {
            drop(notifier.subscribe(user_id));
        }
        // Only the most recent closed channel survives until the next subscribe
        assert_eq!(notifier.channel_count(), 1);

        let _live = notifier.subscribe(4);
        assert_eq!(notifier.channel_count(), 1);

        let _second = notifier.subscribe(5);
        assert_eq!(notifier.channel_count(), 2);
    }

    #[tokio::test]
    async fn test_multiple_tabs_each_receive() {
        let notifier = Notifier::new();
        let mut first = notifier.subscribe(5);
        let mut second = notifier.subscribe(5);

        assert_eq!(notifier.publish(5, ExpenseEvent::Deleted { id: 9 }), 2);
        assert_eq!(first.recv().await.unwrap(), ExpenseEvent::Deleted { id: 9 });
        assert_eq!(second.recv().await.unwrap(), ExpenseEvent::Deleted { id: 9 });
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(ExpenseEvent::Created { id: 4 }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "created", "id": 4}));
    }
}
