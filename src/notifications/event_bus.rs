//! Event bus for broadcasting notifications to observers
//!
//! Uses a tokio broadcast channel for pub/sub fan-out. Observers receive
//! owned event messages; dropping a subscriber unsubscribes it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::broadcast;

use super::events::{Event, EventMessage};

/// Default channel capacity
const DEFAULT_CAPACITY: usize = 1024;

/// Broadcasts events to all subscribed observers
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventMessage>,
    subscriber_count: Arc<AtomicUsize>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscriber_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: Event) {
        let message = EventMessage::new(event);
        let event_type = message.event.event_type();

        match self.sender.send(message) {
            Ok(count) => {
                debug!("Event published: type={}, subscribers={}", event_type, count);
            }
            Err(_) => {
                // No subscribers - normal when no viewer is connected
                debug!("Event published (no subscribers): type={}", event_type);
            }
        }
    }

    /// Subscribe to receive events
    pub fn subscribe(&self) -> EventSubscriber {
        let receiver = self.sender.subscribe();
        self.subscriber_count.fetch_add(1, Ordering::SeqCst);
        info!(
            "New event subscriber, total: {}",
            self.subscriber_count.load(Ordering::SeqCst)
        );

        EventSubscriber {
            receiver,
            subscriber_count: self.subscriber_count.clone(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count.load(Ordering::SeqCst)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer handle receiving events from the bus
pub struct EventSubscriber {
    receiver: broadcast::Receiver<EventMessage>,
    subscriber_count: Arc<AtomicUsize>,
}

impl EventSubscriber {
    /// Receive the next event; None when the bus is gone
    pub async fn recv(&mut self) -> Option<EventMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(msg) => return Some(msg),
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!("Subscriber lagged, {} events missed", count);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for EventSubscriber {
    fn drop(&mut self) {
        let prev = self.subscriber_count.fetch_sub(1, Ordering::SeqCst);
        info!("Event subscriber disconnected, remaining: {}", prev - 1);
    }
}

/// Shared event bus type
pub type SharedEventBus = Arc<EventBus>;

pub fn create_event_bus() -> SharedEventBus {
    Arc::new(EventBus::new())
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::events::SyncFailedEvent;
    use chrono::Utc;

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus = EventBus::new();
        let mut subscriber = bus.subscribe();

        bus.publish(Event::SyncFailed(SyncFailedEvent {
            reason: "auth".into(),
            timestamp: Utc::now(),
        }));

        let received =
            tokio::time::timeout(std::time::Duration::from_millis(100), subscriber.recv())
                .await
                .expect("timeout")
                .expect("no message");
        assert_eq!(received.event.event_type(), "sync_failed");
    }

    #[test]
    fn subscriber_count_tracks_drops() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);

        let sub1 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(sub1);
        assert_eq!(bus.subscriber_count(), 1);
    }
}
