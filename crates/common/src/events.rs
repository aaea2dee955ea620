//! Integration events published to downstream consumers.
//!
//! Publishing is fire-and-forget: the publisher never waits for delivery
//! confirmation, and an event with no live subscriber is dropped
//! (at-most-once). Saga correctness never depends on delivery.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{OrderId, ProductId, UserId};

/// Channel an integration event is published on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Stock level changes, consumed by search-index sync.
    InventoryUpdates,
    /// User and admin notifications (new orders).
    Notifications,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::InventoryUpdates => "inventory_updates",
            Topic::Notifications => "notifications",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payload of an integration event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntegrationEvent {
    /// A stock record changed.
    InventoryUpdate {
        product_id: ProductId,
        available: bool,
        stock: u32,
    },
    /// An order finished its saga and was paid.
    NewOrder {
        order_id: OrderId,
        user_id: UserId,
        amount_cents: i64,
    },
}

impl IntegrationEvent {
    /// Builds an inventory update for the remaining stock of a product.
    pub fn inventory_update(product_id: ProductId, stock: u32) -> Self {
        IntegrationEvent::InventoryUpdate {
            product_id,
            available: stock > 0,
            stock,
        }
    }

    /// The topic this kind of event is normally published on.
    pub fn topic(&self) -> Topic {
        match self {
            IntegrationEvent::InventoryUpdate { .. } => Topic::InventoryUpdates,
            IntegrationEvent::NewOrder { .. } => Topic::Notifications,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            IntegrationEvent::InventoryUpdate { .. } => "inventory_update",
            IntegrationEvent::NewOrder { .. } => "new_order",
        }
    }
}

/// An event together with the topic it was published on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedEvent {
    pub topic: Topic,
    pub event: IntegrationEvent,
}

/// Fire-and-forget publisher.
pub trait EventPublisher: Send + Sync {
    /// Publishes an event. Never blocks and never reports delivery failure.
    fn publish(&self, topic: Topic, event: IntegrationEvent);
}

/// Fans each event out to every live subscriber over a tokio broadcast channel.
///
/// Slow subscribers that fall more than `capacity` events behind observe a
/// `Lagged` error on their receiver and skip ahead.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

impl BroadcastPublisher {
    /// Creates a publisher whose channel buffers up to `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Registers a new subscriber. Only events published afterwards are received.
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, topic: Topic, event: IntegrationEvent) {
        let event_type = event.event_type();
        match self.sender.send(PublishedEvent { topic, event }) {
            Ok(receivers) => {
                tracing::debug!(%topic, event_type, receivers, "event published");
            }
            Err(_) => {
                tracing::debug!(%topic, event_type, "no subscribers, event dropped");
            }
        }
    }
}

/// Publisher that keeps every event in memory, for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    events: Arc<Mutex<Vec<PublishedEvent>>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every event published so far, in publish order.
    pub fn events(&self) -> Vec<PublishedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the events published on one topic.
    pub fn events_on(&self, topic: Topic) -> Vec<IntegrationEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.topic == topic)
            .map(|e| e.event)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, topic: Topic, event: IntegrationEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PublishedEvent { topic, event });
    }
}

/// Publisher that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _topic: Topic, _event: IntegrationEvent) {}
}
