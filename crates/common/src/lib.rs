//! Shared types for the order fulfillment services.
//!
//! - Identifier newtypes used across crate boundaries
//! - The integration event contract consumed by search sync and notification delivery

pub mod events;
pub mod types;

pub use events::{
    BroadcastPublisher, EventPublisher, IntegrationEvent, NoopPublisher, PublishedEvent,
    RecordingPublisher, Topic,
};
pub use types::{OrderId, ProductId, UserId};
