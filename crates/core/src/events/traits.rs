use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::record::EntityType;

use super::{DomainEvent, Result};

/// Publishes domain events and hands out per-entity-type subscriptions.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publishes an event to subscribers of its entity type.
    ///
    /// Publishing with no subscribers is not an error.
    async fn publish(&self, event: &DomainEvent) -> Result<()>;

    /// Subscribes to events for one entity type.
    async fn subscribe(&self, entity: &EntityType) -> Result<broadcast::Receiver<DomainEvent>>;
}
