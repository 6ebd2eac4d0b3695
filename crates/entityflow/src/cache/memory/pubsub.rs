//! In-memory event bus backed by one broadcast channel per entity type.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

use entityflow_core::events::{DomainEvent, EventBus, Result};
use entityflow_core::record::EntityType;

/// Channel capacity for pub/sub messages.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct MemoryEventBus {
    channels: Arc<RwLock<HashMap<EntityType, broadcast::Sender<DomainEvent>>>>,
}

impl MemoryEventBus {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn channel(&self, entity: &EntityType) -> broadcast::Sender<DomainEvent> {
        {
            let channels = self.channels.read().await;
            if let Some(sender) = channels.get(entity) {
                return sender.clone();
            }
        }

        let mut channels = self.channels.write().await;
        channels
            .entry(entity.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

impl Default for MemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for MemoryEventBus {
    async fn publish(&self, event: &DomainEvent) -> Result<()> {
        let sender = self.channel(&event.entity_type).await;
        // No receivers just means nobody is listening.
        let _ = sender.send(event.clone());
        Ok(())
    }

    async fn subscribe(&self, entity: &EntityType) -> Result<broadcast::Receiver<DomainEvent>> {
        Ok(self.channel(entity).await.subscribe())
    }
}
