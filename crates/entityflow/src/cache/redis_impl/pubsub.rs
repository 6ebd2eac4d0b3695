//! Redis event bus.
//!
//! Events are published as JSON on one channel per entity type. Each local
//! subscription spawns a forwarding task feeding a broadcast channel.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::AsyncCommands;
use tokio::sync::{broadcast, RwLock};

use entityflow_core::events::{DomainEvent, EventBus, EventError, Result};
use entityflow_core::record::EntityType;

use super::error::map_redis_event_error;

const CHANNEL_CAPACITY: usize = 256;

type Subscriptions = Arc<RwLock<HashMap<EntityType, broadcast::Sender<DomainEvent>>>>;

fn channel_name(entity: &EntityType) -> String {
    format!("events:{entity}")
}

pub struct RedisEventBus {
    client: redis::Client,
    subscriptions: Subscriptions,
}

impl RedisEventBus {
    /// Connects to Redis and verifies the connection.
    pub async fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(map_redis_event_error)?;
        let _ = client
            .get_multiplexed_async_connection()
            .await
            .map_err(map_redis_event_error)?;

        Ok(Self {
            client,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
        })
    }
}

#[async_trait]
impl EventBus for RedisEventBus {
    async fn publish(&self, event: &DomainEvent) -> Result<()> {
        let payload =
            serde_json::to_string(event).map_err(|e| EventError::Serialization(e.to_string()))?;

        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(map_redis_event_error)?;

        conn.publish::<_, _, ()>(channel_name(&event.entity_type), &payload)
            .await
            .map_err(|e| EventError::PublishFailed(e.to_string()))?;

        Ok(())
    }

    async fn subscribe(&self, entity: &EntityType) -> Result<broadcast::Receiver<DomainEvent>> {
        {
            let subscriptions = self.subscriptions.read().await;
            if let Some(sender) = subscriptions.get(entity) {
                return Ok(sender.subscribe());
            }
        }

        let (tx, rx) = broadcast::channel(CHANNEL_CAPACITY);
        {
            let mut subscriptions = self.subscriptions.write().await;
            if let Some(sender) = subscriptions.get(entity) {
                return Ok(sender.subscribe());
            }
            subscriptions.insert(entity.clone(), tx.clone());
        }

        let client = self.client.clone();
        let subscriptions = Arc::clone(&self.subscriptions);
        let entity = entity.clone();

        tokio::spawn(async move {
            if let Err(e) = forward_messages(client, &entity, tx, &subscriptions).await {
                tracing::error!(entity = %entity, error = %e, "Redis subscription failed");
                subscriptions.write().await.remove(&entity);
            }
        });

        Ok(rx)
    }
}

async fn forward_messages(
    client: redis::Client,
    entity: &EntityType,
    tx: broadcast::Sender<DomainEvent>,
    subscriptions: &Subscriptions,
) -> Result<()> {
    let mut pubsub = client
        .get_async_pubsub()
        .await
        .map_err(map_redis_event_error)?;
    pubsub
        .subscribe(channel_name(entity))
        .await
        .map_err(map_redis_event_error)?;

    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let payload: String = match msg.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(entity = %entity, error = %e, "Unreadable event payload");
                continue;
            }
        };

        match serde_json::from_str::<DomainEvent>(&payload) {
            Ok(event) => {
                let _ = tx.send(event);
            }
            Err(e) => {
                tracing::warn!(entity = %entity, error = %e, "Failed to deserialize domain event");
            }
        }
    }

    tracing::info!(entity = %entity, "Redis subscription stream ended");
    subscriptions.write().await.remove(entity);
    Ok(())
}
