use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::{ActorContext, Verb};
use crate::record::{EntityId, EntityType, Record};

/// Builds the topic for a write, e.g.
/// `salesai-dbevent-saletransaction-deleted`. Reads have no topic.
pub fn event_topic(service: &str, entity: &EntityType, verb: Verb) -> Option<String> {
    let past = verb.past_tense()?;
    Some(format!(
        "{service}-dbevent-{}-{past}",
        entity.as_str().to_lowercase()
    ))
}

/// Notification that a record was created, updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    pub id: Uuid,
    pub topic: String,
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub verb: Verb,
    /// Record state after the write.
    pub payload: Record,
    pub actor: ActorContext,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent {
    /// Builds an event for a committed write, or `None` for reads.
    pub fn for_write(
        service: &str,
        entity_type: &EntityType,
        verb: Verb,
        payload: Record,
        actor: ActorContext,
    ) -> Option<Self> {
        let topic = event_topic(service, entity_type, verb)?;
        Some(Self {
            id: Uuid::new_v4(),
            topic,
            entity_type: entity_type.clone(),
            entity_id: payload.id(),
            verb,
            payload,
            actor,
            occurred_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DataClause;

    #[test]
    fn test_event_topic() {
        let entity = EntityType::new("saleTransaction");
        assert_eq!(
            event_topic("salesai", &entity, Verb::Delete).as_deref(),
            Some("salesai-dbevent-saletransaction-deleted")
        );
        assert_eq!(
            event_topic("salesai", &entity, Verb::Create).as_deref(),
            Some("salesai-dbevent-saletransaction-created")
        );
        assert_eq!(event_topic("salesai", &entity, Verb::Get), None);
    }

    #[test]
    fn test_for_write_carries_record_identity() {
        let record = Record::new(EntityId::new("w1"), DataClause::new().with("name", "Widget"));
        let event = DomainEvent::for_write(
            "shop",
            &EntityType::new("widget"),
            Verb::Update,
            record.clone(),
            ActorContext::user("u1"),
        )
        .unwrap();

        assert_eq!(event.topic, "shop-dbevent-widget-updated");
        assert_eq!(event.entity_id, EntityId::new("w1"));
        assert_eq!(event.payload, record);

        assert!(DomainEvent::for_write(
            "shop",
            &EntityType::new("widget"),
            Verb::List,
            record,
            ActorContext::default(),
        )
        .is_none());
    }

    #[test]
    fn test_event_serializes_camel_case() {
        let record = Record::new(EntityId::new("w1"), DataClause::new());
        let event = DomainEvent::for_write(
            "shop",
            &EntityType::new("widget"),
            Verb::Create,
            record,
            ActorContext::default(),
        )
        .unwrap();
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("entityType").is_some());
        assert!(json.get("occurredAt").is_some());
        let back: DomainEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
