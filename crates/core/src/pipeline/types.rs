use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::predicate::FilterExpr;
use crate::query::{ListResult, Pagination, Sort};
use crate::record::{EntityId, EntityType, Record};

/// Command verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Create,
    Get,
    List,
    Update,
    Delete,
}

impl Verb {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Get => "get",
            Self::List => "list",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub const fn is_write(self) -> bool {
        matches!(self, Self::Create | Self::Update | Self::Delete)
    }

    /// Past tense used in event topics. Reads have none.
    pub const fn past_tense(self) -> Option<&'static str> {
        match self {
            Self::Create => Some("created"),
            Self::Update => Some("updated"),
            Self::Delete => Some("deleted"),
            Self::Get | Self::List => None,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "get" => Ok(Self::Get),
            "list" => Ok(Self::List),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(format!("unknown verb: {other}")),
        }
    }
}

/// Who is acting and on whose behalf.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorContext {
    pub user_id: Option<String>,
    pub tenant_id: Option<String>,
    pub request_id: Option<String>,
}

impl ActorContext {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Same principal without tenant scoping, used for cascaded work that must
    /// reach every dependent row.
    pub fn unscoped(&self) -> Self {
        Self {
            tenant_id: None,
            ..self.clone()
        }
    }
}

/// Everything a caller supplies for one command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommandInput {
    pub id: Option<EntityId>,
    pub data: Map<String, Value>,
    pub filter: Option<FilterExpr>,
    pub pagination: Option<Pagination>,
    pub sort: Vec<Sort>,
    pub include_inactive: bool,
    pub actor: ActorContext,
}

impl CommandInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<EntityId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// Adds a single data field.
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(field.into(), value.into());
        self
    }

    pub fn with_filter(mut self, filter: FilterExpr) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn with_sort(mut self, sort: Vec<Sort>) -> Self {
        self.sort = sort;
        self
    }

    pub fn including_inactive(mut self) -> Self {
        self.include_inactive = true;
        self
    }

    pub fn with_actor(mut self, actor: ActorContext) -> Self {
        self.actor = actor;
        self
    }
}

/// Primary result of a command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandResult {
    Record(Record),
    List(ListResult),
}

/// What a command hands back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    pub verb: Verb,
    pub entity_type: EntityType,
    pub result: CommandResult,
    pub is_owner: bool,
    /// Records written by aggregated writes, in execution order.
    pub aggregated: Vec<Record>,
}

impl CommandOutput {
    pub fn record(&self) -> Option<&Record> {
        match &self.result {
            CommandResult::Record(record) => Some(record),
            CommandResult::List(_) => None,
        }
    }

    pub fn list(&self) -> Option<&ListResult> {
        match &self.result {
            CommandResult::List(list) => Some(list),
            CommandResult::Record(_) => None,
        }
    }

    pub fn into_record(self) -> Option<Record> {
        match self.result {
            CommandResult::Record(record) => Some(record),
            CommandResult::List(_) => None,
        }
    }
}

/// Computes the ownership flag for a record.
///
/// False when the entity declares no owner field or the actor is anonymous.
pub fn is_owner(record: &Record, owner_field: Option<&str>, actor: &ActorContext) -> bool {
    match (owner_field, actor.user_id.as_deref()) {
        (Some(field), Some(user)) => record.is_owned_by(field, user),
        _ => false,
    }
}

/// Ownership for a list: true only when every item is owned and the list is
/// not empty.
pub fn is_owner_of_all(records: &[Record], owner_field: Option<&str>, actor: &ActorContext) -> bool {
    !records.is_empty() && records.iter().all(|r| is_owner(r, owner_field, actor))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::record::DataClause;

    fn owned(id: &str, seller: &str) -> Record {
        Record::new(EntityId::new(id), DataClause::new().with("sellerId", seller))
    }

    #[test]
    fn test_verb_parse_and_display() {
        assert_eq!("UPDATE".parse::<Verb>().unwrap(), Verb::Update);
        assert_eq!(Verb::Delete.to_string(), "delete");
        assert!("purge".parse::<Verb>().is_err());
    }

    #[test]
    fn test_verb_past_tense() {
        assert_eq!(Verb::Create.past_tense(), Some("created"));
        assert_eq!(Verb::Delete.past_tense(), Some("deleted"));
        assert_eq!(Verb::List.past_tense(), None);
        assert!(Verb::Update.is_write());
        assert!(!Verb::Get.is_write());
    }

    #[test]
    fn test_unscoped_actor_drops_tenant() {
        let actor = ActorContext::user("u1")
            .with_tenant("s1")
            .with_request_id("r1");
        let unscoped = actor.unscoped();
        assert_eq!(unscoped.user_id.as_deref(), Some("u1"));
        assert_eq!(unscoped.request_id.as_deref(), Some("r1"));
        assert_eq!(unscoped.tenant_id, None);
    }

    #[test]
    fn test_is_owner() {
        let record = owned("t1", "u1");
        assert!(is_owner(&record, Some("sellerId"), &ActorContext::user("u1")));
        assert!(!is_owner(&record, Some("sellerId"), &ActorContext::user("u2")));
        assert!(!is_owner(&record, None, &ActorContext::user("u1")));
        assert!(!is_owner(&record, Some("sellerId"), &ActorContext::default()));
    }

    #[test]
    fn test_is_owner_of_all() {
        let actor = ActorContext::user("u1");
        let mine = vec![owned("a", "u1"), owned("b", "u1")];
        let mixed = vec![owned("a", "u1"), owned("b", "u2")];
        assert!(is_owner_of_all(&mine, Some("sellerId"), &actor));
        assert!(!is_owner_of_all(&mixed, Some("sellerId"), &actor));
        assert!(!is_owner_of_all(&[], Some("sellerId"), &actor));
    }

    #[test]
    fn test_command_input_deserializes_with_defaults() {
        let input: CommandInput = serde_json::from_value(json!({
            "id": "t1",
            "data": {"status": "corrected"},
            "actor": {"userId": "u1"}
        }))
        .unwrap();
        assert_eq!(input.id, Some(EntityId::new("t1")));
        assert_eq!(input.data.get("status"), Some(&json!("corrected")));
        assert_eq!(input.actor.user_id.as_deref(), Some("u1"));
        assert!(!input.include_inactive);
        assert!(input.sort.is_empty());
    }

    #[test]
    fn test_command_output_serializes_flat_result() {
        let output = CommandOutput {
            verb: Verb::Get,
            entity_type: EntityType::new("saleTransaction"),
            result: CommandResult::Record(owned("t1", "u1")),
            is_owner: true,
            aggregated: vec![],
        };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["result"]["id"], json!("t1"));
        assert_eq!(json["isOwner"], json!(true));
        assert_eq!(json["entityType"], json!("saleTransaction"));
    }
}
