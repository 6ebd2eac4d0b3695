use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::RecordError;

pub const ID_FIELD: &str = "id";
pub const ACTIVE_FIELD: &str = "isActive";
pub const CREATED_AT_FIELD: &str = "createdAt";
pub const UPDATED_AT_FIELD: &str = "updatedAt";
pub const VERSION_FIELD: &str = "recordVersion";

/// Fields maintained by the persistence layer rather than by callers.
pub const SYSTEM_FIELDS: [&str; 5] = [
    ID_FIELD,
    ACTIVE_FIELD,
    CREATED_AT_FIELD,
    UPDATED_AT_FIELD,
    VERSION_FIELD,
];

/// Name of a registered entity kind, e.g. `saleTransaction`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(String);

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EntityType {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Opaque record identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A persisted row: a JSON object with a guaranteed `id` and `isActive` flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Builds an active record from a data clause and an id.
    pub fn new(id: EntityId, clause: DataClause) -> Self {
        let mut fields = clause.into_map();
        fields.insert(ID_FIELD.to_string(), Value::String(id.0));
        fields.insert(ACTIVE_FIELD.to_string(), Value::Bool(true));
        Self { fields }
    }

    /// Validates a raw JSON object as a record.
    ///
    /// A missing `isActive` flag defaults to `true`.
    pub fn from_fields(mut fields: Map<String, Value>) -> Result<Self, RecordError> {
        match fields.get(ID_FIELD) {
            Some(Value::String(id)) if id.is_empty() => return Err(RecordError::EmptyId),
            Some(Value::String(_)) => {}
            _ => return Err(RecordError::MissingId),
        }

        match fields.get(ACTIVE_FIELD) {
            None => {
                fields.insert(ACTIVE_FIELD.to_string(), Value::Bool(true));
            }
            Some(Value::Bool(_)) => {}
            Some(_) => return Err(RecordError::InvalidActiveFlag),
        }

        Ok(Self { fields })
    }

    pub fn id(&self) -> EntityId {
        EntityId::new(self.id_str())
    }

    pub fn id_str(&self) -> &str {
        self.fields
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn is_active(&self) -> bool {
        self.fields
            .get(ACTIVE_FIELD)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn set_active(&mut self, active: bool) {
        self.fields
            .insert(ACTIVE_FIELD.to_string(), Value::Bool(active));
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns a field as a string slice, if it is a JSON string.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    pub fn version(&self) -> u64 {
        self.fields
            .get(VERSION_FIELD)
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    /// Merges a data clause into this record. The id is never overwritten.
    pub fn apply(&mut self, clause: &DataClause) {
        for (key, value) in clause.iter() {
            if key == ID_FIELD {
                continue;
            }
            if key == ACTIVE_FIELD && !value.is_boolean() {
                continue;
            }
            self.fields.insert(key.clone(), value.clone());
        }
    }

    /// Stamps creation metadata on a freshly inserted record.
    pub fn stamp_created(&mut self, now: DateTime<Utc>) {
        let ts = Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true));
        self.fields.insert(CREATED_AT_FIELD.to_string(), ts.clone());
        self.fields.insert(UPDATED_AT_FIELD.to_string(), ts);
        self.fields.insert(VERSION_FIELD.to_string(), Value::from(1u64));
    }

    /// Bumps `updatedAt` and `recordVersion` after a mutation.
    pub fn stamp_updated(&mut self, now: DateTime<Utc>) {
        let version = self.version() + 1;
        self.fields.insert(
            UPDATED_AT_FIELD.to_string(),
            Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        self.fields
            .insert(VERSION_FIELD.to_string(), Value::from(version));
    }

    /// Returns true if `owner_field` holds `user_id`.
    pub fn is_owned_by(&self, owner_field: &str, user_id: &str) -> bool {
        self.str_field(owner_field) == Some(user_id)
    }
}

impl TryFrom<Map<String, Value>> for Record {
    type Error = RecordError;

    fn try_from(value: Map<String, Value>) -> Result<Self, Self::Error> {
        Self::from_fields(value)
    }
}

impl TryFrom<Value> for Record {
    type Error = RecordError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Self::from_fields(map),
            _ => Err(RecordError::NotAnObject),
        }
    }
}

impl From<Record> for Map<String, Value> {
    fn from(record: Record) -> Self {
        record.fields
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record.fields)
    }
}

/// Field assignments for an insert or update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataClause(Map<String, Value>);

impl DataClause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    /// Removes and returns the `id` entry when it is a non-empty string.
    pub fn take_id(&mut self) -> Option<EntityId> {
        match self.0.remove(ID_FIELD) {
            Some(Value::String(id)) if !id.is_empty() => Some(EntityId(id)),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl FromIterator<(String, Value)> for DataClause {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl TryFrom<Value> for DataClause {
    type Error = RecordError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(RecordError::NotAnObject),
        }
    }
}
