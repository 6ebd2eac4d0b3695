use std::collections::BTreeSet;

use super::{EntityType, SYSTEM_FIELDS};

/// Declarative description of an entity kind.
///
/// Holds only data; behavior hooks live with the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    pub entity_type: EntityType,
    /// Declared user fields. Empty means any field is accepted.
    pub fields: Vec<String>,
    /// Fields that must be present and non-null on create.
    pub required: Vec<String>,
    /// Field groups that must be unique among active rows.
    pub unique: Vec<Vec<String>>,
    /// Field compared with the acting user's id to compute ownership.
    pub owner_field: Option<String>,
    /// Field compared with the acting tenant to scope every query.
    pub tenant_field: Option<String>,
}

impl EntitySchema {
    pub fn new(entity_type: impl Into<EntityType>) -> Self {
        Self {
            entity_type: entity_type.into(),
            fields: Vec::new(),
            required: Vec::new(),
            unique: Vec::new(),
            owner_field: None,
            tenant_field: None,
        }
    }

    /// Returns true if `field` may be written or filtered on.
    pub fn accepts_field(&self, field: &str) -> bool {
        self.fields.is_empty()
            || SYSTEM_FIELDS.contains(&field)
            || self.fields.iter().any(|f| f == field)
    }

    /// All fields a filter may reference, or `None` when unrestricted.
    pub fn filterable_fields(&self) -> Option<BTreeSet<String>> {
        if self.fields.is_empty() {
            return None;
        }

        let mut all: BTreeSet<String> = self.fields.iter().cloned().collect();
        all.extend(SYSTEM_FIELDS.iter().map(|f| f.to_string()));
        Some(all)
    }
}
