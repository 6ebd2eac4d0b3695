//! Entity definitions: schema declarations plus per-entity hooks.
//!
//! Every entity runs through the same command lifecycle. What differs per
//! entity is data: the schema, and a handful of optional hook functions.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use entityflow_core::cascade::{edges_for, find_cycles, CascadeEdge, CascadeTrigger};
use entityflow_core::pipeline::{ActorContext, CommandInput, ValidationError, Verb};
use entityflow_core::predicate::Predicate;
use entityflow_core::record::{DataClause, EntitySchema, EntityType, Record, ID_FIELD};

/// Entity-specific checks run after the baseline schema validation.
pub type ValidateHook = Arc<dyn Fn(Verb, &CommandInput) -> Result<(), ValidationError> + Send + Sync>;

/// Maps command input to the fields that get persisted.
pub type DataClauseHook = Arc<dyn Fn(Verb, &CommandInput) -> DataClause + Send + Sync>;

/// Scoping predicate every read and write of the entity is constrained by.
pub type RouteQueryHook = Arc<dyn Fn(&ActorContext) -> Predicate + Send + Sync>;

/// Additional writes performed after a committed write.
pub type ExtraWritesHook = Arc<dyn Fn(&WriteContext<'_>) -> Vec<PlannedWrite> + Send + Sync>;

/// Everything an extra-writes hook may look at.
#[derive(Debug)]
pub struct WriteContext<'a> {
    pub verb: Verb,
    pub entity: &'a EntityType,
    pub actor: &'a ActorContext,
    pub input: &'a CommandInput,
    /// Row before the write. `None` for a create that inserted.
    pub previous: Option<&'a Record>,
    pub current: &'a Record,
    pub clause: &'a DataClause,
}

/// A write to run through the pipeline as part of another command.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedWrite {
    pub verb: Verb,
    pub entity: EntityType,
    pub input: CommandInput,
}

impl PlannedWrite {
    pub fn create(entity: impl Into<EntityType>, input: CommandInput) -> Self {
        Self {
            verb: Verb::Create,
            entity: entity.into(),
            input,
        }
    }
}

#[derive(Clone, Default)]
pub struct EntityHooks {
    pub validate: Option<ValidateHook>,
    pub data_clause: Option<DataClauseHook>,
    pub route_query: Option<RouteQueryHook>,
    pub extra_writes: Option<ExtraWritesHook>,
}

impl fmt::Debug for EntityHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityHooks")
            .field("validate", &self.validate.is_some())
            .field("data_clause", &self.data_clause.is_some())
            .field("route_query", &self.route_query.is_some())
            .field("extra_writes", &self.extra_writes.is_some())
            .finish()
    }
}

/// Schema and hooks for one entity type.
#[derive(Debug, Clone)]
pub struct EntityDefinition {
    pub schema: EntitySchema,
    pub hooks: EntityHooks,
}

impl EntityDefinition {
    pub fn builder(entity_type: impl Into<EntityType>) -> EntityDefinitionBuilder {
        EntityDefinitionBuilder {
            schema: EntitySchema::new(entity_type),
            hooks: EntityHooks::default(),
        }
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.schema.entity_type
    }

    pub fn owner_field(&self) -> Option<&str> {
        self.schema.owner_field.as_deref()
    }

    /// Scoping predicate for the actor.
    ///
    /// Without a hook: `tenant_field = actor.tenant_id` when both are set.
    pub fn route_query(&self, actor: &ActorContext) -> Predicate {
        if let Some(hook) = &self.hooks.route_query {
            return hook(actor);
        }
        match (&self.schema.tenant_field, &actor.tenant_id) {
            (Some(field), Some(tenant)) => Predicate::eq(field.as_str(), tenant.as_str()),
            _ => Predicate::True,
        }
    }

    /// Persisted fields for a write.
    pub fn data_clause(&self, verb: Verb, input: &CommandInput) -> DataClause {
        match &self.hooks.data_clause {
            Some(hook) => hook(verb, input),
            None => default_data_clause(&self.schema, verb, input),
        }
    }

    pub fn validate(&self, verb: Verb, input: &CommandInput) -> Result<(), ValidationError> {
        match &self.hooks.validate {
            Some(hook) => hook(verb, input),
            None => Ok(()),
        }
    }

    pub fn extra_writes(&self, ctx: &WriteContext<'_>) -> Vec<PlannedWrite> {
        match &self.hooks.extra_writes {
            Some(hook) => hook(ctx),
            None => Vec::new(),
        }
    }
}

/// Mapping used when an entity has no data-clause hook.
///
/// Create copies the input data, carries `input.id` over unless the data has
/// its own id, and stamps the actor's tenant into the tenant field when
/// absent. Update copies the data without `id`. Other verbs persist nothing.
pub fn default_data_clause(schema: &EntitySchema, verb: Verb, input: &CommandInput) -> DataClause {
    match verb {
        Verb::Create => {
            let mut clause = DataClause::from_map(input.data.clone());
            if let (Some(id), false) = (&input.id, clause.contains(ID_FIELD)) {
                clause.insert(ID_FIELD, id.as_str());
            }
            if let (Some(field), Some(tenant)) = (&schema.tenant_field, &input.actor.tenant_id) {
                if !clause.contains(field) {
                    clause.insert(field.as_str(), tenant.as_str());
                }
            }
            clause
        }
        Verb::Update => {
            let mut clause = DataClause::from_map(input.data.clone());
            clause.remove(ID_FIELD);
            clause
        }
        Verb::Get | Verb::List | Verb::Delete => DataClause::new(),
    }
}

pub struct EntityDefinitionBuilder {
    schema: EntitySchema,
    hooks: EntityHooks,
}

impl EntityDefinitionBuilder {
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn required<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema.required = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a group of fields that must be unique among active rows.
    pub fn unique<I, S>(mut self, group: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema
            .unique
            .push(group.into_iter().map(Into::into).collect());
        self
    }

    pub fn owner_field(mut self, field: impl Into<String>) -> Self {
        self.schema.owner_field = Some(field.into());
        self
    }

    pub fn tenant_field(mut self, field: impl Into<String>) -> Self {
        self.schema.tenant_field = Some(field.into());
        self
    }

    pub fn validate(
        mut self,
        hook: impl Fn(Verb, &CommandInput) -> Result<(), ValidationError> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.validate = Some(Arc::new(hook));
        self
    }

    pub fn data_clause(
        mut self,
        hook: impl Fn(Verb, &CommandInput) -> DataClause + Send + Sync + 'static,
    ) -> Self {
        self.hooks.data_clause = Some(Arc::new(hook));
        self
    }

    pub fn route_query(
        mut self,
        hook: impl Fn(&ActorContext) -> Predicate + Send + Sync + 'static,
    ) -> Self {
        self.hooks.route_query = Some(Arc::new(hook));
        self
    }

    pub fn extra_writes(
        mut self,
        hook: impl Fn(&WriteContext<'_>) -> Vec<PlannedWrite> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.extra_writes = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> EntityDefinition {
        EntityDefinition {
            schema: self.schema,
            hooks: self.hooks,
        }
    }
}

/// All entity definitions and the cascade edges between them.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    definitions: HashMap<EntityType, Arc<EntityDefinition>>,
    edges: Vec<CascadeEdge>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a definition, replacing any earlier one for the same type.
    pub fn register(mut self, definition: EntityDefinition) -> Self {
        self.definitions
            .insert(definition.entity_type().clone(), Arc::new(definition));
        self
    }

    /// Declares a cascade edge. Cyclic edge sets are accepted but logged.
    pub fn cascade(mut self, edge: CascadeEdge) -> Self {
        self.edges.push(edge);
        for cycle in self.cascade_cycles() {
            let path = cycle
                .iter()
                .map(EntityType::as_str)
                .collect::<Vec<_>>()
                .join(" -> ");
            tracing::warn!(cycle = %path, "Cascade edges form a cycle; revisits will be skipped");
        }
        self
    }

    pub fn get(&self, entity: &EntityType) -> Option<Arc<EntityDefinition>> {
        self.definitions.get(entity).cloned()
    }

    /// Registered entity types, sorted.
    pub fn entity_types(&self) -> Vec<EntityType> {
        let mut types: Vec<EntityType> = self.definitions.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn edges(&self) -> &[CascadeEdge] {
        &self.edges
    }

    /// Edges leaving `parent` that fire on `trigger`.
    pub fn edges_for(&self, parent: &EntityType, trigger: CascadeTrigger) -> Vec<CascadeEdge> {
        edges_for(&self.edges, parent, trigger).cloned().collect()
    }

    pub fn cascade_cycles(&self) -> Vec<Vec<EntityType>> {
        find_cycles(&self.edges)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use entityflow_core::pipeline::FieldViolation;

    use super::*;

    fn transaction() -> EntityDefinition {
        EntityDefinition::builder("saleTransaction")
            .fields(["sellerId", "amount", "storeId"])
            .required(["sellerId", "amount"])
            .tenant_field("storeId")
            .owner_field("sellerId")
            .build()
    }

    #[test]
    fn test_builder_sets_schema() {
        let def = EntityDefinition::builder("storeAssignment")
            .fields(["userId", "storeId"])
            .unique(["userId", "storeId"])
            .build();
        assert_eq!(def.entity_type().as_str(), "storeAssignment");
        assert_eq!(
            def.schema.unique,
            vec![vec!["userId".to_string(), "storeId".to_string()]]
        );
        assert_eq!(def.owner_field(), None);
    }

    #[test]
    fn test_default_route_query_scopes_by_tenant() {
        let def = transaction();
        let scoped = ActorContext::user("u1").with_tenant("s1");
        assert_eq!(def.route_query(&scoped), Predicate::eq("storeId", "s1"));
        assert_eq!(def.route_query(&ActorContext::user("u1")), Predicate::True);
    }

    #[test]
    fn test_route_query_hook_overrides_default() {
        let def = EntityDefinition::builder("store")
            .route_query(|_| Predicate::eq("region", "north"))
            .build();
        assert_eq!(
            def.route_query(&ActorContext::default()),
            Predicate::eq("region", "north")
        );
    }

    #[test]
    fn test_default_data_clause_for_create() {
        let def = transaction();
        let input = CommandInput::new()
            .with_id("t1")
            .with_field("amount", 10)
            .with_actor(ActorContext::user("u1").with_tenant("s1"));

        let clause = def.data_clause(Verb::Create, &input);
        assert_eq!(clause.get("id"), Some(&json!("t1")));
        assert_eq!(clause.get("storeId"), Some(&json!("s1")));
        assert_eq!(clause.get("amount"), Some(&json!(10)));
    }

    #[test]
    fn test_default_data_clause_keeps_explicit_tenant_and_id() {
        let def = transaction();
        let input = CommandInput::new()
            .with_id("t1")
            .with_field("id", "t2")
            .with_field("storeId", "s9")
            .with_actor(ActorContext::user("u1").with_tenant("s1"));

        let clause = def.data_clause(Verb::Create, &input);
        assert_eq!(clause.get("id"), Some(&json!("t2")));
        assert_eq!(clause.get("storeId"), Some(&json!("s9")));
    }

    #[test]
    fn test_default_data_clause_for_update_drops_id() {
        let def = transaction();
        let input = CommandInput::new()
            .with_id("t1")
            .with_field("id", "t1")
            .with_field("amount", 11);
        let clause = def.data_clause(Verb::Update, &input);
        assert!(!clause.contains("id"));
        assert_eq!(clause.len(), 1);
        assert!(def.data_clause(Verb::Delete, &input).is_empty());
    }

    #[test]
    fn test_validate_hook() {
        let def = EntityDefinition::builder("saleTransaction")
            .validate(|verb, input| {
                if verb == Verb::Create && !input.data.contains_key("amount") {
                    return Err(ValidationError::single("amount", "is required"));
                }
                Ok(())
            })
            .build();

        let err = def.validate(Verb::Create, &CommandInput::new()).unwrap_err();
        assert_eq!(err.violations, vec![FieldViolation::new("amount", "is required")]);
        assert!(def.validate(Verb::Delete, &CommandInput::new()).is_ok());
    }

    #[test]
    fn test_registry_lookup_and_edges() {
        let registry = EntityRegistry::new()
            .register(transaction())
            .register(EntityDefinition::builder("saleTransactionHistory").build())
            .cascade(CascadeEdge::soft_delete(
                "saleTransaction",
                "saleTransactionHistory",
                "transactionId",
            ));

        assert!(registry.get(&EntityType::new("saleTransaction")).is_some());
        assert!(registry.get(&EntityType::new("unknown")).is_none());
        assert_eq!(
            registry.entity_types(),
            vec![
                EntityType::new("saleTransaction"),
                EntityType::new("saleTransactionHistory")
            ]
        );

        let parent = EntityType::new("saleTransaction");
        assert_eq!(registry.edges_for(&parent, CascadeTrigger::OnDelete).len(), 1);
        assert!(registry.edges_for(&parent, CascadeTrigger::OnUpdate).is_empty());
        assert!(registry.cascade_cycles().is_empty());
    }

    #[test]
    fn test_registry_reports_cycles() {
        let registry = EntityRegistry::new()
            .cascade(CascadeEdge::soft_delete("a", "b", "aId"))
            .cascade(CascadeEdge::soft_delete("b", "a", "bId"));
        assert_eq!(
            registry.cascade_cycles(),
            vec![vec![EntityType::new("a"), EntityType::new("b")]]
        );
    }
}
