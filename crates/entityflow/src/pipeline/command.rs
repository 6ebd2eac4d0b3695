//! One command execution.
//!
//! `validate -> build -> persist -> invalidate -> reindex -> cascade ->
//! aggregated writes -> publish`. Only validation and persistence can fail
//! the command; every later step reports to the [`Reporter`] and moves on.
//!
//! [`Reporter`]: entityflow_core::pipeline::Reporter

use std::sync::Arc;

use entityflow_core::cache::QueryKind;
use entityflow_core::cascade::CascadeTrigger;
use entityflow_core::events::DomainEvent;
use entityflow_core::pipeline::{
    is_owner, is_owner_of_all, validate_input, CommandError, CommandInput, CommandOutput,
    CommandResult, DependencyError, Step, ValidationError, Verb,
};
use entityflow_core::predicate::{compile, normalize, Predicate};
use entityflow_core::query::{ListQuery, ListResult};
use entityflow_core::record::{DataClause, EntityId, EntityType, Record, ID_FIELD};

use crate::cascade::CascadeSynchronizer;
use crate::query_cache::Lookup;
use crate::storage::Mutation;

use super::jobs::{CascadeJob, PublishJob, ReindexJob};
use super::{EntityDefinition, Pipeline, Scope, WriteContext};

pub(crate) struct EntityCommand {
    pipeline: Pipeline,
    definition: Arc<EntityDefinition>,
    verb: Verb,
    input: CommandInput,
    scope: Scope,
}

impl EntityCommand {
    pub(crate) fn new(
        pipeline: Pipeline,
        definition: Arc<EntityDefinition>,
        verb: Verb,
        input: CommandInput,
        scope: Scope,
    ) -> Self {
        Self {
            pipeline,
            definition,
            verb,
            input,
            scope,
        }
    }

    fn entity(&self) -> &EntityType {
        self.definition.entity_type()
    }

    pub(crate) async fn execute(self) -> Result<CommandOutput, CommandError> {
        tracing::debug!(
            entity_type = %self.entity(),
            entity_id = ?self.input.id,
            verb = %self.verb,
            "Executing command"
        );

        self.validate()?;

        match self.verb {
            Verb::Get => self.get().await,
            Verb::List => self.list().await,
            Verb::Create | Verb::Update | Verb::Delete => self.write().await,
        }
    }

    fn validate(&self) -> Result<(), CommandError> {
        validate_input(
            self.verb,
            self.input.id.as_ref().map(EntityId::as_str),
            &self.input.data,
            &self.definition.schema,
        )?;
        self.definition.validate(self.verb, &self.input)?;
        Ok(())
    }

    fn required_id(&self) -> Result<&EntityId, CommandError> {
        self.input
            .id
            .as_ref()
            .ok_or_else(|| ValidationError::single(ID_FIELD, "is required").into())
    }

    /// Route scoping AND the caller's filter, narrowed to the id if given.
    fn read_predicate(&self) -> Result<Predicate, CommandError> {
        let route = self.definition.route_query(&self.input.actor);
        let fields = self.definition.schema.filterable_fields();
        let predicate = compile(route, self.input.filter.as_ref(), fields.as_ref())?;

        Ok(match &self.input.id {
            Some(id) => normalize(Predicate::and(vec![
                Predicate::by_id(id.as_str()),
                predicate,
            ])),
            None => predicate,
        })
    }

    /// Route scoping AND the target id. Caller filters never widen a write.
    fn write_predicate(&self) -> Result<Predicate, CommandError> {
        let id = self.required_id()?;
        let route = self.definition.route_query(&self.input.actor);
        Ok(normalize(Predicate::and(vec![
            Predicate::by_id(id.as_str()),
            route,
        ])))
    }

    fn read_fingerprint(&self, base: String) -> String {
        format!("{base}|inactive={}", self.input.include_inactive)
    }

    fn output(&self, result: CommandResult, is_owner: bool, aggregated: Vec<Record>) -> CommandOutput {
        CommandOutput {
            verb: self.verb,
            entity_type: self.entity().clone(),
            result,
            is_owner,
            aggregated,
        }
    }

    async fn get(&self) -> Result<CommandOutput, CommandError> {
        let entity = self.entity();
        let predicate = self.read_predicate()?;
        let include_inactive = self.input.include_inactive;
        let fingerprint = self.read_fingerprint(predicate.fingerprint());
        let adapter = self.pipeline.adapter();
        let cache = self.pipeline.query_cache();

        let record = match cache
            .lookup::<Record>(entity, QueryKind::Get, &fingerprint)
            .await
        {
            Lookup::Hit(record) => record,
            Lookup::Miss(slot) => {
                let record = adapter.get(entity, &predicate, include_inactive).await?;
                cache.populate(slot, &record).await;
                record
            }
            Lookup::Bypass => adapter.get(entity, &predicate, include_inactive).await?,
        };

        let owned = is_owner(&record, self.definition.owner_field(), &self.input.actor);
        Ok(self.output(CommandResult::Record(record), owned, Vec::new()))
    }

    async fn list(&self) -> Result<CommandOutput, CommandError> {
        let entity = self.entity();
        let query = ListQuery::new(self.read_predicate()?)
            .with_pagination(self.input.pagination)
            .with_sort(self.input.sort.clone());
        let include_inactive = self.input.include_inactive;
        let fingerprint = self.read_fingerprint(query.fingerprint());
        let adapter = self.pipeline.adapter();
        let cache = self.pipeline.query_cache();

        let result = match cache
            .lookup::<ListResult>(entity, QueryKind::List, &fingerprint)
            .await
        {
            Lookup::Hit(result) => result,
            Lookup::Miss(slot) => {
                let result = adapter.list(entity, query, include_inactive).await?;
                cache.populate(slot, &result).await;
                result
            }
            Lookup::Bypass => adapter.list(entity, query, include_inactive).await?,
        };

        let owned = is_owner_of_all(
            &result.items,
            self.definition.owner_field(),
            &self.input.actor,
        );
        Ok(self.output(CommandResult::List(result), owned, Vec::new()))
    }

    async fn write(&self) -> Result<CommandOutput, CommandError> {
        let clause = self.definition.data_clause(self.verb, &self.input);
        let mutation = self.persist(&clause).await?;

        tracing::debug!(
            entity_type = %self.entity(),
            entity_id = %mutation.current.id(),
            verb = %self.verb,
            revived = self.verb == Verb::Create && mutation.previous.is_some(),
            "Write committed"
        );

        self.after_commit(mutation, clause).await
    }

    async fn persist(&self, clause: &DataClause) -> Result<Mutation, CommandError> {
        let adapter = self.pipeline.adapter();
        let schema = &self.definition.schema;

        let mutation = match self.verb {
            Verb::Create => adapter.create(schema, clause.clone()).await?,
            Verb::Update => {
                adapter
                    .update(schema, &self.write_predicate()?, clause)
                    .await?
            }
            Verb::Delete => {
                adapter
                    .soft_delete(&schema.entity_type, &self.write_predicate()?)
                    .await?
            }
            Verb::Get | Verb::List => {
                return Err(ValidationError::single("verb", "is not a write").into())
            }
        };
        Ok(mutation)
    }

    async fn after_commit(
        &self,
        mutation: Mutation,
        clause: DataClause,
    ) -> Result<CommandOutput, CommandError> {
        let entity = self.entity();
        let verb = self.verb;
        let actor = &self.input.actor;
        let record = mutation.current.clone();
        let mode = self.scope.mode();

        if let Err(err) = self.pipeline.query_cache().invalidate(entity).await {
            self.pipeline.report(&DependencyError::new(
                Step::CacheInvalidate,
                entity.clone(),
                record.id(),
                verb,
                err,
            ));
        }

        let reindex = ReindexJob::new(self.pipeline.search_index(), entity, verb, record.clone());
        self.pipeline.dispatch(Box::new(reindex), mode).await;

        let cascades = CascadeTrigger::for_verb(verb)
            .map(|trigger| !self.pipeline.registry().edges_for(entity, trigger).is_empty())
            .unwrap_or(false);
        if cascades {
            let cascade = CascadeJob::new(
                CascadeSynchronizer::new(self.pipeline.clone()),
                entity,
                verb,
                &record,
                actor.clone(),
                self.scope.nested(),
            );
            self.pipeline.dispatch(Box::new(cascade), mode).await;
        }

        let aggregated = self.aggregated_writes(&mutation, &clause).await;

        if let Some(event) = DomainEvent::for_write(
            self.pipeline.service(),
            entity,
            verb,
            record.clone(),
            actor.clone(),
        ) {
            let publish = PublishJob::new(self.pipeline.event_bus(), event);
            self.pipeline.dispatch(Box::new(publish), mode).await;
        }

        let owned = is_owner(&record, self.definition.owner_field(), actor);
        Ok(self.output(CommandResult::Record(record), owned, aggregated))
    }

    /// Runs the entity's extra writes in order through the pipeline.
    async fn aggregated_writes(&self, mutation: &Mutation, clause: &DataClause) -> Vec<Record> {
        let planned = self.definition.extra_writes(&WriteContext {
            verb: self.verb,
            entity: self.entity(),
            actor: &self.input.actor,
            input: &self.input,
            previous: mutation.previous.as_ref(),
            current: &mutation.current,
            clause,
        });

        let mut written = Vec::with_capacity(planned.len());
        for write in planned {
            let target = format!("{} {}", write.verb, write.entity);
            let result = self
                .pipeline
                .run(write.verb, write.entity, write.input, self.scope.clone())
                .await;

            match result {
                Ok(output) => written.extend(output.into_record()),
                Err(err) => self.pipeline.report(&DependencyError::new(
                    Step::AggregatedWrite,
                    self.entity().clone(),
                    mutation.current.id(),
                    self.verb,
                    format!("{target}: {err}"),
                )),
            }
        }
        written
    }
}
