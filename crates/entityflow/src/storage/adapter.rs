//! Persistence adapter.
//!
//! Layers the record lifecycle on top of a `RecordStore` driver:
//! create-or-revive, soft deletion, composite uniqueness among active rows,
//! metadata stamping and a per-call timeout.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;

use entityflow_core::predicate::{active_scope, Predicate};
use entityflow_core::query::{ListQuery, ListResult, Pagination, Sort};
use entityflow_core::record::{
    DataClause, EntityId, EntitySchema, EntityType, Record, ACTIVE_FIELD, ID_FIELD,
};
use entityflow_core::storage::{RecordStore, RepositoryError, Result};

/// Outcome of a write: the row before and after it.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    /// `None` when a create inserted a brand new row.
    pub previous: Option<Record>,
    pub current: Record,
}

/// Executes create/read/update/soft-delete for any entity type.
#[derive(Clone)]
pub struct PersistenceAdapter {
    store: Arc<dyn RecordStore>,
    timeout: Duration,
}

impl PersistenceAdapter {
    pub fn new(store: Arc<dyn RecordStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    async fn guarded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RepositoryError::Timeout(self.timeout.as_millis() as u64)),
        }
    }

    /// Creates a record, or revives the existing row when the clause carries
    /// an id that is already taken (active or not).
    pub async fn create(&self, schema: &EntitySchema, mut clause: DataClause) -> Result<Mutation> {
        let entity = &schema.entity_type;
        let id = clause.take_id().unwrap_or_else(EntityId::generate);
        let now = Utc::now();

        match self.guarded(self.store.fetch(entity, &id)).await? {
            Some(previous) => {
                let mut current = previous.clone();
                current.apply(&clause);
                current.set_active(true);
                current.stamp_updated(now);
                self.check_unique(schema, &current).await?;
                self.guarded(self.store.replace(entity, &current)).await?;

                tracing::debug!(
                    entity_type = %entity,
                    entity_id = %id,
                    was_active = previous.is_active(),
                    "Create matched an existing row; revived"
                );
                Ok(Mutation {
                    previous: Some(previous),
                    current,
                })
            }
            None => {
                let mut current = Record::new(id, clause);
                current.stamp_created(now);
                self.check_unique(schema, &current).await?;
                self.guarded(self.store.insert(entity, &current)).await?;
                Ok(Mutation {
                    previous: None,
                    current,
                })
            }
        }
    }

    /// Returns the first row matching `predicate`.
    ///
    /// Id lookups go straight to the driver's keyed fetch.
    pub async fn get(
        &self,
        entity: &EntityType,
        predicate: &Predicate,
        include_inactive: bool,
    ) -> Result<Record> {
        let scoped = active_scope(predicate.clone(), include_inactive);

        let found = match predicate.lookup_id() {
            Some(id) => self
                .guarded(self.store.fetch(entity, &EntityId::new(id)))
                .await?
                .filter(|record| scoped.matches(record)),
            None => {
                let query = ListQuery::new(scoped).with_pagination(Some(Pagination::new(1, 1)));
                self.guarded(self.store.select(entity, &query))
                    .await?
                    .items
                    .into_iter()
                    .next()
            }
        };

        found.ok_or_else(|| RepositoryError::NotFound {
            entity_type: entity.to_string(),
            id: predicate.lookup_id().unwrap_or("<query>").to_string(),
        })
    }

    /// Lists matching rows with the total match count.
    pub async fn list(
        &self,
        entity: &EntityType,
        query: ListQuery,
        include_inactive: bool,
    ) -> Result<ListResult> {
        let query = ListQuery {
            predicate: active_scope(query.predicate, include_inactive),
            ..query
        };
        self.guarded(self.store.select(entity, &query)).await
    }

    /// Applies `clause` to the single active row matching `predicate`.
    pub async fn update(
        &self,
        schema: &EntitySchema,
        predicate: &Predicate,
        clause: &DataClause,
    ) -> Result<Mutation> {
        let entity = &schema.entity_type;
        let previous = self.get(entity, predicate, false).await?;

        let mut current = previous.clone();
        current.apply(clause);
        current.stamp_updated(Utc::now());
        self.check_unique(schema, &current).await?;
        self.guarded(self.store.replace(entity, &current)).await?;

        Ok(Mutation {
            previous: Some(previous),
            current,
        })
    }

    /// Marks the single active row matching `predicate` inactive.
    pub async fn soft_delete(&self, entity: &EntityType, predicate: &Predicate) -> Result<Mutation> {
        let previous = self.get(entity, predicate, false).await?;

        let mut current = previous.clone();
        current.set_active(false);
        current.stamp_updated(Utc::now());
        self.guarded(self.store.replace(entity, &current)).await?;

        Ok(Mutation {
            previous: Some(previous),
            current,
        })
    }

    /// Ids of active rows whose `field` equals `value`.
    pub async fn ids_by_field(
        &self,
        entity: &EntityType,
        field: &str,
        value: &Value,
    ) -> Result<Vec<EntityId>> {
        let query = ListQuery::new(active_scope(Predicate::eq(field, value.clone()), false))
            .with_sort(vec![Sort::asc(ID_FIELD)]);
        let result = self.guarded(self.store.select(entity, &query)).await?;
        Ok(result.items.iter().map(Record::id).collect())
    }

    /// One page of active rows in id order.
    pub async fn active_page(
        &self,
        entity: &EntityType,
        pagination: Pagination,
    ) -> Result<ListResult> {
        let query = ListQuery::new(Predicate::eq(ACTIVE_FIELD, true))
            .with_sort(vec![Sort::asc(ID_FIELD)])
            .with_pagination(Some(pagination));
        self.guarded(self.store.select(entity, &query)).await
    }

    /// Fails with `Conflict` when another active row shares a unique group.
    ///
    /// Groups with a missing or null member are not enforced. The check and
    /// the following write are not atomic.
    async fn check_unique(&self, schema: &EntitySchema, record: &Record) -> Result<()> {
        for group in &schema.unique {
            let values: Option<Vec<&Value>> = group
                .iter()
                .map(|field| record.get(field).filter(|v| !v.is_null()))
                .collect();
            let Some(values) = values else {
                continue;
            };

            let mut terms: Vec<Predicate> = group
                .iter()
                .zip(values)
                .map(|(field, value)| Predicate::eq(field.as_str(), value.clone()))
                .collect();
            terms.push(Predicate::eq(ACTIVE_FIELD, true));
            terms.push(Predicate::not(Predicate::by_id(record.id_str())));

            let query = ListQuery::new(Predicate::and(terms))
                .with_pagination(Some(Pagination::new(1, 1)));
            let clash = self
                .guarded(self.store.select(&schema.entity_type, &query))
                .await?;

            if clash.total > 0 {
                return Err(RepositoryError::Conflict {
                    entity_type: schema.entity_type.to_string(),
                    fields: group.clone(),
                });
            }
        }
        Ok(())
    }
}
