//! Post-commit jobs handed to the task queue.

use std::sync::Arc;

use async_trait::async_trait;

use entityflow_core::events::{DomainEvent, EventBus};
use entityflow_core::pipeline::{ActorContext, Step, Verb};
use entityflow_core::record::{EntityType, Record};
use entityflow_core::search::SearchIndex;

use crate::cascade::CascadeSynchronizer;
use crate::tasks::{Job, JobContext};

use super::Scope;

/// Mirrors a committed record into the search index.
///
/// Deleted records are removed from the index; everything else is upserted.
pub(crate) struct ReindexJob {
    ctx: JobContext,
    index: Arc<dyn SearchIndex>,
    record: Record,
}

impl ReindexJob {
    pub(crate) fn new(
        index: Arc<dyn SearchIndex>,
        entity: &EntityType,
        verb: Verb,
        record: Record,
    ) -> Self {
        Self {
            ctx: JobContext::new(Step::Reindex, entity.clone(), record.id(), verb),
            index,
            record,
        }
    }
}

#[async_trait]
impl Job for ReindexJob {
    fn context(&self) -> &JobContext {
        &self.ctx
    }

    async fn run(&self) -> Result<(), String> {
        let entity = &self.ctx.entity_type;
        let result = if self.record.is_active() {
            self.index.index_or_update(entity, &self.record).await
        } else {
            self.index.remove(entity, &self.ctx.entity_id).await
        };
        result.map_err(|e| e.to_string())
    }
}

/// Propagates a committed parent write to its dependents.
///
/// Fails only when the children could not be discovered; per-child failures
/// are reported by the synchronizer itself.
pub(crate) struct CascadeJob {
    ctx: JobContext,
    synchronizer: CascadeSynchronizer,
    actor: ActorContext,
    scope: Scope,
}

impl CascadeJob {
    pub(crate) fn new(
        synchronizer: CascadeSynchronizer,
        entity: &EntityType,
        verb: Verb,
        record: &Record,
        actor: ActorContext,
        scope: Scope,
    ) -> Self {
        Self {
            ctx: JobContext::new(Step::Cascade, entity.clone(), record.id(), verb),
            synchronizer,
            actor,
            scope,
        }
    }
}

#[async_trait]
impl Job for CascadeJob {
    fn context(&self) -> &JobContext {
        &self.ctx
    }

    async fn run(&self) -> Result<(), String> {
        let ctx = &self.ctx;
        let report = self
            .synchronizer
            .run(
                &ctx.entity_type,
                &ctx.entity_id,
                ctx.operation,
                &self.actor,
                &self.scope,
            )
            .await
            .map_err(|e| e.to_string())?;

        tracing::debug!(
            entity_type = %ctx.entity_type,
            entity_id = %ctx.entity_id,
            succeeded = report.succeeded.len(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            outcome = ?report.outcome(),
            "Cascade finished"
        );
        Ok(())
    }
}

/// Publishes a domain event for a committed write.
pub(crate) struct PublishJob {
    ctx: JobContext,
    bus: Arc<dyn EventBus>,
    event: DomainEvent,
}

impl PublishJob {
    pub(crate) fn new(bus: Arc<dyn EventBus>, event: DomainEvent) -> Self {
        Self {
            ctx: JobContext::new(
                Step::PublishEvent,
                event.entity_type.clone(),
                event.entity_id.clone(),
                event.verb,
            ),
            bus,
            event,
        }
    }
}

#[async_trait]
impl Job for PublishJob {
    fn context(&self) -> &JobContext {
        &self.ctx
    }

    async fn run(&self) -> Result<(), String> {
        self.bus.publish(&self.event).await.map_err(|e| e.to_string())
    }
}
