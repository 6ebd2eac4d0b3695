//! Cascade synchronizer.
//!
//! After a parent write commits, finds the active children of every matching
//! edge and runs the edge action on each child through the full pipeline.
//! Children run concurrently and fail independently; each failed child ends
//! up as exactly one dependency error on the reporter.

use async_trait::async_trait;
use futures_util::future::join_all;
use serde_json::Value;

use entityflow_core::cascade::{CascadeAction, CascadeEdge, CascadeReport, CascadeTrigger};
use entityflow_core::pipeline::{ActorContext, CommandInput, Step, Verb};
use entityflow_core::record::{EntityId, EntityType};
use entityflow_core::storage::RepositoryError;

use crate::pipeline::{Pipeline, Scope};
use crate::tasks::{run_with_retry, Job, JobContext};

#[derive(Clone)]
pub struct CascadeSynchronizer {
    pipeline: Pipeline,
}

/// One child command, retried as a unit.
struct ChildJob {
    ctx: JobContext,
    pipeline: Pipeline,
    input: CommandInput,
    scope: Scope,
}

#[async_trait]
impl Job for ChildJob {
    fn context(&self) -> &JobContext {
        &self.ctx
    }

    async fn run(&self) -> Result<(), String> {
        self.pipeline
            .run(
                self.ctx.operation,
                self.ctx.entity_type.clone(),
                self.input.clone(),
                self.scope.clone(),
            )
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

impl CascadeSynchronizer {
    pub(crate) fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    /// Propagates `verb` on `parent`/`parent_id` to its dependents.
    ///
    /// Fails only when child discovery fails. Children are run with the
    /// actor's tenant scope removed so every dependent row is reachable.
    pub(crate) async fn run(
        &self,
        parent: &EntityType,
        parent_id: &EntityId,
        verb: Verb,
        actor: &ActorContext,
        scope: &Scope,
    ) -> Result<CascadeReport, RepositoryError> {
        let mut report = CascadeReport::default();
        let Some(trigger) = CascadeTrigger::for_verb(verb) else {
            return Ok(report);
        };
        scope.visit(parent, parent_id);

        let edges = self.pipeline.registry().edges_for(parent, trigger);
        let actor = actor.unscoped();

        let mut discovered = Vec::with_capacity(edges.len());
        for edge in &edges {
            let children = self
                .pipeline
                .adapter()
                .ids_by_field(
                    &edge.child,
                    &edge.foreign_key,
                    &Value::String(parent_id.to_string()),
                )
                .await?;
            discovered.push((edge, children));
        }

        let mut jobs = Vec::new();
        for (edge, children) in discovered {
            for child_id in children {
                let Some(claim) = scope.claim(&edge.child, &child_id) else {
                    tracing::debug!(
                        entity_type = %edge.child,
                        entity_id = %child_id,
                        parent_type = %parent,
                        parent_id = %parent_id,
                        "Cascade child already visited, skipping"
                    );
                    report.skipped.push((edge.child.clone(), child_id));
                    continue;
                };
                jobs.push((self.child_job(edge, child_id, &actor, scope), claim));
            }
        }

        tracing::debug!(
            entity_type = %parent,
            entity_id = %parent_id,
            children = jobs.len(),
            "Cascading to children"
        );

        let policy = self.pipeline.retry_policy();
        let outcomes = join_all(jobs.into_iter().map(|(job, claim)| async move {
            let outcome = run_with_retry(&job, policy).await;
            claim.settle();
            let ctx = job.ctx;
            (ctx.entity_type, ctx.entity_id, outcome)
        }))
        .await;

        for (child_type, child_id, outcome) in outcomes {
            match outcome {
                Ok(()) => report.succeeded.push((child_type, child_id)),
                Err(err) => {
                    self.pipeline.report(&err);
                    report.failures.push(err);
                }
            }
        }
        Ok(report)
    }

    fn child_job(
        &self,
        edge: &CascadeEdge,
        child_id: EntityId,
        actor: &ActorContext,
        scope: &Scope,
    ) -> ChildJob {
        let mut input = CommandInput::new()
            .with_id(child_id.clone())
            .with_actor(actor.clone());
        if let CascadeAction::Update(clause) = &edge.action {
            input = input.with_data(clause.as_map().clone());
        }

        ChildJob {
            ctx: JobContext::new(
                Step::CascadeChild,
                edge.child.clone(),
                child_id,
                edge.action.verb(),
            ),
            pipeline: self.pipeline.clone(),
            input,
            scope: scope.nested(),
        }
    }
}
