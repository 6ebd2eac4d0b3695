//! The pipeline service: shared collaborators plus the public command API.

use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use thiserror::Error;
use tokio::sync::broadcast;

use entityflow_core::cache::Cache;
use entityflow_core::events::{DomainEvent, EventBus, Result as EventResult};
use entityflow_core::pipeline::{
    CommandError, CommandInput, CommandOutput, DependencyError, Reporter, Verb,
};
use entityflow_core::query::Pagination;
use entityflow_core::record::EntityType;
use entityflow_core::search::{SearchError, SearchIndex};
use entityflow_core::storage::RecordStore;

use crate::cache::{MemoryCache, MemoryEventBus};
use crate::config::Config;
use crate::query_cache::QueryCache;
use crate::reporter::TracingReporter;
use crate::search::MemorySearchIndex;
use crate::storage::{InMemoryStore, PersistenceAdapter};
use crate::tasks::{run_with_retry, Job, PostCommitMode, RetryPolicy, TaskQueue};

use super::command::EntityCommand;
use super::{EntityRegistry, Scope};

/// Rows fetched per page when rebuilding a search index.
const REINDEX_CHUNK: u32 = 500;

#[derive(Debug, Error)]
pub enum ReindexError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Search(#[from] SearchError),
}

struct Inner {
    registry: EntityRegistry,
    adapter: PersistenceAdapter,
    cache: QueryCache,
    search: Arc<dyn SearchIndex>,
    events: Arc<dyn EventBus>,
    reporter: Arc<dyn Reporter>,
    queue: TaskQueue,
    policy: RetryPolicy,
    mode: PostCommitMode,
    service: String,
}

/// Runs entity commands against one set of backends.
///
/// Cheap to clone; clones share the backends and the task queue.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<Inner>,
}

impl Pipeline {
    pub fn builder(registry: EntityRegistry) -> PipelineBuilder {
        PipelineBuilder::new(registry)
    }

    /// Runs one command through the full lifecycle.
    pub async fn execute(
        &self,
        verb: Verb,
        entity: impl Into<EntityType>,
        input: CommandInput,
    ) -> Result<CommandOutput, CommandError> {
        self.run(verb, entity.into(), input, Scope::root(self.inner.mode))
            .await
    }

    pub async fn create(
        &self,
        entity: impl Into<EntityType>,
        input: CommandInput,
    ) -> Result<CommandOutput, CommandError> {
        self.execute(Verb::Create, entity, input).await
    }

    pub async fn get(
        &self,
        entity: impl Into<EntityType>,
        input: CommandInput,
    ) -> Result<CommandOutput, CommandError> {
        self.execute(Verb::Get, entity, input).await
    }

    pub async fn list(
        &self,
        entity: impl Into<EntityType>,
        input: CommandInput,
    ) -> Result<CommandOutput, CommandError> {
        self.execute(Verb::List, entity, input).await
    }

    pub async fn update(
        &self,
        entity: impl Into<EntityType>,
        input: CommandInput,
    ) -> Result<CommandOutput, CommandError> {
        self.execute(Verb::Update, entity, input).await
    }

    pub async fn delete(
        &self,
        entity: impl Into<EntityType>,
        input: CommandInput,
    ) -> Result<CommandOutput, CommandError> {
        self.execute(Verb::Delete, entity, input).await
    }

    /// Boxed so commands can recurse into cascades and aggregated writes.
    pub(crate) fn run(
        &self,
        verb: Verb,
        entity: EntityType,
        input: CommandInput,
        scope: Scope,
    ) -> BoxFuture<'static, Result<CommandOutput, CommandError>> {
        let pipeline = self.clone();
        async move {
            let definition = pipeline
                .inner
                .registry
                .get(&entity)
                .ok_or(CommandError::UnknownEntity(entity))?;
            EntityCommand::new(pipeline, definition, verb, input, scope)
                .execute()
                .await
        }
        .boxed()
    }

    /// Rebuilds the search index of an entity type from its active rows and
    /// drops its cached reads. Returns the number of indexed records.
    pub async fn reindex(&self, entity: impl Into<EntityType>) -> Result<usize, ReindexError> {
        let entity = entity.into();
        if self.inner.registry.get(&entity).is_none() {
            return Err(CommandError::UnknownEntity(entity).into());
        }

        let mut indexed = 0usize;
        let mut page = 1;
        loop {
            let result = self
                .inner
                .adapter
                .active_page(&entity, Pagination::new(page, REINDEX_CHUNK))
                .await
                .map_err(CommandError::from)?;

            let fetched = result.items.len();
            if fetched > 0 {
                self.inner.search.index_bulk(&entity, &result.items).await?;
            }
            indexed += fetched;
            tracing::debug!(entity_type = %entity, page, fetched, "Reindexed page");

            if fetched < REINDEX_CHUNK as usize || indexed as u64 >= result.total {
                break;
            }
            page += 1;
        }

        if let Err(err) = self.inner.cache.invalidate(&entity).await {
            tracing::warn!(entity_type = %entity, error = %err, "Failed to invalidate cache after reindex");
        }
        tracing::info!(entity_type = %entity, indexed, "Rebuilt search index");
        Ok(indexed)
    }

    /// Events for one entity type, as they are published.
    pub async fn subscribe(
        &self,
        entity: impl Into<EntityType>,
    ) -> EventResult<broadcast::Receiver<DomainEvent>> {
        self.inner.events.subscribe(&entity.into()).await
    }

    /// Resolves once every queued post-commit task has finished.
    pub async fn wait_idle(&self) {
        self.inner.queue.wait_idle().await;
    }

    /// Drains the task queue. Later post-commit work runs in place.
    pub async fn shutdown(&self) {
        self.inner.queue.shutdown().await;
    }

    pub fn pending_tasks(&self) -> usize {
        self.inner.queue.pending()
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.inner.registry
    }

    pub fn mode(&self) -> PostCommitMode {
        self.inner.mode
    }

    pub(crate) fn adapter(&self) -> &PersistenceAdapter {
        &self.inner.adapter
    }

    pub(crate) fn query_cache(&self) -> &QueryCache {
        &self.inner.cache
    }

    pub(crate) fn search_index(&self) -> Arc<dyn SearchIndex> {
        Arc::clone(&self.inner.search)
    }

    pub(crate) fn event_bus(&self) -> Arc<dyn EventBus> {
        Arc::clone(&self.inner.events)
    }

    pub(crate) fn service(&self) -> &str {
        &self.inner.service
    }

    pub(crate) fn retry_policy(&self) -> &RetryPolicy {
        &self.inner.policy
    }

    pub(crate) fn report(&self, error: &DependencyError) {
        self.inner.reporter.report(error);
    }

    /// Hands a post-commit job to the queue, or runs it in place.
    pub(crate) async fn dispatch(&self, job: Box<dyn Job>, mode: PostCommitMode) {
        match mode {
            PostCommitMode::Background => self.inner.queue.submit(job).await,
            PostCommitMode::Inline => {
                if let Err(err) = run_with_retry(job.as_ref(), &self.inner.policy).await {
                    self.report(&err);
                }
            }
        }
    }
}

/// Assembles a [`Pipeline`]. Unset backends default to the in-memory ones.
pub struct PipelineBuilder {
    registry: EntityRegistry,
    config: Config,
    store: Option<Arc<dyn RecordStore>>,
    cache: Option<Arc<dyn Cache>>,
    search: Option<Arc<dyn SearchIndex>>,
    events: Option<Arc<dyn EventBus>>,
    reporter: Option<Arc<dyn Reporter>>,
    policy: Option<RetryPolicy>,
    mode: Option<PostCommitMode>,
}

impl PipelineBuilder {
    fn new(registry: EntityRegistry) -> Self {
        Self {
            registry,
            config: Config::default(),
            store: None,
            cache: None,
            search: None,
            events: None,
            reporter: None,
            policy: None,
            mode: None,
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn search(mut self, search: Arc<dyn SearchIndex>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn events(mut self, events: Arc<dyn EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Overrides the retry schedule derived from the config.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Overrides the post-commit mode from the config.
    pub fn mode(mut self, mode: PostCommitMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Starts the task queue and returns the pipeline.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn build(self) -> Pipeline {
        let config = self.config;
        let policy = self.policy.unwrap_or_else(|| config.retry_policy());
        let mode = self.mode.unwrap_or(config.post_commit_mode);
        let reporter = self
            .reporter
            .unwrap_or_else(|| Arc::new(TracingReporter));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryStore::new()));
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(MemoryCache::new(config.cache_max_entries)));

        let queue = TaskQueue::start(
            config.task_queue_capacity,
            config.task_workers,
            policy,
            Arc::clone(&reporter),
        );

        tracing::debug!(
            entities = self.registry.entity_types().len(),
            %mode,
            workers = config.task_workers,
            "Pipeline started"
        );

        Pipeline {
            inner: Arc::new(Inner {
                registry: self.registry,
                adapter: PersistenceAdapter::new(store, config.store_timeout()),
                cache: QueryCache::new(cache, config.cache_ttl()),
                search: self
                    .search
                    .unwrap_or_else(|| Arc::new(MemorySearchIndex::new())),
                events: self
                    .events
                    .unwrap_or_else(|| Arc::new(MemoryEventBus::new())),
                reporter,
                queue,
                policy,
                mode,
                service: config.service_label,
            }),
        }
    }
}
