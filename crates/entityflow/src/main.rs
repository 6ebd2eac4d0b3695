use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::signal;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use entityflow::catalog::catalog;
use entityflow::config::Config;
use entityflow::pipeline::Pipeline;
use entityflow::storage::InMemoryStore;
use entityflow::tasks::PostCommitMode;
use entityflow_core::cache::Cache;
use entityflow_core::events::EventBus;
use entityflow_core::pipeline::{
    command_error_to_status_code, ActorContext, CommandError, CommandInput, CommandOutput, Verb,
};
use entityflow_core::predicate::FilterExpr;
use entityflow_core::query::{Pagination, Sort};
use entityflow_core::storage::RecordStore;

/// entityflow - Run entity commands through the pipeline
#[derive(Parser, Debug)]
#[command(name = "entityflow")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, env = "SQLITE_PATH")]
    db: Option<String>,

    /// Use a throwaway in-memory store
    #[arg(long)]
    ephemeral: bool,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// Run post-commit work before returning instead of in the background
    #[arg(long)]
    inline: bool,

    /// Acting user id
    #[arg(long, global = true, env = "ENTITYFLOW_USER")]
    user: Option<String>,

    /// Acting tenant (store) id
    #[arg(long, global = true, env = "ENTITYFLOW_TENANT")]
    tenant: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a record, or revive the record with the same id
    Create {
        entity: String,
        #[arg(long)]
        id: Option<String>,
        /// Fields as a JSON object
        #[arg(long, default_value = "{}")]
        data: String,
    },
    /// Fetch one record by id
    Get {
        entity: String,
        id: String,
        #[arg(long)]
        include_inactive: bool,
    },
    /// List records
    List {
        entity: String,
        /// Filter as JSON, e.g. '{"field":"name","operator":"contains","value":"Pro"}'
        #[arg(long)]
        filter: Option<String>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long, default_value_t = Pagination::DEFAULT_SIZE)]
        size: u32,
        /// `field`, `field:asc` or `field:desc`; repeatable
        #[arg(long)]
        sort: Vec<String>,
        #[arg(long)]
        include_inactive: bool,
    },
    /// Apply fields to a record
    Update {
        entity: String,
        id: String,
        /// Fields as a JSON object
        #[arg(long)]
        data: String,
    },
    /// Soft-delete a record and cascade to its dependents
    Delete { entity: String, id: String },
    /// Rebuild the search index of an entity type
    Reindex { entity: String },
    /// Show registered entities and cascade edges
    Entities,
    /// Print events for an entity type until Ctrl+C
    Watch { entity: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = Config::from_env();
    let mode = if cli.inline {
        PostCommitMode::Inline
    } else {
        config.post_commit_mode
    };

    let store = open_store(&cli, &config).await?;
    let (cache, events) = open_backends(&config).await?;

    let pipeline = Pipeline::builder(catalog())
        .config(config)
        .store(store)
        .cache(cache)
        .events(events)
        .mode(mode)
        .build();

    let result = run(&cli, &pipeline).await;
    pipeline.shutdown().await;
    result
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "entityflow=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn open_store(cli: &Cli, config: &Config) -> Result<Arc<dyn RecordStore>> {
    if cli.ephemeral {
        tracing::info!("Using the in-memory store");
        return Ok(Arc::new(InMemoryStore::new()));
    }
    let path = cli.db.as_deref().unwrap_or(&config.sqlite_path);
    persistent_store(path).await
}

#[cfg(feature = "sqlite")]
async fn persistent_store(path: &str) -> Result<Arc<dyn RecordStore>> {
    let store = entityflow::storage::SqliteStore::new(path)
        .await
        .with_context(|| format!("failed to open SQLite database at {path}"))?;
    tracing::info!(path, "Using the SQLite store");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn persistent_store(path: &str) -> Result<Arc<dyn RecordStore>> {
    tracing::warn!(path, "Built without SQLite support, using the in-memory store");
    Ok(Arc::new(InMemoryStore::new()))
}

#[cfg(feature = "memory")]
async fn open_backends(config: &Config) -> Result<(Arc<dyn Cache>, Arc<dyn EventBus>)> {
    use entityflow::cache::{MemoryCache, MemoryEventBus};

    Ok((
        Arc::new(MemoryCache::new(config.cache_max_entries)),
        Arc::new(MemoryEventBus::new()),
    ))
}

#[cfg(feature = "redis")]
async fn open_backends(config: &Config) -> Result<(Arc<dyn Cache>, Arc<dyn EventBus>)> {
    use entityflow::cache::{RedisCache, RedisEventBus};

    let cache = RedisCache::new(&config.redis_url)
        .await
        .context("failed to connect the Redis cache")?;
    let events = RedisEventBus::new(&config.redis_url)
        .await
        .context("failed to connect the Redis event bus")?;
    tracing::info!(url = %config.redis_url, "Using Redis cache and event bus");
    Ok((Arc::new(cache), Arc::new(events)))
}

async fn run(cli: &Cli, pipeline: &Pipeline) -> Result<()> {
    let actor = actor(cli);

    match &cli.command {
        Command::Create { entity, id, data } => {
            let mut input = CommandInput::new()
                .with_data(parse_object(data)?)
                .with_actor(actor);
            if let Some(id) = id {
                input = input.with_id(id.as_str());
            }
            print_output(command(pipeline, Verb::Create, entity, input).await?)
        }
        Command::Get {
            entity,
            id,
            include_inactive,
        } => {
            let mut input = CommandInput::new().with_id(id.as_str()).with_actor(actor);
            input.include_inactive = *include_inactive;
            print_output(command(pipeline, Verb::Get, entity, input).await?)
        }
        Command::List {
            entity,
            filter,
            page,
            size,
            sort,
            include_inactive,
        } => {
            let mut input = CommandInput::new()
                .with_sort(parse_sort(sort)?)
                .with_actor(actor);
            if let Some(filter) = filter {
                let filter: FilterExpr =
                    serde_json::from_str(filter).context("filter is not a valid expression")?;
                input = input.with_filter(filter);
            }
            if let Some(page) = page {
                input = input.with_pagination(Pagination::new(*page, *size));
            }
            input.include_inactive = *include_inactive;
            print_output(command(pipeline, Verb::List, entity, input).await?)
        }
        Command::Update { entity, id, data } => {
            let input = CommandInput::new()
                .with_id(id.as_str())
                .with_data(parse_object(data)?)
                .with_actor(actor);
            print_output(command(pipeline, Verb::Update, entity, input).await?)
        }
        Command::Delete { entity, id } => {
            let input = CommandInput::new().with_id(id.as_str()).with_actor(actor);
            print_output(command(pipeline, Verb::Delete, entity, input).await?)
        }
        Command::Reindex { entity } => {
            let indexed = pipeline.reindex(entity.as_str()).await?;
            print_json(&serde_json::json!({ "entityType": entity, "indexed": indexed }))
        }
        Command::Entities => {
            let registry = pipeline.registry();
            let edges: Vec<Value> = registry
                .edges()
                .iter()
                .map(|edge| {
                    serde_json::json!({
                        "parent": edge.parent,
                        "child": edge.child,
                        "foreignKey": edge.foreign_key,
                        "verb": edge.action.verb(),
                    })
                })
                .collect();
            print_json(&serde_json::json!({
                "entities": registry.entity_types(),
                "cascades": edges,
            }))
        }
        Command::Watch { entity } => watch(pipeline, entity).await,
    }
}

fn actor(cli: &Cli) -> ActorContext {
    ActorContext {
        user_id: cli.user.clone(),
        tenant_id: cli.tenant.clone(),
        request_id: Some(uuid::Uuid::new_v4().to_string()),
    }
}

async fn command(
    pipeline: &Pipeline,
    verb: Verb,
    entity: &str,
    input: CommandInput,
) -> Result<CommandOutput> {
    pipeline
        .execute(verb, entity, input)
        .await
        .map_err(describe_error)
}

fn describe_error(err: CommandError) -> anyhow::Error {
    anyhow!("{err} (status {})", command_error_to_status_code(&err))
}

fn parse_object(raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str(raw).context("data is not valid JSON")? {
        Value::Object(map) => Ok(map),
        other => bail!("data must be a JSON object, got {other}"),
    }
}

fn parse_sort(raw: &[String]) -> Result<Vec<Sort>> {
    raw.iter()
        .map(|s| s.parse::<Sort>().map_err(|e| anyhow!(e)))
        .collect()
}

fn print_output(output: CommandOutput) -> Result<()> {
    print_json(&output)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn watch(pipeline: &Pipeline, entity: &str) -> Result<()> {
    let receiver = pipeline.subscribe(entity).await?;
    let mut events = BroadcastStream::new(receiver);
    tracing::info!(entity_type = entity, "Watching events, Ctrl+C to stop");

    loop {
        tokio::select! {
            next = events.next() => match next {
                Some(Ok(event)) => print_json(&event)?,
                Some(Err(err)) => tracing::warn!(error = %err, "Event stream lagged"),
                None => break,
            },
            _ = signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, stopping");
                break;
            }
        }
    }
    Ok(())
}
